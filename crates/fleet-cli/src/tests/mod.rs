//! Unit and behavioural tests for the fleet orchestrator.

pub(crate) mod support;
mod unit;
