//! Behaviour suites for the diagnostics server.

mod process_behaviour;
mod support;
