//! Integration tests for the skillsprint roadmap system

mod support;

mod codec_scenarios;
mod config_integration;
mod overlay_scenarios;
mod repair_contract;
mod router_contract;
mod scheduler_termination;
