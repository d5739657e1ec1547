pub mod recording;
pub mod scenarios;
pub mod sim_engine;

pub use recording::{RecordingSink, StatusCall};
pub use scenarios::{
    create_flap_scenarios, print_scenario_summary, run_scenario, FlapScenario, ScenarioResult,
};
pub use sim_engine::{ChannelMode, EngineConfig, EngineStats, SimulatedEngine};
