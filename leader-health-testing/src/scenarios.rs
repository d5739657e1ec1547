use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use leader_health::{report, Regime};
use leader_health_core::{RaftRole, ServiceSet, ServingStatus};

use crate::recording::RecordingSink;
use crate::sim_engine::{ChannelMode, EngineConfig, EngineStats, SimulatedEngine};

/// Scripted sequence of role transitions applied to a simulated engine while
/// a reporter is attached.
#[derive(Debug, Clone)]
pub struct FlapScenario {
    pub name: String,
    pub description: String,
    pub channel_mode: ChannelMode,
    pub services: Vec<String>,
    pub initial_role: RaftRole,
    pub transitions: Vec<RaftRole>,
    /// Pause after each transition; zero applies the whole script without
    /// yielding to the reporter
    pub pause_between: Duration,
    pub timeout: Duration,
}

impl FlapScenario {
    pub fn new(
        name: impl Into<String>,
        channel_mode: ChannelMode,
        transitions: Vec<RaftRole>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            channel_mode,
            services: vec!["kv.Store".to_string(), "kv.Admin".to_string()],
            initial_role: RaftRole::Follower,
            transitions,
            pause_between: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    /// Random walk over follower, candidate and leader roles.
    pub fn random(
        name: impl Into<String>,
        channel_mode: ChannelMode,
        length: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let roles = [RaftRole::Follower, RaftRole::Candidate, RaftRole::Leader];
        let transitions = (0..length)
            .map(|_| roles[rng.gen_range(0..roles.len())])
            .collect();

        let mut scenario = Self::new(name, channel_mode, transitions);
        scenario.description = format!("{} random transitions (seed {})", length, seed);
        scenario
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause_between = pause;
        self
    }

    pub fn service_set(&self) -> ServiceSet {
        ServiceSet::new(self.services.clone())
    }

    /// Status every tracked name must converge to
    pub fn expected_status(&self) -> ServingStatus {
        let last = self
            .transitions
            .last()
            .copied()
            .unwrap_or(self.initial_role);
        ServingStatus::from_leadership(last.is_leader())
    }
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub success: bool,
    pub regime: Regime,
    pub expected: ServingStatus,
    pub final_statuses: Vec<(String, Option<ServingStatus>)>,
    pub status_calls: usize,
    pub engine_stats: EngineStats,
    pub duration: Duration,
}

/// Runs a scenario against a fresh engine and reporter, waiting for every
/// tracked name to converge.
pub async fn run_scenario(scenario: &FlapScenario) -> ScenarioResult {
    info!("Running flap scenario: {}", scenario.name);
    let start = Instant::now();

    let engine = Arc::new(SimulatedEngine::new(
        EngineConfig::new(scenario.channel_mode).with_initial_role(scenario.initial_role),
    ));
    let sink = Arc::new(RecordingSink::new());
    let services = scenario.service_set();
    let expected = scenario.expected_status();

    let handle = report(engine.clone(), sink.clone(), services.clone()).await;
    let regime = handle.regime();

    for role in &scenario.transitions {
        engine.set_role(*role).await;
        if !scenario.pause_between.is_zero() {
            tokio::time::sleep(scenario.pause_between).await;
        }
    }

    let success = sink
        .wait_for_tracked(&services, expected, scenario.timeout)
        .await;
    if !success {
        warn!(
            "Scenario {} did not converge to {}: {:?}",
            scenario.name,
            expected,
            sink.tracked_statuses(&services)
        );
    }

    handle.stop().await;

    ScenarioResult {
        scenario_name: scenario.name.clone(),
        success,
        regime,
        expected,
        final_statuses: sink.tracked_statuses(&services),
        status_calls: sink.call_count(),
        engine_stats: engine.stats(),
        duration: start.elapsed(),
    }
}

pub fn create_flap_scenarios() -> Vec<FlapScenario> {
    use RaftRole::*;

    vec![
        FlapScenario::new(
            "single-election-channel",
            ChannelMode::Independent,
            vec![Candidate, Leader],
        )
        .with_description("Follower wins one election, independent leadership channels"),
        FlapScenario::new("single-election-observer", ChannelMode::Shared, vec![Candidate, Leader])
            .with_description("Follower wins one election, shared leadership channel"),
        FlapScenario::new(
            "step-down-observer",
            ChannelMode::Shared,
            vec![Leader, Follower, Candidate],
        )
        .with_description("Leadership lost and a new election started"),
        FlapScenario::new(
            "paced-flapping-channel",
            ChannelMode::Independent,
            vec![Leader, Follower, Leader, Follower, Leader],
        )
        .with_pause(Duration::from_millis(5))
        .with_description("Flapping with time for the reporter to catch up"),
        FlapScenario::random("burst-observer", ChannelMode::Shared, 24, 7),
        FlapScenario::random("burst-channel", ChannelMode::Independent, 24, 11),
    ]
}

pub fn print_scenario_summary(results: &[ScenarioResult]) {
    let passed = results.iter().filter(|r| r.success).count();
    info!("Flap scenarios: {}/{} converged", passed, results.len());

    for result in results {
        info!(
            "  {} [{}] expected={} calls={} dropped_observations={} took={:?} {}",
            result.scenario_name,
            result.regime,
            result.expected,
            result.status_calls,
            result.engine_stats.observations_dropped,
            result.duration,
            if result.success { "ok" } else { "FAILED" }
        );
    }
}
