//! Reporter behaviour against the simulated engine in both notification
//! regimes.

use std::sync::Arc;
use std::time::Duration;

use leader_health::{report, report_with_config, Regime, ReporterConfig};
use leader_health_core::{NodeId, ObservationData, RaftRole, ServiceSet, ServingStatus};
use leader_health_testing::{ChannelMode, EngineConfig, RecordingSink, SimulatedEngine, StatusCall};

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

fn engine(mode: ChannelMode, role: RaftRole) -> Arc<SimulatedEngine> {
    Arc::new(SimulatedEngine::new(
        EngineConfig::new(mode).with_initial_role(role),
    ))
}

#[tokio::test]
async fn test_initial_status_matches_role_at_call_time() {
    init_logging();

    for mode in [ChannelMode::Shared, ChannelMode::Independent] {
        for role in [RaftRole::Leader, RaftRole::Follower, RaftRole::Candidate] {
            let engine = engine(mode, role);
            let sink = Arc::new(RecordingSink::new());
            let services = ServiceSet::new(["kv.Store", "kv.Admin"]);

            let _handle = report(engine, sink.clone(), services.clone()).await;

            let expected = ServingStatus::from_leadership(role.is_leader());
            assert!(
                sink.all_tracked(&services, expected),
                "{:?}/{:?}: {:?}",
                mode,
                role,
                sink.tracked_statuses(&services)
            );
            assert_eq!(sink.call_count(), services.len());
        }
    }
}

#[tokio::test]
async fn test_shared_channel_uses_observer_only() {
    init_logging();

    let engine = engine(ChannelMode::Shared, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let handle = report(engine.clone(), sink.clone(), services.clone()).await;
    assert_eq!(handle.regime(), Regime::Observer);
    assert_eq!(engine.stats().leader_channel_requests, 2);
    assert_eq!(engine.observer_count(), 1);

    engine.become_leader().await;
    assert!(sink.wait_for_tracked(&services, ServingStatus::Serving, WAIT).await);

    engine.become_follower().await;
    assert!(
        sink.wait_for_tracked(&services, ServingStatus::NotServing, WAIT)
            .await
    );

    // Both leadership values are still sitting in the shared channel
    assert_eq!(engine.shared_channel_backlog(), 2);
}

#[tokio::test]
async fn test_independent_channels_skip_observer() {
    init_logging();

    let engine = engine(ChannelMode::Independent, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let handle = report(engine.clone(), sink.clone(), services.clone()).await;
    assert_eq!(handle.regime(), Regime::Channel);
    assert_eq!(engine.stats().observers_registered, 0);
    // The second probe handle is released right away
    assert_eq!(engine.open_leader_channels(), 1);

    engine.become_leader().await;
    assert!(sink.wait_for_tracked(&services, ServingStatus::Serving, WAIT).await);
    assert_eq!(engine.stats().leader_values_sent, 1);
}

#[tokio::test]
async fn test_non_leader_observations_never_update_status() {
    init_logging();

    let engine = engine(ChannelMode::Shared, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let _handle = report(engine.clone(), sink.clone(), services.clone()).await;
    let initial_calls = sink.call_count();

    let peer = NodeId::from(2);
    engine
        .emit(ObservationData::RequestVote {
            candidate: peer,
            term: 3,
        })
        .await;
    engine
        .emit(ObservationData::PeerChange {
            peer,
            removed: false,
        })
        .await;
    engine.emit(ObservationData::FailedHeartbeat { peer }).await;
    engine
        .emit(ObservationData::RoleChange(RaftRole::Candidate))
        .await;

    assert!(!sink.wait_for_calls(initial_calls + 1, Duration::from_millis(50)).await);
    assert_eq!(engine.stats().observations_filtered, 4);
    assert_eq!(engine.stats().observations_delivered, 0);
}

#[tokio::test]
async fn test_dropped_notifications_converge_to_current_role() {
    init_logging();

    let engine = engine(ChannelMode::Shared, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let _handle = report(engine.clone(), sink.clone(), services.clone()).await;

    // The current-thread runtime does not poll the reporter in between
    engine.become_leader().await;
    engine.become_follower().await;
    engine.become_leader().await;
    assert_eq!(engine.stats().observations_dropped, 2);

    assert!(sink.wait_for_tracked(&services, ServingStatus::Serving, WAIT).await);
}

#[tokio::test]
async fn test_stale_notification_payload_is_not_trusted() {
    init_logging();

    let engine = engine(ChannelMode::Shared, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let _handle = report(engine.clone(), sink.clone(), services.clone()).await;

    // Only the first notification (announcing leadership) is buffered
    engine.become_leader().await;
    engine.become_follower().await;
    assert_eq!(engine.stats().observations_dropped, 1);

    assert!(sink.wait_for_calls(services.len() * 2, WAIT).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(sink.call_count(), services.len() * 2);
    assert!(sink
        .calls()
        .iter()
        .all(|call| call.status == ServingStatus::NotServing));
}

#[tokio::test]
async fn test_full_leadership_channel_converges_to_latest_value() {
    init_logging();

    let engine = Arc::new(SimulatedEngine::new(
        EngineConfig::new(ChannelMode::Independent).with_leader_channel_capacity(1),
    ));
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::new(["kv.Store"]);

    let handle = report(engine.clone(), sink.clone(), services.clone()).await;
    assert_eq!(handle.regime(), Regime::Channel);

    // The current-thread runtime does not poll the reporter in between
    engine.become_leader().await;
    engine.become_follower().await;
    assert_eq!(engine.stats().leader_values_replaced, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        sink.wait_for_tracked(&services, ServingStatus::NotServing, WAIT)
            .await,
        "{:?}",
        sink.tracked_statuses(&services)
    );
    assert!(sink
        .calls()
        .iter()
        .all(|call| call.status == ServingStatus::NotServing));
}

#[tokio::test]
async fn test_batch_order() {
    init_logging();

    for mode in [ChannelMode::Shared, ChannelMode::Independent] {
        let engine = engine(mode, RaftRole::Follower);
        let sink = Arc::new(RecordingSink::new());
        let services = ServiceSet::new(["a", "b"]).with_leader_service("R");

        let _handle = report(engine.clone(), sink.clone(), services).await;
        sink.clear_calls();

        engine.become_leader().await;
        assert!(sink.wait_for_calls(3, WAIT).await);

        assert_eq!(
            sink.calls(),
            vec![
                StatusCall::new("a", ServingStatus::Serving),
                StatusCall::new("b", ServingStatus::Serving),
                StatusCall::new("R", ServingStatus::Serving),
            ],
            "{:?}",
            mode
        );
    }
}

#[tokio::test]
async fn test_reporter_ends_silently_on_engine_shutdown() {
    init_logging();

    for mode in [ChannelMode::Shared, ChannelMode::Independent] {
        let engine = engine(mode, RaftRole::Leader);
        let sink = Arc::new(RecordingSink::new());
        let services = ServiceSet::leader_only();

        let handle = report(engine.clone(), sink.clone(), services.clone()).await;
        engine.shutdown();

        tokio::time::timeout(WAIT, async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reporter kept running after shutdown");

        // Last reported value stays in place
        assert!(sink.all_tracked(&services, ServingStatus::Serving));
    }
}

#[tokio::test]
async fn test_blocking_observer_sees_every_notification() {
    init_logging();

    let engine = engine(ChannelMode::Shared, RaftRole::Follower);
    let sink = Arc::new(RecordingSink::new());
    let services = ServiceSet::leader_only();
    let config = ReporterConfig::new()
        .with_observer_capacity(1)
        .with_observer_blocking(true);

    let _handle = report_with_config(engine.clone(), sink.clone(), services.clone(), config).await;

    engine.become_leader().await;
    engine.become_follower().await;
    engine.become_leader().await;

    assert!(sink.wait_for_calls(4, WAIT).await);
    assert_eq!(engine.stats().observations_dropped, 0);
    assert!(sink.wait_for_tracked(&services, ServingStatus::Serving, WAIT).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_flapping_converges() {
    init_logging();

    for mode in [ChannelMode::Shared, ChannelMode::Independent] {
        let engine = engine(mode, RaftRole::Follower);
        let sink = Arc::new(RecordingSink::new());
        let services = ServiceSet::new(["kv.Store", "kv.Admin", "kv.Index"]);

        let _handle = report(engine.clone(), sink.clone(), services.clone()).await;

        let flapper = tokio::spawn({
            let engine = engine.clone();
            async move {
                for i in 0..20 {
                    if i % 2 == 0 {
                        engine.become_leader().await;
                    } else {
                        engine.become_follower().await;
                    }
                    tokio::task::yield_now().await;
                }
                engine.become_candidate().await;
                engine.become_leader().await;
            }
        });
        flapper.await.unwrap();

        assert!(
            sink.wait_for_tracked(&services, ServingStatus::Serving, WAIT)
                .await,
            "{:?}: {:?}",
            mode,
            sink.tracked_statuses(&services)
        );
    }
}
