//! Frame loop scenarios on the mock engine

use std::time::Duration;

use contracts::{ChannelKind, ChannelMask, Pose, SceneId};
use engine_bridge::{BridgeError, EngineCall, MockEngineConfig};
use entities::EntityError;
use frame_loop::{LoopError, RetryPolicy, TerminationReason, VerticalOscillation};

use crate::support::{quad, recorded_loop, recorded_loop_with_timeout};

/// Color-only camera: exactly one channel per tick
#[tokio::test]
async fn test_scenario_a_color_only() {
    let (frame_loop, recordings, _) =
        recorded_loop(MockEngineConfig::default(), ChannelMask::COLOR_ONLY);
    let mut frame_loop = frame_loop.with_max_frames(Some(5));

    let stats = frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();
    assert_eq!(stats.channels_published, 5);
    assert_eq!(stats.channels_unrouted, 0);

    frame_loop.finish(None).await;
    assert_eq!(recordings[0].frame_ids(), vec![0, 1, 2, 3, 4]);
    for recording in &recordings[1..] {
        assert!(recording.images().is_empty());
    }
}

/// All channels: four images per tick sharing one timestamp
#[tokio::test]
async fn test_scenario_b_all_channels_share_stamp() {
    let (frame_loop, recordings, _) = recorded_loop(MockEngineConfig::default(), ChannelMask::ALL);
    let mut frame_loop = frame_loop.with_max_frames(Some(3));

    let stats = frame_loop.run(SceneId::Warehouse, |_| true).await.unwrap();
    assert_eq!(stats.channels_published, 12);
    frame_loop.finish(None).await;

    for frame_id in 0..3u64 {
        let stamps: Vec<_> = recordings
            .iter()
            .map(|r| {
                r.images()
                    .into_iter()
                    .find(|image| image.frame_id == frame_id)
                    .map(|image| image.stamp)
                    .unwrap()
            })
            .collect();
        assert_eq!(stamps.len(), 4);
        assert!(stamps.iter().all(|stamp| *stamp == stamps[0]));
    }

    let depth = &recordings[1].images()[0];
    assert_eq!(depth.channel, ChannelKind::Depth);
    assert_eq!(depth.encoding.as_str(), "32FC1");
    assert_eq!(depth.data.len(), 8 * 4 * 4);
}

/// Refused connect: no tick, no publish
#[tokio::test]
async fn test_scenario_c_refused_connect() {
    let config = MockEngineConfig {
        refuse_connect: true,
        ..Default::default()
    };
    let (mut frame_loop, recordings, log) = recorded_loop(config, ChannelMask::ALL);

    let mut asked = 0;
    let err = frame_loop
        .run(SceneId::Garage, |_| {
            asked += 1;
            true
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LoopError::ConnectionFailed { scene: SceneId::Garage }));
    assert_eq!(asked, 0);

    let stats = frame_loop.finish(None).await;
    assert_eq!(stats.ticks, 0);
    assert_eq!(stats.frames_published, 0);
    assert_eq!(stats.termination, Some(TerminationReason::ConnectionFailed));
    assert!(log.requested_frames().is_empty());
    assert!(recordings.iter().all(|r| r.images().is_empty()));
}

/// Render failure at frame 7: frames 0..=6 published, 8 never requested
#[tokio::test]
async fn test_scenario_d_failure_mid_session() {
    let config = MockEngineConfig {
        fail_frames: vec![7],
        ..Default::default()
    };
    let (mut frame_loop, recordings, log) = recorded_loop(config, ChannelMask::COLOR_ONLY);

    let err = frame_loop
        .run(SceneId::Tunnels, |_| true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoopError::RenderFailed {
            frame_id: 7,
            attempts: 1,
            ..
        }
    ));
    assert_eq!(frame_loop.next_frame_id(), 7);

    let stats = frame_loop.finish(None).await;
    assert_eq!(stats.last_frame_id, Some(6));
    assert_eq!(stats.termination, Some(TerminationReason::RenderFailed));
    assert_eq!(log.requested_frames(), (0..=7).collect::<Vec<_>>());
    assert_eq!(recordings[0].frame_ids(), (0..=6).collect::<Vec<_>>());
}

/// Outputs of frame k are collected before frame k+1 is requested
#[tokio::test]
async fn test_at_most_one_outstanding_request() {
    let (frame_loop, _recordings, log) =
        recorded_loop(MockEngineConfig::default(), ChannelMask::COLOR_ONLY);
    let mut frame_loop = frame_loop.with_max_frames(Some(4));
    frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();

    let frame_calls: Vec<EngineCall> = log
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                EngineCall::RequestFrame { .. } | EngineCall::CollectOutputs { .. }
            )
        })
        .collect();
    assert_eq!(frame_calls.len(), 8);
    for (k, pair) in frame_calls.chunks(2).enumerate() {
        assert!(matches!(pair[0], EngineCall::RequestFrame { frame_id, .. } if frame_id == k as u64));
        assert!(matches!(pair[1], EngineCall::CollectOutputs { frame_id: Some(id) } if id == k as u64));
    }
}

/// Transient failure at frame 3 is retried under the same id
#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let config = MockEngineConfig {
        transient_failures: vec![3],
        ..Default::default()
    };
    let (frame_loop, recordings, log) = recorded_loop(config, ChannelMask::COLOR_ONLY);
    let mut frame_loop = frame_loop
        .with_max_frames(Some(6))
        .with_retry(RetryPolicy::default().with_max_retries(2));

    let stats = frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();
    assert_eq!(stats.frames_published, 6);
    assert_eq!(stats.retries, 1);
    assert_eq!(log.requested_frames(), vec![0, 1, 2, 3, 3, 4, 5]);

    let summary: observability::LoopMetricsSummary = stats.metrics.summary();
    assert_eq!(summary.frames_rendered, 6);
    assert_eq!(summary.render_failures, 1);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.last_frame_id, Some(5));

    frame_loop.finish(None).await;
    assert_eq!(recordings[0].frame_ids(), (0..6).collect::<Vec<_>>());
}

/// A render slower than the timeout is a render failure
#[tokio::test(start_paused = true)]
async fn test_render_timeout_reported_as_render_failure() {
    let config = MockEngineConfig {
        render_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let (mut frame_loop, _recordings, _) =
        recorded_loop_with_timeout(config, ChannelMask::COLOR_ONLY, Duration::from_millis(50));

    let err = frame_loop
        .run(SceneId::Industrial, |_| true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoopError::RenderFailed {
            frame_id: 0,
            source: BridgeError::RenderFailed { .. },
            ..
        }
    ));
    assert_eq!(frame_loop.stats().frames_published, 0);
}

/// The vehicle pose of every frame reaches the engine with its request
#[tokio::test]
async fn test_motion_policy_drives_requested_pose() {
    let (frame_loop, _recordings, log) =
        recorded_loop(MockEngineConfig::default(), ChannelMask::COLOR_ONLY);
    let mut frame_loop = frame_loop
        .with_max_frames(Some(4))
        .with_motion(VerticalOscillation::new(0.0, 0.2, 0.1));
    frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();

    let heights: Vec<f64> = log
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::RequestFrame { poses, .. } => Some(poses[0].pose.position.z),
            _ => None,
        })
        .collect();
    let expected = [0.1, 0.2, 0.1, 0.0];
    assert_eq!(heights.len(), expected.len());
    for (got, want) in heights.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "{got} != {want}");
    }
}

/// Camera configuration is fixed once the vehicle is registered
#[tokio::test]
async fn test_configuration_locked_after_registration() {
    let (mut frame_loop, _recordings, _) =
        recorded_loop(MockEngineConfig::default(), ChannelMask::COLOR_ONLY);

    let registered = frame_loop
        .bridge()
        .manifest()
        .cameras()
        .next()
        .cloned()
        .unwrap();
    let mut proxy = quad(ChannelMask::COLOR_ONLY);
    proxy.seal().unwrap();
    let mut sensor = proxy.sensor().cloned().unwrap();
    let before = sensor.configuration().cloned();

    let err = sensor
        .configure(Pose::zero(), 60.0, 16, 16, ChannelMask::ALL)
        .unwrap_err();
    assert!(matches!(err, EntityError::ConfigurationLocked { .. }));
    assert_eq!(sensor.configuration().cloned(), before);

    frame_loop = frame_loop.with_max_frames(Some(1));
    frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();
    let after = frame_loop
        .bridge()
        .manifest()
        .cameras()
        .next()
        .cloned()
        .unwrap();
    assert_eq!(registered, after);
}
