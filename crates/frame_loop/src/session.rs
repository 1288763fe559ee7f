//! Session assembly from a `SessionBlueprint`
//!
//! 所有实体在 connect 之前注册；之后蓝图不再被读取。

use std::time::Duration;

use contracts::{EngineSession, SessionBlueprint, StaticStructureConfig, StreamConfig, VehicleConfig};
use engine_bridge::{EngineBridge, EntityHandle};
use entities::{EntityProxy, SensorDescriptor, StaticStructure};
use publisher::create_publisher;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::motion::motion_from_config;
use crate::runner::{FrameLoop, LoopSettings};

/// Build the vehicle proxy, with its camera attached
pub fn vehicle_proxy(config: &VehicleConfig) -> Result<EntityProxy> {
    let mut proxy = EntityProxy::vehicle(config.id.as_str(), config.size);
    proxy.set_pose(config.initial_pose)?;

    if let Some(camera) = &config.camera {
        let mut sensor = SensorDescriptor::new(camera.id.as_str());
        sensor.configure(
            camera.relative_pose,
            camera.fov_deg,
            camera.width,
            camera.height,
            camera.channels,
        )?;
        proxy.attach_sensor(sensor)?;
    }
    Ok(proxy)
}

/// Build a static structure at its configured placement
pub fn static_structure(config: &StaticStructureConfig) -> Result<StaticStructure> {
    let mut structure = StaticStructure::new(config.id.as_str(), config.prefab_id.as_str());
    structure.set_position(config.pose.position)?;
    structure.set_orientation(config.pose.orientation)?;
    structure.set_scale(config.scale)?;
    Ok(structure)
}

/// Register every entity of `blueprint` with a new bridge over `session`.
///
/// Connect and render timeouts are taken from `[engine]`.
pub fn build_bridge<S: EngineSession>(
    blueprint: &SessionBlueprint,
    session: S,
) -> Result<(EngineBridge<S>, EntityHandle)> {
    let engine = &blueprint.engine;
    let mut bridge = EngineBridge::new(session)
        .with_connect_timeout(Duration::from_millis(engine.connect_timeout_ms))
        .with_render_timeout(Duration::from_millis(engine.render_timeout_ms));

    for config in &blueprint.static_structures {
        bridge.add_static_structure(static_structure(config)?)?;
    }
    let handle = bridge.add_vehicle(vehicle_proxy(&blueprint.vehicle)?)?;

    Ok((bridge, handle))
}

/// Stream routes the publisher is built from.
///
/// Routes to channels the camera does not render are skipped. A blueprint
/// without any `[[streams]]` gets one log stream per enabled channel.
pub fn stream_routes(blueprint: &SessionBlueprint) -> Vec<StreamConfig> {
    if blueprint.streams.is_empty() {
        let defaults = blueprint.default_streams();
        if !defaults.is_empty() {
            info!(streams = defaults.len(), "No streams configured, logging every enabled channel");
        }
        return defaults;
    }

    let active: Vec<StreamConfig> = blueprint.active_streams().cloned().collect();
    for skipped in blueprint
        .streams
        .iter()
        .filter(|s| !active.iter().any(|a| a.name == s.name))
    {
        warn!(
            stream = %skipped.name,
            sensor_id = %skipped.sensor_id,
            channel = %skipped.channel,
            "Stream routed to a channel that is not rendered, skipping"
        );
    }
    active
}

/// Assemble a ready-to-run frame loop from `blueprint`.
///
/// Streams are opened here, so this must run inside a tokio runtime.
#[instrument(
    name = "frame_loop_from_blueprint",
    skip(blueprint, session),
    fields(vehicle_id = %blueprint.vehicle.id, scene = %blueprint.engine.scene)
)]
pub async fn from_blueprint<S: EngineSession>(
    blueprint: &SessionBlueprint,
    session: S,
) -> Result<FrameLoop<S>> {
    let (bridge, handle) = build_bridge(blueprint, session)?;
    let publisher = create_publisher(&stream_routes(blueprint)).await?;

    info!(
        static_structures = bridge.static_structure_count(),
        streams = publisher.stream_count(),
        "Session assembled"
    );

    Ok(FrameLoop::new(bridge, handle, publisher)?
        .with_settings(LoopSettings::from(&blueprint.frame_loop))
        .with_boxed_motion(motion_from_config(&blueprint.frame_loop.motion)))
}
