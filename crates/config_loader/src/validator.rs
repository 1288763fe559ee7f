//! 配置校验模块
//!
//! 两层校验：
//! - 字段规则 (`validator` derive)：范围、非空、位姿合法
//! - 交叉规则：id 唯一、流路由指向已知相机、重试与运动参数一致
//!
//! 指向未启用通道的流不算错误，只产生警告 (见 [`lint`])。

use std::collections::HashSet;

use contracts::{ContractError, MotionConfig, SessionBlueprint, Vector3};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 SessionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_entity_ids(blueprint)?;
    validate_sizes(blueprint)?;
    validate_camera(blueprint)?;
    validate_streams(blueprint)?;
    validate_loop(blueprint)?;
    Ok(())
}

/// Non-fatal findings: stream routes that will never receive data
pub fn lint(blueprint: &SessionBlueprint) -> Vec<String> {
    if blueprint.streams.is_empty() {
        return vec!["no streams configured, rendered frames will not be published".to_string()];
    }
    let Some(camera) = blueprint.camera() else {
        return vec!["streams are configured but the vehicle has no camera".to_string()];
    };

    blueprint
        .streams
        .iter()
        .filter(|stream| !camera.channels.is_enabled(stream.channel))
        .map(|stream| {
            format!(
                "stream '{}' routes channel {} which camera '{}' does not render",
                stream.name, stream.channel, camera.id
            )
        })
        .collect()
}

/// 字段规则，报告第一个失败字段
fn validate_fields(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error(&errors, String::new())
                .unwrap_or_else(|| ("<root>".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Depth-first search for the first field error, with its dotted path
fn first_error(errors: &ValidationErrors, prefix: String) -> Option<(String, String)> {
    let mut keys: Vec<_> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        let found = match &errors.errors()[key] {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_error(inner, path.clone()),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(index, inner)| first_error(inner, format!("{path}[{index}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// 校验实体 id 全局唯一 (载具、相机、静态结构)
fn validate_entity_ids(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    seen.insert(blueprint.vehicle.id.as_str());

    if let Some(camera) = blueprint.camera() {
        if !seen.insert(camera.id.as_str()) {
            return Err(ContractError::config_validation(
                "vehicle.camera.id",
                format!("camera id '{}' collides with the vehicle id", camera.id),
            ));
        }
    }

    for (idx, structure) in blueprint.static_structures.iter().enumerate() {
        if !seen.insert(structure.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("static_structures[{idx}].id"),
                format!("duplicate entity id '{}'", structure.id),
            ));
        }
    }
    Ok(())
}

fn validate_sizes(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    check_positive("vehicle.size", &blueprint.vehicle.size)?;
    for (idx, structure) in blueprint.static_structures.iter().enumerate() {
        check_positive(&format!("static_structures[{idx}].scale"), &structure.scale)?;
    }
    Ok(())
}

fn check_positive(field: &str, v: &Vector3) -> Result<(), ContractError> {
    if v.is_finite() && v.x > 0.0 && v.y > 0.0 && v.z > 0.0 {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("components must be finite and > 0, got ({}, {}, {})", v.x, v.y, v.z),
        ))
    }
}

fn validate_camera(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    if let Some(camera) = blueprint.camera() {
        if camera.channels.count() == 0 {
            return Err(ContractError::config_validation(
                "vehicle.camera.channels",
                "at least one channel must be enabled",
            ));
        }
    }
    Ok(())
}

/// 校验流路由
fn validate_streams(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    let mut routes = HashSet::new();

    for (idx, stream) in blueprint.streams.iter().enumerate() {
        if !names.insert(stream.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("streams[{idx}].name"),
                format!("duplicate stream name '{}'", stream.name),
            ));
        }

        let known = blueprint
            .camera()
            .is_some_and(|camera| camera.id == stream.sensor_id);
        if !known {
            return Err(ContractError::config_validation(
                format!("streams[{idx}].sensor_id"),
                format!("sensor '{}' is not a configured camera", stream.sensor_id),
            ));
        }

        if !routes.insert((stream.sensor_id.as_str(), stream.channel)) {
            return Err(ContractError::config_validation(
                format!("streams[{idx}].channel"),
                format!(
                    "channel {} of '{}' is routed to more than one stream",
                    stream.channel, stream.sensor_id
                ),
            ));
        }
    }
    Ok(())
}

/// 校验帧循环参数
fn validate_loop(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let frame_loop = &blueprint.frame_loop;
    let retry = &frame_loop.retry;

    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            "loop.retry.initial_backoff_ms / loop.retry.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }

    if let Some(rate) = frame_loop.tick_rate_hz {
        if !rate.is_finite() {
            return Err(ContractError::config_validation(
                "loop.tick_rate_hz",
                "tick_rate_hz must be finite",
            ));
        }
    }

    if let MotionConfig::VerticalOscillation { min_z, max_z, step } = frame_loop.motion {
        if !(min_z.is_finite() && max_z.is_finite() && min_z < max_z) {
            return Err(ContractError::config_validation(
                "loop.motion",
                format!("min_z ({min_z}) must be < max_z ({max_z})"),
            ));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(ContractError::config_validation(
                "loop.motion.step",
                format!("step must be > 0, got {step}"),
            ));
        }
    }
    Ok(())
}
