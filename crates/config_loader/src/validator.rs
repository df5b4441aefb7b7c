//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (derive 规则，见 contracts)
//! - warning_db < violation_db
//! - 阈值符号：acceleration < 0, brake > 0, turn > 0
//! - min_trip_ms <= max_trip_ms
//! - storage 必填字段齐全
//! - simulation 采样率 > 0，坐标合法

use std::collections::HashSet;

use ::validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};
use contracts::{AppConfig, ContractError, StoreType};

/// Parameter naming the trip directory for the file store
pub const FILE_STORE_PATH_PARAM: &str = "path";

/// 校验 AppConfig
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &AppConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_noise_levels(config)?;
    validate_thresholds(config)?;
    validate_trip_bounds(config)?;
    validate_storage(config)?;
    validate_simulation(config)?;
    Ok(())
}

/// Non-fatal findings worth showing to the user
pub fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.simulation.is_none() {
        warnings.push("no [simulation] section: mock sources will drive a default script".into());
    }
    if config.storage.store_type == StoreType::Memory {
        warnings.push("memory store selected: trips are lost when the process exits".into());
    }
    if config.detection.motion.min_sample_interval_ms == 0 {
        warnings.push("detection.motion.min_sample_interval_ms is 0: motion ticks are never throttled".into());
    }
    if config.detection.noise.poll_interval_ms > config.detection.noise.sustained_ms {
        warnings.push(format!(
            "detection.noise.poll_interval_ms ({}) exceeds sustained_ms ({}): sustained noise fires late",
            config.detection.noise.poll_interval_ms, config.detection.noise.sustained_ms
        ));
    }

    if let Some(script) = &config.simulation {
        let mut seen = HashSet::new();
        for maneuver in &script.maneuvers {
            if !seen.insert(maneuver.start_ms) {
                warnings.push(format!(
                    "simulation.maneuvers: more than one maneuver starts at {} ms",
                    maneuver.start_ms
                ));
            }
        }
    }

    warnings
}

/// derive 规则 (validator crate)
fn validate_ranges(config: &AppConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("<config>".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Walk nested validation errors in field order and report the first one
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        let found = match kind {
            ValidationErrorsKind::Field(list) => {
                list.first().map(|e| (path.clone(), describe(e)))
            }
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_violation(inner, &format!("{path}[{idx}]"))),
        };

        if found.is_some() {
            return found;
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    let base = match &error.message {
        Some(message) => message.to_string(),
        None => format!("failed '{}' check", error.code),
    };
    match error.params.get("value") {
        Some(value) => format!("{base} (got {value})"),
        None => base,
    }
}

/// 噪声阈值顺序
fn validate_noise_levels(config: &AppConfig) -> Result<(), ContractError> {
    let noise = &config.detection.noise;
    if noise.warning_db >= noise.violation_db {
        return Err(ContractError::config_validation(
            "detection.noise.warning_db / detection.noise.violation_db",
            format!(
                "warning_db ({}) must be < violation_db ({})",
                noise.warning_db, noise.violation_db
            ),
        ));
    }
    Ok(())
}

/// 阈值符号
fn validate_thresholds(config: &AppConfig) -> Result<(), ContractError> {
    let classifier = &config.detection.classifier;

    if classifier.acceleration_threshold >= 0.0 {
        return Err(ContractError::config_validation(
            "detection.classifier.acceleration_threshold",
            format!(
                "acceleration_threshold must be < 0, got {}",
                classifier.acceleration_threshold
            ),
        ));
    }
    if classifier.brake_threshold <= 0.0 {
        return Err(ContractError::config_validation(
            "detection.classifier.brake_threshold",
            format!("brake_threshold must be > 0, got {}", classifier.brake_threshold),
        ));
    }
    if classifier.turn_threshold <= 0.0 {
        return Err(ContractError::config_validation(
            "detection.classifier.turn_threshold",
            format!("turn_threshold must be > 0, got {}", classifier.turn_threshold),
        ));
    }
    Ok(())
}

fn validate_trip_bounds(config: &AppConfig) -> Result<(), ContractError> {
    let session = &config.detection.session;
    if session.min_trip_ms > session.max_trip_ms {
        return Err(ContractError::config_validation(
            "detection.session.min_trip_ms / detection.session.max_trip_ms",
            format!(
                "min_trip_ms ({}) must be <= max_trip_ms ({})",
                session.min_trip_ms, session.max_trip_ms
            ),
        ));
    }
    Ok(())
}

/// 校验 storage 配置
fn validate_storage(config: &AppConfig) -> Result<(), ContractError> {
    let storage = &config.storage;

    if storage.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "storage.name",
            "store name cannot be empty",
        ));
    }
    if storage.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "storage.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }
    if storage.store_type == StoreType::File
        && storage
            .params
            .get(FILE_STORE_PATH_PARAM)
            .map_or(true, |p| p.trim().is_empty())
    {
        return Err(ContractError::config_validation(
            "storage.params.path",
            "file store requires a 'path' parameter",
        ));
    }
    Ok(())
}

/// 校验模拟脚本
fn validate_simulation(config: &AppConfig) -> Result<(), ContractError> {
    let Some(script) = &config.simulation else {
        return Ok(());
    };

    if script.motion_hz <= 0.0 || script.location_hz <= 0.0 {
        return Err(ContractError::config_validation(
            "simulation.motion_hz / simulation.location_hz",
            format!(
                "rates must be > 0, got motion_hz={} location_hz={}",
                script.motion_hz, script.location_hz
            ),
        ));
    }
    if !(-90.0..=90.0).contains(&script.origin.latitude)
        || !(-180.0..=180.0).contains(&script.origin.longitude)
    {
        return Err(ContractError::config_validation(
            "simulation.origin",
            format!(
                "origin ({}, {}) is not a valid coordinate",
                script.origin.latitude, script.origin.longitude
            ),
        ));
    }
    for (idx, maneuver) in script.maneuvers.iter().enumerate() {
        if maneuver.duration_ms == 0 {
            return Err(ContractError::config_validation(
                format!("simulation.maneuvers[{idx}].duration_ms"),
                "maneuver duration must be > 0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DriveScript, GeoPoint, Maneuver, ManeuverKind};

    fn script() -> DriveScript {
        DriveScript {
            motion_hz: 20.0,
            location_hz: 1.0,
            origin: GeoPoint {
                latitude: 48.137,
                longitude: 11.575,
            },
            heading_deg: 90.0,
            cruise_speed_mps: 11.0,
            fix_accuracy_m: 5.0,
            ambient_db: 60.0,
            rest_bias: [0.0, 0.0, 9.81],
            maneuvers: vec![Maneuver {
                kind: ManeuverKind::SharpTurn,
                start_ms: 35_000,
                duration_ms: 2_000,
                intensity: 4.0,
            }],
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_range_error_reports_nested_path() {
        let mut config = AppConfig::default();
        config.detection.motion.smoothing_alpha = 1.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("detection.motion.smoothing_alpha"), "got: {err}");
    }

    #[test]
    fn test_trip_defaults_out_of_range() {
        let mut config = AppConfig::default();
        config.trip.speed_limit_kmh = 200;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("trip.speed_limit_kmh"), "got: {err}");
    }

    #[test]
    fn test_warning_above_violation() {
        let mut config = AppConfig::default();
        config.detection.noise.warning_db = 85.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must be < violation_db"), "got: {err}");
    }

    #[test]
    fn test_positive_acceleration_threshold() {
        let mut config = AppConfig::default();
        config.detection.classifier.acceleration_threshold = 3.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("acceleration_threshold must be < 0"), "got: {err}");
    }

    #[test]
    fn test_min_trip_above_max() {
        let mut config = AppConfig::default();
        config.detection.session.min_trip_ms = config.detection.session.max_trip_ms + 1;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("min_trip_ms"), "got: {err}");
    }

    #[test]
    fn test_file_store_requires_path() {
        let mut config = AppConfig::default();
        config.storage.store_type = StoreType::File;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("'path'"), "got: {err}");

        config
            .storage
            .params
            .insert(FILE_STORE_PATH_PARAM.into(), "/tmp/trips".into());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_store_name() {
        let mut config = AppConfig::default();
        config.storage.name = "  ".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_simulation_rules() {
        let mut config = AppConfig {
            simulation: Some(script()),
            ..Default::default()
        };
        assert!(validate(&config).is_ok());

        if let Some(s) = config.simulation.as_mut() {
            s.origin.latitude = 95.0;
        }
        assert!(validate(&config).is_err());

        let mut config = AppConfig {
            simulation: Some(script()),
            ..Default::default()
        };
        if let Some(s) = config.simulation.as_mut() {
            s.maneuvers[0].duration_ms = 0;
        }
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("maneuvers[0]"), "got: {err}");
    }

    #[test]
    fn test_warnings() {
        let config = AppConfig::default();
        let found = warnings(&config);
        assert!(found.iter().any(|w| w.contains("[simulation]")));

        let mut script = script();
        script.maneuvers.push(script.maneuvers[0]);
        let config = AppConfig {
            simulation: Some(script),
            ..Default::default()
        };
        let found = warnings(&config);
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("35000"));
    }
}
