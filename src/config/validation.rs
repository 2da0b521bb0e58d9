//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! The raw document is walked as a `toml::Value` before serde sees it, so a
//! misspelt key is reported instead of silently falling back to its default.
//! Unknown keys never fail a load.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `AgentConfig`.
///
/// Maintained by hand to match the struct hierarchy in agent_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [agent]
        "agent",
        "agent.agent_id",
        // [thresholds]
        "thresholds",
        "thresholds.min_flame_temp",
        "thresholds.max_flame_temp",
        "thresholds.max_free_cao",
        "thresholds.min_energy_efficiency",
        "thresholds.min_quality_score",
        "thresholds.min_o2",
        "thresholds.max_o2",
        "thresholds.max_co",
        // [safety]
        "safety",
        "safety.max_fuel_adjustment",
        "safety.max_air_adjustment",
        "safety.max_feed_adjustment",
        "safety.min_temp_setpoint",
        "safety.max_temp_setpoint",
        // [sensor_limits]
        "sensor_limits",
        "sensor_limits.min_flame_temp",
        "sensor_limits.max_flame_temp",
        "sensor_limits.min_material_temp",
        "sensor_limits.max_material_temp",
        "sensor_limits.min_o2",
        "sensor_limits.max_o2",
        "sensor_limits.min_co",
        "sensor_limits.max_co",
        "sensor_limits.min_fuel_flow",
        "sensor_limits.max_fuel_flow",
        "sensor_limits.max_age_secs",
        // [validator]
        "validator",
        "validator.oscillation_window",
        "validator.streak_window",
        "validator.streak_max_high",
        "validator.min_meaningful_adjustment",
        // [correction]
        "correction",
        "correction.max_attempts",
        "correction.backoff_secs",
        "correction.conservative_factor",
        "correction.inactivity_reset_secs",
        "correction.error_window",
        "correction.error_escalation_count",
        // [history]
        "history",
        "history.capacity",
        "history.escalation_context",
        // [predictor]
        "predictor",
        "predictor.base_confidence",
        "predictor.min_confidence",
        "predictor.max_confidence",
        // [monitors]
        "monitors",
        "monitors.decision_interval_secs",
        "monitors.decision_error_backoff_secs",
        "monitors.evaluation_delay_secs",
        "monitors.outcome_window_secs",
        "monitors.outcome_max_temp_stddev",
        "monitors.heartbeat_interval_secs",
        "monitors.heartbeat_error_backoff_secs",
        "monitors.rollup_interval_secs",
        "monitors.rollup_error_backoff_secs",
        "monitors.rollup_report_secs",
        "monitors.performance_window",
        "monitors.performance_max_high_priority",
        "monitors.performance_max_low_confidence",
        "monitors.performance_low_confidence",
        "monitors.performance_min_mean_quality",
        // [endpoints]
        "endpoints",
        "endpoints.orchestrator",
        "endpoints.escalation",
        "endpoints.timeout_secs",
        // [storage]
        "storage",
        "storage.backend",
        "storage.path",
        "storage.memory_capacity",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Dotted paths of every key in a TOML tree, tables before their children.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };
    table
        .iter()
        .flat_map(|(key, child)| {
            let path = match prefix {
                "" => key.clone(),
                p => format!("{p}.{key}"),
            };
            let nested = walk_toml_keys(child, &path);
            std::iter::once(path).chain(nested)
        })
        .collect()
}

// ============================================================================
// Edit Distance
// ============================================================================

/// Levenshtein distance over chars, single-row variant.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}

/// Maximum edit distance for a "did you mean" hint.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest known key within `MAX_SUGGESTION_DISTANCE` edits. Ties go to the
/// lexicographically smaller key.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Unknown keys only produce warnings.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    // Syntax errors surface from the serde pass instead
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Cross-section plausibility checks on a parsed `AgentConfig`.
///
/// Returns (errors, warnings). `AgentConfig::validate` owns the hard
/// consistency rules, so this currently yields warnings only: values that
/// are legal but almost certainly a mistake for a rotary kiln.
pub fn validate_physical_ranges(
    config: &super::AgentConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let errors = Vec::new();
    let mut warnings = Vec::new();

    let t = &config.thresholds;
    let l = &config.sensor_limits;
    let s = &config.safety;

    // Target band must sit inside what the sensor validator lets through
    if t.min_flame_temp < l.min_flame_temp || t.max_flame_temp > l.max_flame_temp {
        warnings.push(ValidationWarning {
            field: "thresholds.min_flame_temp".to_string(),
            message: format!(
                "flame target band {:.0}-{:.0} °C extends past the accepted sensor range {:.0}-{:.0} °C",
                t.min_flame_temp, t.max_flame_temp, l.min_flame_temp, l.max_flame_temp
            ),
            suggestion: None,
        });
    }

    // Setpoints outside the target band can never be proposed by the
    // free-CaO rule, which starts at the current flame temperature
    if s.max_temp_setpoint < t.max_flame_temp || s.min_temp_setpoint > t.min_flame_temp {
        warnings.push(ValidationWarning {
            field: "safety.max_temp_setpoint".to_string(),
            message: format!(
                "setpoint limits {:.0}-{:.0} °C do not cover the flame target band {:.0}-{:.0} °C",
                s.min_temp_setpoint, s.max_temp_setpoint, t.min_flame_temp, t.max_flame_temp
            ),
            suggestion: None,
        });
    }

    // Clinker free lime above 5% is outside the predictor's clamp range
    if t.max_free_cao > 5.0 {
        warnings.push(ValidationWarning {
            field: "thresholds.max_free_cao".to_string(),
            message: format!(
                "max_free_cao = {:.2}% is above the predicted range (0-5%) and will never trigger",
                t.max_free_cao
            ),
            suggestion: None,
        });
    }

    if t.max_o2 > l.max_o2 {
        warnings.push(ValidationWarning {
            field: "thresholds.max_o2".to_string(),
            message: format!(
                "max_o2 = {:.1}% is above the accepted sensor ceiling ({:.1}%)",
                t.max_o2, l.max_o2
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("kiln", "kiln"), 0);
        assert_eq!(levenshtein("°C", "°F"), 1);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("max_fule_adjustment", "max_fuel_adjustment"), 2);
        assert_eq!(levenshtein("capacty", "capacity"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [safety]
            max_fuel_adjustment = 8.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"safety".to_string()));
        assert!(keys.contains(&"safety.max_fuel_adjustment".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[history]
capacty = 50
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("capacty"));
        assert_eq!(warnings[0].suggestion.as_deref(), Some("history.capacity"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[agent]
agent_id = "kiln-7"

[thresholds]
max_free_cao = 1.8

[endpoints]
orchestrator = "http://localhost:8000/api/decisions"

[storage]
backend = "sled"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[burner]\nswirl = 3\n");
        assert!(warnings.iter().any(|w| w.field == "burner"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_known_keys_match_serialized_defaults() {
        let raw = AgentConfig::default().to_toml().unwrap();
        let value: toml::Value = raw.parse().unwrap();
        let known = known_config_keys();
        for key in walk_toml_keys(&value, "") {
            assert!(known.contains(key.as_str()), "missing known key {key}");
        }
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&AgentConfig::default());
        assert!(errors.is_empty());
        assert!(warnings.is_empty(), "Defaults should be clean: {:?}", warnings);
    }

    #[test]
    fn test_setpoint_limits_narrower_than_band_warns() {
        let mut config = AgentConfig::default();
        config.safety.max_temp_setpoint = 1450.0;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "safety.max_temp_setpoint"));
    }

    #[test]
    fn test_free_cao_above_clamp_warns() {
        let mut config = AgentConfig::default();
        config.thresholds.max_free_cao = 6.0;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "thresholds.max_free_cao"));
    }
}
