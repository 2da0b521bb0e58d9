//! Agent configuration structs, loading, and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "KILN_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "kiln_agent.toml";

// ============================================================================
// Top-level Config
// ============================================================================

/// Complete agent configuration.
///
/// Every section is optional in the TOML file; missing sections and fields
/// fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentInfo,

    /// Target operating band used by the decision generator
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Hard bounds enforced by the decision validator
    #[serde(default)]
    pub safety: SafetyLimits,

    /// Plausibility ranges applied to incoming telemetry
    #[serde(default)]
    pub sensor_limits: SensorLimits,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub predictor: PredictorConfig,

    #[serde(default)]
    pub monitors: MonitorConfig,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl AgentConfig {
    /// Load configuration using the standard search order:
    /// 1. `$KILN_CONFIG` environment variable
    /// 2. `./kiln_agent.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// Endpoint environment overrides are applied in every case.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.endpoints.apply_env_overrides();
        config
    }

    fn load_file_or_default() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), agent = %config.agent.agent_id, "Loaded agent config from KILN_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from KILN_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "KILN_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(agent = %config.agent.agent_id, "Loaded agent config from ./kiln_agent.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./kiln_agent.toml, using defaults");
                }
            }
        }

        info!("No kiln_agent.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings; consistency failures are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;

        let (_, range_warnings) = super::validation::validate_physical_ranges(&config);
        for w in range_warnings {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all sections for internal consistency.
    ///
    /// Rules:
    /// - Every min/max pair must be strictly ordered
    /// - Safety limits, capacities, and intervals must be positive
    /// - No value may be NaN or infinite
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let t = &self.thresholds;
        Self::check_band(t.min_flame_temp, t.max_flame_temp, "thresholds.flame_temp", &mut errors);
        Self::check_band(t.min_o2, t.max_o2, "thresholds.o2", &mut errors);
        Self::check_positive(t.max_free_cao, "thresholds.max_free_cao", &mut errors);
        Self::check_positive(t.max_co, "thresholds.max_co", &mut errors);
        Self::check_unit(t.min_energy_efficiency, "thresholds.min_energy_efficiency", &mut errors);
        Self::check_unit(t.min_quality_score, "thresholds.min_quality_score", &mut errors);

        let s = &self.safety;
        Self::check_positive(s.max_fuel_adjustment, "safety.max_fuel_adjustment", &mut errors);
        Self::check_positive(s.max_air_adjustment, "safety.max_air_adjustment", &mut errors);
        Self::check_positive(s.max_feed_adjustment, "safety.max_feed_adjustment", &mut errors);
        Self::check_band(s.min_temp_setpoint, s.max_temp_setpoint, "safety.temp_setpoint", &mut errors);

        let l = &self.sensor_limits;
        Self::check_band(l.min_flame_temp, l.max_flame_temp, "sensor_limits.flame_temp", &mut errors);
        Self::check_band(
            l.min_material_temp,
            l.max_material_temp,
            "sensor_limits.material_temp",
            &mut errors,
        );
        Self::check_band(l.min_o2, l.max_o2, "sensor_limits.o2", &mut errors);
        Self::check_band(l.min_co, l.max_co, "sensor_limits.co", &mut errors);
        Self::check_band(l.min_fuel_flow, l.max_fuel_flow, "sensor_limits.fuel_flow", &mut errors);
        if l.max_age_secs <= 0 {
            errors.push(format!("sensor_limits.max_age_secs ({}) must be > 0", l.max_age_secs));
        }

        let v = &self.validator;
        if v.oscillation_window == 0 {
            errors.push("validator.oscillation_window must be > 0".to_string());
        }
        if v.streak_window == 0 || v.streak_max_high == 0 || v.streak_max_high > v.streak_window {
            errors.push(format!(
                "validator.streak_max_high ({}) must be in 1..=streak_window ({})",
                v.streak_max_high, v.streak_window
            ));
        }
        Self::check_finite(v.min_meaningful_adjustment, "validator.min_meaningful_adjustment", &mut errors);

        let c = &self.correction;
        if c.max_attempts == 0 {
            errors.push("correction.max_attempts must be > 0".to_string());
        }
        if !(c.conservative_factor > 0.0 && c.conservative_factor <= 1.0) {
            errors.push(format!(
                "correction.conservative_factor ({:.3}) must be in (0, 1]",
                c.conservative_factor
            ));
        }
        if c.error_escalation_count >= c.error_window {
            errors.push(format!(
                "correction.error_escalation_count ({}) must be < error_window ({})",
                c.error_escalation_count, c.error_window
            ));
        }

        if self.history.capacity == 0 {
            errors.push("history.capacity must be > 0".to_string());
        }
        let needed = v.oscillation_window.max(v.streak_window);
        if self.history.capacity < needed {
            errors.push(format!(
                "history.capacity ({}) must cover the validator windows ({})",
                self.history.capacity, needed
            ));
        }

        let p = &self.predictor;
        Self::check_unit(p.base_confidence, "predictor.base_confidence", &mut errors);
        Self::check_band(p.min_confidence, p.max_confidence, "predictor.confidence", &mut errors);

        let m = &self.monitors;
        for (name, secs) in [
            ("monitors.decision_interval_secs", m.decision_interval_secs),
            ("monitors.heartbeat_interval_secs", m.heartbeat_interval_secs),
            ("monitors.rollup_interval_secs", m.rollup_interval_secs),
        ] {
            if secs == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }
        if m.performance_window == 0 {
            errors.push("monitors.performance_window must be > 0".to_string());
        }

        if self.endpoints.timeout_secs == 0 {
            errors.push("endpoints.timeout_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_finite(value: f64, name: &str, errors: &mut Vec<String>) -> bool {
        if value.is_finite() {
            true
        } else {
            errors.push(format!("{name} ({value}) must be a finite number"));
            false
        }
    }

    fn check_band(min: f64, max: f64, name: &str, errors: &mut Vec<String>) {
        let ok_min = Self::check_finite(min, &format!("{name} min"), errors);
        let ok_max = Self::check_finite(max, &format!("{name} max"), errors);
        if ok_min && ok_max && min >= max {
            errors.push(format!("{name}: min ({min:.3}) must be < max ({max:.3})"));
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        if Self::check_finite(value, name, errors) && value <= 0.0 {
            errors.push(format!("{name} ({value:.3}) must be > 0"));
        }
    }

    fn check_unit(value: f64, name: &str, errors: &mut Vec<String>) {
        if Self::check_finite(value, name, errors) && !(0.0..=1.0).contains(&value) {
            errors.push(format!("{name} ({value:.3}) must be within [0, 1]"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// Identity of this agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    /// Reported to the orchestrator and in escalation alerts
    pub agent_id: String,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            agent_id: "clinkerization_agent".to_string(),
        }
    }
}

/// Target operating thresholds for the burning zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Lower edge of the flame-temperature band (°C)
    pub min_flame_temp: f64,
    /// Upper edge of the flame-temperature band (°C)
    pub max_flame_temp: f64,
    /// Free CaO ceiling (%)
    pub max_free_cao: f64,
    pub min_energy_efficiency: f64,
    pub min_quality_score: f64,
    /// Lower edge of the O2 band (%)
    pub min_o2: f64,
    /// Upper edge of the O2 band (%)
    pub max_o2: f64,
    /// CO ceiling (ppm)
    pub max_co: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_flame_temp: 1400.0,
            max_flame_temp: 1500.0,
            max_free_cao: 2.0,
            min_energy_efficiency: 0.75,
            min_quality_score: 0.85,
            min_o2: 2.0,
            max_o2: 4.0,
            max_co: 100.0,
        }
    }
}

/// Hard per-decision bounds. A decision outside these is never dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// |fuel delta| bound (kg/hr)
    pub max_fuel_adjustment: f64,
    /// |air delta| bound (m³/min)
    pub max_air_adjustment: f64,
    /// |feed delta| bound (t/hr)
    pub max_feed_adjustment: f64,
    pub min_temp_setpoint: f64,
    pub max_temp_setpoint: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_fuel_adjustment: 10.0,
            max_air_adjustment: 20.0,
            max_feed_adjustment: 5.0,
            min_temp_setpoint: 1300.0,
            max_temp_setpoint: 1600.0,
        }
    }
}

/// Plausibility ranges for incoming telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorLimits {
    pub min_flame_temp: f64,
    pub max_flame_temp: f64,
    pub min_material_temp: f64,
    pub max_material_temp: f64,
    pub min_o2: f64,
    pub max_o2: f64,
    pub min_co: f64,
    pub max_co: f64,
    pub min_fuel_flow: f64,
    pub max_fuel_flow: f64,
    /// Oldest acceptable reading when a live clock is supplied (seconds)
    pub max_age_secs: i64,
}

impl Default for SensorLimits {
    fn default() -> Self {
        Self {
            min_flame_temp: 1000.0,
            max_flame_temp: 1800.0,
            min_material_temp: 800.0,
            max_material_temp: 1400.0,
            min_o2: 0.0,
            max_o2: 10.0,
            min_co: 0.0,
            max_co: 1000.0,
            min_fuel_flow: 0.0,
            max_fuel_flow: 200.0,
            max_age_secs: 300,
        }
    }
}

/// Stability-check windows for the decision validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Recent records whose fuel signs must agree
    pub oscillation_window: usize,
    /// Recent records inspected for a HIGH-priority streak
    pub streak_window: usize,
    /// HIGH records within the streak window that trigger rejection
    pub streak_max_high: usize,
    /// A HIGH decision needs at least one delta at or above this
    pub min_meaningful_adjustment: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            oscillation_window: 3,
            streak_window: 5,
            streak_max_high: 4,
            min_meaningful_adjustment: 0.1,
        }
    }
}

/// Self-correction retry budget and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub conservative_factor: f64,
    pub inactivity_reset_secs: i64,
    /// Recent cycles inspected for prediction failures
    pub error_window: usize,
    /// Failures within the window above which an escalation is raised
    pub error_escalation_count: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_CORRECTION_ATTEMPTS,
            backoff_secs: defaults::CORRECTION_BACKOFF_SECS,
            conservative_factor: defaults::CONSERVATIVE_FACTOR,
            inactivity_reset_secs: defaults::CORRECTION_INACTIVITY_RESET_SECS,
            error_window: defaults::PROCESSING_ERROR_WINDOW,
            error_escalation_count: defaults::PROCESSING_ERROR_ESCALATION_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    /// Records attached to an escalation bundle
    pub escalation_context: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::DECISION_HISTORY_CAPACITY,
            escalation_context: defaults::ESCALATION_CONTEXT_RECORDS,
        }
    }
}

/// Confidence model parameters shared by every predictor variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub base_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.8,
            min_confidence: 0.1,
            max_confidence: 1.0,
        }
    }
}

/// Periods and thresholds for the background monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub decision_interval_secs: u64,
    pub decision_error_backoff_secs: u64,
    pub evaluation_delay_secs: i64,
    pub outcome_window_secs: i64,
    pub outcome_max_temp_stddev: f64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_error_backoff_secs: u64,
    pub rollup_interval_secs: u64,
    pub rollup_error_backoff_secs: u64,
    pub rollup_report_secs: i64,
    pub performance_window: usize,
    pub performance_max_high_priority: usize,
    pub performance_max_low_confidence: usize,
    pub performance_low_confidence: f64,
    pub performance_min_mean_quality: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            decision_interval_secs: defaults::DECISION_MONITOR_INTERVAL_SECS,
            decision_error_backoff_secs: defaults::DECISION_MONITOR_ERROR_BACKOFF_SECS,
            evaluation_delay_secs: defaults::OUTCOME_EVALUATION_DELAY_SECS,
            outcome_window_secs: defaults::OUTCOME_WINDOW_SECS,
            outcome_max_temp_stddev: defaults::OUTCOME_MAX_TEMP_STDDEV,
            heartbeat_interval_secs: defaults::HEARTBEAT_INTERVAL_SECS,
            heartbeat_error_backoff_secs: defaults::HEARTBEAT_ERROR_BACKOFF_SECS,
            rollup_interval_secs: defaults::ROLLUP_INTERVAL_SECS,
            rollup_error_backoff_secs: defaults::ROLLUP_ERROR_BACKOFF_SECS,
            rollup_report_secs: defaults::ROLLUP_REPORT_INTERVAL_SECS,
            performance_window: defaults::PERFORMANCE_WINDOW,
            performance_max_high_priority: defaults::PERFORMANCE_MAX_HIGH_PRIORITY,
            performance_max_low_confidence: defaults::PERFORMANCE_MAX_LOW_CONFIDENCE,
            performance_low_confidence: defaults::PERFORMANCE_LOW_CONFIDENCE,
            performance_min_mean_quality: defaults::PERFORMANCE_MIN_MEAN_QUALITY,
        }
    }
}

/// Orchestrator and escalation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Full URL decisions are POSTed to
    pub orchestrator: Option<String>,
    /// Full URL escalation alerts are POSTed to
    pub escalation: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            orchestrator: None,
            escalation: None,
            timeout_secs: defaults::DISPATCH_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    /// Apply `ORCHESTRATOR_ENDPOINT` / `ESCALATION_ENDPOINT` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = non_empty_env("ORCHESTRATOR_ENDPOINT") {
            info!(endpoint = %v, "Orchestrator endpoint overridden from environment");
            self.orchestrator = Some(v);
        }
        if let Some(v) = non_empty_env("ESCALATION_ENDPOINT") {
            info!(endpoint = %v, "Escalation endpoint overridden from environment");
            self.escalation = Some(v);
        }
    }

    /// Where escalation alerts go: the explicit endpoint, else the
    /// orchestrator's alerts path.
    pub fn alerts_url(&self) -> Option<String> {
        if let Some(url) = &self.escalation {
            return Some(url.clone());
        }
        self.orchestrator.as_ref().map(|url| {
            if url.contains(defaults::ORCHESTRATOR_DECISIONS_PATH) {
                url.replace(
                    defaults::ORCHESTRATOR_DECISIONS_PATH,
                    defaults::ORCHESTRATOR_ALERTS_PATH,
                )
            } else {
                format!(
                    "{}{}",
                    url.trim_end_matches('/'),
                    defaults::ORCHESTRATOR_ALERTS_PATH
                )
            }
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Bounded in-process store; nothing survives a restart
    #[default]
    Memory,
    /// sled database at `storage.path`
    Sled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    /// Bound for the in-memory backend (records per tree)
    pub memory_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from(defaults::DEFAULT_STORE_PATH),
            memory_capacity: 10_000,
        }
    }
}
