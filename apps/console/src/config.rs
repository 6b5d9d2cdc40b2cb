use std::{fs, io, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use coordinator::CoordinatorConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    Never,
    #[default]
    Random,
    Offline,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "random" => Ok(Self::Random),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown failure mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub failure_mode: FailureMode,
    pub failure_rate: f64,
    pub failure_seed: Option<u64>,
    pub commit_latency_ms: u64,
    pub pending_ttl_seconds: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            failure_mode: FailureMode::Random,
            failure_rate: 0.2,
            failure_seed: None,
            commit_latency_ms: 300,
            pending_ttl_seconds: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn commit_latency(&self) -> Duration {
        Duration::from_millis(self.commit_latency_ms)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            pending_ttl: self.pending_ttl_seconds.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    failure_mode: Option<FailureMode>,
    failure_rate: Option<f64>,
    failure_seed: Option<u64>,
    commit_latency_ms: Option<u64>,
    pending_ttl_seconds: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then `path` if it exists, then `APP__*` environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = parse_file_settings(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
            apply_file_settings(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    Ok(toml::from_str::<FileSettings>(raw)?)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.failure_mode {
        settings.failure_mode = v;
    }
    if let Some(v) = file_cfg.failure_rate {
        settings.failure_rate = v;
    }
    if let Some(v) = file_cfg.failure_seed {
        settings.failure_seed = Some(v);
    }
    if let Some(v) = file_cfg.commit_latency_ms {
        settings.commit_latency_ms = v;
    }
    if let Some(v) = file_cfg.pending_ttl_seconds {
        settings.pending_ttl_seconds = Some(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
}

/// Unparseable values are ignored and the previous value kept.
fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__FAILURE_MODE") {
        if let Ok(parsed) = v.parse() {
            settings.failure_mode = parsed;
        }
    }
    if let Some(v) = lookup("APP__FAILURE_RATE") {
        if let Ok(parsed) = v.trim().parse::<f64>() {
            settings.failure_rate = parsed;
        }
    }
    if let Some(v) = lookup("APP__FAILURE_SEED") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.failure_seed = Some(parsed);
        }
    }
    if let Some(v) = lookup("APP__COMMIT_LATENCY_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.commit_latency_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__PENDING_TTL_SECONDS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.pending_ttl_seconds = Some(parsed);
        }
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}
