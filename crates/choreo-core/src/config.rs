//! TOML-based configuration.
//!
//! Holds the pacing of progress runs, the transition delay of the completion
//! gate, the selection seed, and where the analysis service lives. An
//! optional `patterns` array replaces the built-in catalog.
//!
//! Configuration is stored at `~/.config/choreo/config.toml`
//! (`~/.config/choreo-dev/` when `CHOREO_ENV=dev`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::pattern::{builtin_catalog, Pacing, PatternSelector, TimingPattern};

/// Returns `~/.config/choreo[-dev]/` based on CHOREO_ENV.
///
/// Set CHOREO_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CHOREO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("choreo-dev")
    } else {
        base_dir.join("choreo")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Completion gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Wait between both signals arriving and the downstream transition.
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,
}

/// Pattern selection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Fixed seed for reproducible picks. Unset means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Analysis service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/choreo/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoreoConfig {
    /// Custom catalog. Empty means the built-in patterns.
    #[serde(default)]
    pub patterns: Vec<TimingPattern>,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_transition_delay_ms() -> u64 {
    500
}
fn default_endpoint() -> String {
    "http://localhost:5000/api/audit/upload".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: default_transition_delay_ms(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ChoreoConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => Self::parse_number(value).map_err(invalid)?,
                // Unset optional: clear it, or take a number.
                serde_json::Value::Null => match value {
                    "" | "none" | "null" => serde_json::Value::Null,
                    _ => Self::parse_number(value).map_err(invalid)?,
                },
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                serde_json::Value::String(_) => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn parse_number(value: &str) -> std::result::Result<serde_json::Value, String> {
        if let Ok(n) = value.parse::<u64>() {
            Ok(serde_json::Value::Number(n.into()))
        } else if let Ok(n) = value.parse::<f64>() {
            serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| format!("cannot parse '{value}' as number"))
        } else {
            Err(format!("cannot parse '{value}' as number"))
        }
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing a default file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into())
            }
        };
        let cfg: ChoreoConfig = toml::from_str(&content).map_err(ConfigError::from)?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The result must still
    /// validate; on error `self` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the updated configuration is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: ChoreoConfig =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check pacing, the endpoint URL and every pattern in the effective
    /// catalog (the built-in one when no custom patterns are set).
    pub fn validate(&self) -> Result<()> {
        self.pacing.validate()?;
        url::Url::parse(&self.analysis.endpoint).map_err(|e| ConfigError::InvalidValue {
            key: "analysis.endpoint".into(),
            message: e.to_string(),
        })?;
        for pattern in &self.catalog() {
            pattern.validate(&self.pacing)?;
        }
        Ok(())
    }

    /// Custom patterns when configured, the built-in catalog otherwise.
    pub fn catalog(&self) -> Vec<TimingPattern> {
        if self.patterns.is_empty() {
            builtin_catalog()
        } else {
            self.patterns.clone()
        }
    }

    /// Selector over [`catalog`](Self::catalog), seeded from `selection.seed`.
    pub fn selector(&self) -> Result<PatternSelector> {
        Ok(PatternSelector::new(
            self.catalog(),
            &self.pacing,
            self.selection.seed,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, PatternConfigError};

    #[test]
    fn default_config_roundtrip() {
        let cfg = ChoreoConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ChoreoConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = ChoreoConfig::default();
        assert_eq!(cfg.pacing.tick_interval_ms, 30);
        assert_eq!(cfg.pacing.run_duration_ms, 3000);
        assert_eq!(cfg.pacing.total_segments, 8);
        assert_eq!(cfg.pacing.warmup_ticks, 5);
        assert_eq!(cfg.pacing.settle_delay_ms, 200);
        assert_eq!(cfg.gate.transition_delay_ms, 500);
        assert_eq!(cfg.selection.seed, None);
        assert_eq!(cfg.analysis.endpoint, "http://localhost:5000/api/audit/upload");
        assert!(cfg.patterns.is_empty());
        assert_eq!(cfg.catalog().len(), 10);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: ChoreoConfig = toml::from_str("[gate]\ntransition_delay_ms = 250\n").unwrap();
        assert_eq!(cfg.gate.transition_delay_ms, 250);
        assert_eq!(cfg.pacing, Pacing::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = ChoreoConfig::default();
        assert_eq!(cfg.get("pacing.tick_interval_ms").as_deref(), Some("30"));
        assert_eq!(cfg.get("gate.transition_delay_ms").as_deref(), Some("500"));
        assert_eq!(cfg.get("selection.seed").as_deref(), Some("null"));
        assert!(cfg.get("pacing.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_number_and_optional_seed() {
        let mut cfg = ChoreoConfig::default();
        cfg.set("gate.transition_delay_ms", "750").unwrap();
        assert_eq!(cfg.gate.transition_delay_ms, 750);

        cfg.set("selection.seed", "none").unwrap();
        assert_eq!(cfg.selection.seed, None);
        cfg.set("selection.seed", "42").unwrap();
        assert_eq!(cfg.selection.seed, Some(42));
        cfg.set("selection.seed", "43").unwrap();
        assert_eq!(cfg.selection.seed, Some(43));
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = ChoreoConfig::default();
        let err = cfg.set("pacing.nonexistent", "1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = ChoreoConfig::default();
        assert!(cfg.set("pacing.tick_interval_ms", "fast").is_err());
        assert_eq!(cfg, ChoreoConfig::default());
    }

    #[test]
    fn set_rejects_values_that_break_pacing() {
        let mut cfg = ChoreoConfig::default();
        let err = cfg.set("pacing.run_duration_ms", "3010").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg.pacing.run_duration_ms, 3000);
    }

    #[test]
    fn set_rejects_values_that_break_builtin_catalog() {
        let mut cfg = ChoreoConfig::default();
        let err = cfg.set("pacing.total_segments", "4").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Pattern(PatternConfigError::SpeedTableLength { expected: 4, .. })
        ));
        assert_eq!(cfg, ChoreoConfig::default());
        assert!(crate::Choreographer::new(&cfg).is_ok());
    }

    #[test]
    fn set_rejects_bad_endpoint() {
        let mut cfg = ChoreoConfig::default();
        assert!(cfg.set("analysis.endpoint", "not a url").is_err());
        cfg.set("analysis.endpoint", "https://audit.example.com/upload").unwrap();
        assert_eq!(cfg.analysis.endpoint, "https://audit.example.com/upload");
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = ChoreoConfig::default();
        cfg.set("selection.seed", "7").unwrap();
        cfg.patterns = vec![TimingPattern::new("flat", vec![1.0; 8], vec![2], vec![300])];
        cfg.save_to(&path).unwrap();

        let loaded = ChoreoConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.catalog().len(), 1);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ChoreoConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, ChoreoConfig::default());
    }

    #[test]
    fn load_rejects_invalid_custom_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[[patterns]]
name = "too-slow"
speeds = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
"#,
        )
        .unwrap();

        let err = ChoreoConfig::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Pattern(PatternConfigError::Unreachable { .. })
        ));
    }

    #[test]
    fn load_rejects_unparseable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pacing = [").unwrap();
        let err = ChoreoConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn seeded_selector_is_reproducible() {
        let mut cfg = ChoreoConfig::default();
        cfg.selection.seed = Some(99);
        let a: Vec<usize> = {
            let mut s = cfg.selector().unwrap();
            (0..16).map(|_| s.select_index()).collect()
        };
        let b: Vec<usize> = {
            let mut s = cfg.selector().unwrap();
            (0..16).map(|_| s.select_index()).collect()
        };
        assert_eq!(a, b);
    }
}
