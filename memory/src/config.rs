//! Configuration resolution.
//!
//! Every option has a snake_case settings key and an environment variable
//! named `MEMORY_<KEY>` (`prefetch_max_chars` / `MEMORY_PREFETCH_MAX_CHARS`).
//! Precedence: environment, then the settings file's `agents.<id>` override,
//! then the settings file's top level, then the built-in default.
//!
//! Numeric options have a floor. A value below its floor, or one that does
//! not parse, is replaced by the default with a warning; configuration never
//! fails hard.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use memory_core::{BackendKind, MemoryConfig, MemoryError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Env var naming the optional JSON settings file.
pub const SETTINGS_FILE_ENV: &str = "MEMORY_SETTINGS_FILE";

/// Parsed settings file.
///
/// ```json
/// {
///   "prefetch_max_chars": 1500,
///   "gate_skip_patterns": ["weather"],
///   "agents": { "ops": { "backend": "vector" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MemorySettings {
    #[serde(default)]
    pub agents: HashMap<String, Map<String, Value>>,
    #[serde(flatten)]
    pub global: Map<String, Value>,
}

impl MemorySettings {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MemoryError::Configuration(format!("invalid settings file: {}", e)))
    }

    /// Reads the settings file; a missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No memory settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the file named by `MEMORY_SETTINGS_FILE`, if any. Errors are
    /// logged and replaced by empty settings.
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(SETTINGS_FILE_ENV) else {
            return Self::default();
        };
        Self::load(Path::new(&path)).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "Ignoring unreadable memory settings file");
            Self::default()
        })
    }
}

/// Where a raw value came from; used in warnings.
#[derive(Debug, Clone, Copy)]
enum Source {
    Env,
    Agent,
    Global,
}

enum Raw {
    Text(String),
    Json(Value),
}

impl Raw {
    fn as_text(&self) -> Option<String> {
        match self {
            Raw::Text(s) => Some(s.trim().to_string()),
            Raw::Json(Value::String(s)) => Some(s.trim().to_string()),
            Raw::Json(Value::Number(n)) => Some(n.to_string()),
            Raw::Json(Value::Bool(b)) => Some(b.to_string()),
            Raw::Json(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Raw::Text(s) => s.clone(),
            Raw::Json(v) => v.to_string(),
        }
    }
}

pub fn env_name(key: &str) -> String {
    format!("MEMORY_{}", key.to_ascii_uppercase())
}

struct Resolver<'a, F> {
    global: &'a Map<String, Value>,
    agent: Option<&'a Map<String, Value>>,
    env: F,
}

impl<'a, F> Resolver<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<(Source, Raw)> {
        if let Some(value) = (self.env)(&env_name(key)).filter(|v| !v.trim().is_empty()) {
            return Some((Source::Env, Raw::Text(value)));
        }
        if let Some(value) = self.agent.and_then(|agent| agent.get(key)).filter(|v| !v.is_null()) {
            return Some((Source::Agent, Raw::Json(value.clone())));
        }
        self.global
            .get(key)
            .filter(|v| !v.is_null())
            .map(|value| (Source::Global, Raw::Json(value.clone())))
    }

    fn invalid<T: std::fmt::Debug>(&self, key: &str, source: Source, raw: &Raw, default: T) -> T {
        let error = MemoryError::Configuration(format!("{}={}", key, raw.describe()));
        warn!(
            key = key,
            source = ?source,
            default = ?default,
            reason = %error.reason_code(),
            "Invalid memory setting, using default: {}",
            error
        );
        default
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        let Some((source, raw)) = self.raw(key) else {
            return default;
        };
        let parsed = match &raw {
            Raw::Json(Value::Bool(b)) => Some(*b),
            _ => raw.as_text().and_then(|text| match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }),
        };
        parsed.unwrap_or_else(|| self.invalid(key, source, &raw, default))
    }

    fn number(&self, key: &str, default: f64, floor: f64) -> f64 {
        let Some((source, raw)) = self.raw(key) else {
            return default;
        };
        match raw.as_text().and_then(|text| text.parse::<f64>().ok()) {
            Some(value) if value.is_finite() && value >= floor => value,
            _ => self.invalid(key, source, &raw, default),
        }
    }

    fn optional_number(&self, key: &str, floor: f64) -> Option<f64> {
        let (source, raw) = self.raw(key)?;
        match raw.as_text().and_then(|text| text.parse::<f64>().ok()) {
            Some(value) if value.is_finite() && value >= floor => Some(value),
            _ => self.invalid(key, source, &raw, None),
        }
    }

    fn count(&self, key: &str, default: u64, floor: u64) -> u64 {
        let Some((source, raw)) = self.raw(key) else {
            return default;
        };
        match raw.as_text().and_then(|text| text.parse::<u64>().ok()) {
            Some(value) if value >= floor => value,
            _ => self.invalid(key, source, &raw, default),
        }
    }

    fn size(&self, key: &str, default: usize, floor: usize) -> usize {
        self.count(key, default as u64, floor as u64) as usize
    }

    fn millis(&self, key: &str, default: Duration, floor_ms: u64) -> Duration {
        Duration::from_millis(self.count(key, default.as_millis() as u64, floor_ms))
    }

    fn text(&self, key: &str, default: &str) -> String {
        let Some((source, raw)) = self.raw(key) else {
            return default.to_string();
        };
        match raw.as_text().filter(|text| !text.is_empty()) {
            Some(text) => text,
            None => self.invalid(key, source, &raw, default.to_string()),
        }
    }

    /// Comma-separated in the environment, array or comma-separated string in the file.
    fn list(&self, key: &str) -> Vec<String> {
        let Some((source, raw)) = self.raw(key) else {
            return Vec::new();
        };
        let items: Option<Vec<String>> = match &raw {
            Raw::Json(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(|s| s.trim().to_string()))
                .collect(),
            _ => raw
                .as_text()
                .map(|text| text.split(',').map(|s| s.trim().to_string()).collect()),
        };
        match items {
            Some(items) => items.into_iter().filter(|s| !s.is_empty()).collect(),
            None => self.invalid(key, source, &raw, Vec::new()),
        }
    }

    fn backend(&self, key: &str, default: BackendKind) -> BackendKind {
        let Some((source, raw)) = self.raw(key) else {
            return default;
        };
        match raw.as_text().map(|text| text.parse::<BackendKind>()) {
            Some(Ok(kind)) => kind,
            _ => self.invalid(key, source, &raw, default),
        }
    }
}

/// Resolves the config for `agent_id` (or the global config when `None`)
/// against `settings` and an environment lookup.
pub fn resolve_with<F>(settings: &MemorySettings, agent_id: Option<&str>, env: F) -> MemoryConfig
where
    F: Fn(&str) -> Option<String>,
{
    let resolver = Resolver {
        global: &settings.global,
        agent: agent_id.and_then(|id| settings.agents.get(id)),
        env,
    };
    let d = MemoryConfig::default();

    MemoryConfig {
        backend: resolver.backend("backend", d.backend),
        prefetch_enabled: resolver.flag("prefetch_enabled", d.prefetch_enabled),
        native_search_enabled: resolver.flag("native_search_enabled", d.native_search_enabled),
        native_session_enabled: resolver.flag("native_session_enabled", d.native_session_enabled),
        legacy_sync_enabled: resolver.flag("legacy_sync_enabled", d.legacy_sync_enabled),
        archive_mirror_enabled: resolver.flag("archive_mirror_enabled", d.archive_mirror_enabled),
        debug_dump_enabled: resolver.flag("debug_dump_enabled", d.debug_dump_enabled),
        gate_enabled: resolver.flag("gate_enabled", d.gate_enabled),
        gate_escalation_enabled: resolver
            .flag("gate_escalation_enabled", d.gate_escalation_enabled),
        gate_threshold: resolver.number("gate_threshold", d.gate_threshold, 1.0),
        gate_ambiguity_low: resolver.number("gate_ambiguity_low", d.gate_ambiguity_low, 0.0),
        gate_ambiguity_high: resolver.number("gate_ambiguity_high", d.gate_ambiguity_high, 0.0),
        gate_force_patterns: resolver.list("gate_force_patterns"),
        gate_skip_patterns: resolver.list("gate_skip_patterns"),
        prefetch_timeout: resolver.millis("prefetch_timeout_ms", d.prefetch_timeout, 100),
        commit_timeout: resolver.millis("commit_timeout_ms", d.commit_timeout, 500),
        prefetch_max_chars: resolver.size("prefetch_max_chars", d.prefetch_max_chars, 200),
        prefetch_max_turns: resolver.size("prefetch_max_turns", d.prefetch_max_turns, 1),
        prefetch_max_hits: resolver.size("prefetch_max_hits", d.prefetch_max_hits, 1),
        search_score_threshold: resolver.optional_number("search_score_threshold", 0.0),
        legacy_search_limit: resolver.size("legacy_search_limit", d.legacy_search_limit, 1),
        tool_bin: resolver.text("tool_bin", &d.tool_bin),
        state_dir: PathBuf::from(resolver.text("state_dir", &d.state_dir.to_string_lossy())),
        remote_root: resolver.text("remote_root", &d.remote_root),
        vector_bin: resolver.text("vector_bin", &d.vector_bin),
        vector_collection: resolver.text("vector_collection", &d.vector_collection),
        vector_top_k: resolver.size("vector_top_k", d.vector_top_k, 1),
        vector_min_score: resolver.number("vector_min_score", d.vector_min_score, 0.0),
    }
}

/// [`resolve_with`] against the process environment.
pub fn resolve(settings: &MemorySettings, agent_id: Option<&str>) -> MemoryConfig {
    resolve_with(settings, agent_id, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::env;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn settings(value: Value) -> MemorySettings {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = resolve_with(&MemorySettings::default(), Some("main"), no_env);
        assert_eq!(config, MemoryConfig::default());
    }

    #[test]
    fn test_precedence_env_agent_global() {
        let settings = settings(json!({
            "prefetch_max_chars": 1500,
            "prefetch_max_turns": 3,
            "backend": "native",
            "agents": {"ops": {"prefetch_max_turns": 4, "backend": "vector"}}
        }));
        let env = |name: &str| (name == "MEMORY_PREFETCH_MAX_TURNS").then(|| "9".to_string());

        let ops = resolve_with(&settings, Some("ops"), env);
        assert_eq!(ops.prefetch_max_chars, 1500);
        assert_eq!(ops.prefetch_max_turns, 9);
        assert_eq!(ops.backend, BackendKind::Vector);

        let ops_no_env = resolve_with(&settings, Some("ops"), no_env);
        assert_eq!(ops_no_env.prefetch_max_turns, 4);

        let other = resolve_with(&settings, Some("other"), no_env);
        assert_eq!(other.prefetch_max_turns, 3);
        assert_eq!(other.backend, BackendKind::Native);
    }

    #[test]
    fn test_floors_and_invalid_values_fall_back() {
        let settings = settings(json!({
            "prefetch_max_chars": 10,
            "prefetch_timeout_ms": "soon",
            "gate_threshold": 0.5,
            "vector_min_score": -1,
            "legacy_sync_enabled": "maybe",
            "backend": "sqlite",
            "search_score_threshold": 0.25
        }));
        let config = resolve_with(&settings, None, no_env);
        let d = MemoryConfig::default();

        assert_eq!(config.prefetch_max_chars, d.prefetch_max_chars);
        assert_eq!(config.prefetch_timeout, d.prefetch_timeout);
        assert_eq!(config.gate_threshold, d.gate_threshold);
        assert_eq!(config.vector_min_score, d.vector_min_score);
        assert_eq!(config.legacy_sync_enabled, d.legacy_sync_enabled);
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.search_score_threshold, Some(0.25));
    }

    #[test]
    fn test_pattern_lists() {
        let settings = settings(json!({"gate_skip_patterns": ["stock price", " ", "weather"]}));
        let env = |name: &str| {
            (name == "MEMORY_GATE_FORCE_PATTERNS")
                .then(|| "per my notes, , from memory".to_string())
        };
        let config = resolve_with(&settings, None, env);
        assert_eq!(config.gate_skip_patterns, vec!["stock price", "weather"]);
        assert_eq!(config.gate_force_patterns, vec!["per my notes", "from memory"]);
    }

    #[test]
    fn test_settings_file_parse_error() {
        assert!(MemorySettings::from_json("{oops").is_err());
        let loaded = MemorySettings::load(Path::new("/nonexistent/memory.json")).unwrap();
        assert_eq!(loaded, MemorySettings::default());
    }

    #[test]
    #[serial]
    fn test_resolve_reads_process_env() {
        env::set_var("MEMORY_PREFETCH_TIMEOUT_MS", "750");
        env::set_var("MEMORY_NATIVE_SEARCH_ENABLED", "off");
        env::set_var("MEMORY_STATE_DIR", "/var/lib/agent-memory");
        env::remove_var("MEMORY_COMMIT_TIMEOUT_MS");

        let config = resolve(&MemorySettings::default(), Some("main"));

        assert_eq!(config.prefetch_timeout, Duration::from_millis(750));
        assert!(!config.native_search_enabled);
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/agent-memory"));
        assert_eq!(config.commit_timeout, MemoryConfig::default().commit_timeout);

        env::remove_var("MEMORY_PREFETCH_TIMEOUT_MS");
        env::remove_var("MEMORY_NATIVE_SEARCH_ENABLED");
        env::remove_var("MEMORY_STATE_DIR");
    }

    #[test]
    #[serial]
    fn test_settings_from_env_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, r#"{"prefetch_max_hits": 3}"#).unwrap();
        env::set_var(SETTINGS_FILE_ENV, &path);

        let settings = MemorySettings::from_env();
        env::remove_var(SETTINGS_FILE_ENV);

        assert_eq!(resolve_with(&settings, None, no_env).prefetch_max_hits, 3);
    }
}
