use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::AppSettings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "access_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Environment variables that override provider keys, mirroring the
/// `.env` convention the hosted providers document.
const ENV_KEY_OVERRIDES: [(&str, &[&str]); 3] = [
    ("OPENAI_API_KEY", &["providers", "openai", "api_key"]),
    ("GROQ_API_KEY", &["providers", "llama", "api_key"]),
    ("EMBEDDING_API_KEY", &["embedding", "api_key"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("SOMMELIER_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config with `secrets.yaml` merged on top, then env overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<AppSettings, ApiError> {
        let config = self.load_config()?;
        validate_config(&config)?;
        tracing::debug!(
            config = %redact_sensitive_values(&config),
            "Loaded configuration from {}",
            self.config_path().display()
        );
        AppSettings::from_value(config)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ApiError::Internal(format!("Failed to read {}: {}", path.display(), e))
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        ApiError::BadRequest(format!("Invalid YAML in {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::BadRequest(format!(
            "Invalid config in {}: expected a mapping at the top level",
            path.display()
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_KEY_OVERRIDES {
        let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        ensure_object_path(config, path, Value::String(value));
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

pub fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths::from_dirs(
            dir.to_path_buf(),
            dir.to_path_buf(),
        )))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn redaction_hides_keys_but_keeps_token_limits() {
        let config = json!({
            "providers": {
                "openai": { "api_key": "sk-live", "max_tokens": 800 }
            }
        });
        let redacted = redact_sensitive_values(&config);
        assert_eq!(redacted["providers"]["openai"]["api_key"], "****");
        assert_eq!(redacted["providers"]["openai"]["max_tokens"], 800);
    }

    #[test]
    fn env_overrides_create_missing_sections() {
        let mut config = json!({ "providers": { "openai": { "model": "gpt-4.1" } } });
        apply_env_overrides(&mut config, |name| match name {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "GROQ_API_KEY" => Some("gsk-env".to_string()),
            _ => None,
        });

        assert_eq!(config["providers"]["openai"]["api_key"], "sk-env");
        assert_eq!(config["providers"]["openai"]["model"], "gpt-4.1");
        assert_eq!(config["providers"]["llama"]["api_key"], "gsk-env");
        assert!(config.get("embedding").is_none());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = json!({ "providers": { "openai": { "api_key": "from-file" } } });
        apply_env_overrides(&mut config, |_| Some("  ".to_string()));
        assert_eq!(config["providers"]["openai"]["api_key"], "from-file");
    }

    #[test]
    fn secrets_file_overrides_public_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "retrieval:\n  top_k: 5\nproviders:\n  openai:\n    model: gpt-4.1\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "providers:\n  openai:\n    api_key: sk-file\n",
        )
        .unwrap();

        let merged = service_in(dir.path()).load_config().unwrap();
        assert_eq!(merged["retrieval"]["top_k"], 5);
        assert_eq!(merged["providers"]["openai"]["model"], "gpt-4.1");
        assert!(merged["providers"]["openai"]["api_key"].is_string());
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "retrieval: [unclosed\n").unwrap();

        let err = load_yaml_file(&dir.path().join("config.yml")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_files_load_as_empty_objects() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_yaml_file(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(value, json!({}));
    }
}
