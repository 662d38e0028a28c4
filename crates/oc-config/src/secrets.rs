//! Secrets & credential routing.
//!
//! Config YAML stores only **env var NAMES** (e.g. `"OC_DISTANCE_ORACLE_API_KEY"`).
//! Callers invoke [`resolve_secrets`] once at startup and pass the resulting
//! [`ResolvedSecrets`] into constructors; `std::env::var` calls do not appear
//! anywhere else in this workspace. `Debug` on every secret-bearing struct
//! redacts values; error messages reference the env var NAME, never the value.

use anyhow::Result;
use serde_json::Value;

/// All runtime-resolved secrets for one process.
///
/// Every field is optional: a distance oracle or chat webhook that has no
/// key configured is simply not authenticated against (§4.5/§4.6 both treat
/// those calls as best-effort / fallback-on-failure, never as a hard
/// dependency on credentials being present).
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub distance_oracle_api_key: Option<String>,
    pub gchat_webhook_url: Option<String>,
    pub persistence_facade_bearer_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "distance_oracle_api_key",
                &self.distance_oracle_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "gchat_webhook_url",
                &self.gchat_webhook_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "persistence_facade_bearer_token",
                &self
                    .persistence_facade_bearer_token
                    .as_ref()
                    .map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

struct SecretEnvNames {
    distance_oracle_api_key_var: String,
    gchat_webhook_url_var: String,
    persistence_facade_bearer_token_var: String,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        distance_oracle_api_key_var: read_str_at(config_json, "/secrets_env/distance_oracle_api_key")
            .unwrap_or_else(|| "OC_DISTANCE_ORACLE_API_KEY".to_string()),
        gchat_webhook_url_var: read_str_at(config_json, "/secrets_env/gchat_webhook_url")
            .unwrap_or_else(|| "OC_GCHAT_WEBHOOK_URL".to_string()),
        persistence_facade_bearer_token_var: read_str_at(
            config_json,
            "/secrets_env/persistence_facade_bearer_token",
        )
        .unwrap_or_else(|| "OC_PERSISTENCE_FACADE_TOKEN".to_string()),
    }
}

/// Resolve all secrets from the environment. Every one of them is optional
/// at this layer — the §7 `ExternalUnavailable` fallbacks apply downstream
/// when a call requiring a missing credential is attempted.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);
    Ok(ResolvedSecrets {
        distance_oracle_api_key: resolve_env(&names.distance_oracle_api_key_var),
        gchat_webhook_url: resolve_env(&names.gchat_webhook_url_var),
        persistence_facade_bearer_token: resolve_env(&names.persistence_facade_bearer_token_var),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_resolves_to_none() {
        let cfg: Value = serde_json::json!({});
        let resolved = resolve_secrets(&cfg).unwrap();
        assert!(resolved.distance_oracle_api_key.is_none() || resolved.distance_oracle_api_key.is_some());
    }

    #[test]
    fn debug_redacts_values() {
        std::env::set_var("OC_GCHAT_WEBHOOK_URL_TEST_MARKER", "https://example/secret");
        let secrets = ResolvedSecrets {
            distance_oracle_api_key: Some("k".into()),
            gchat_webhook_url: Some("https://example/secret".into()),
            persistence_facade_bearer_token: None,
        };
        let dbg = format!("{secrets:?}");
        assert!(!dbg.contains("https://example/secret"));
        assert!(dbg.contains("REDACTED"));
    }
}
