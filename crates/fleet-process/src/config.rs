// SPDX-License-Identifier: MIT

//! Process configuration (§3 Process.configuration, §6).

use fleet_core::{ConfigError, ResourceCaps};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Well-known environment variable key the credential token is injected
/// under when `credential_token` is set (§6 Credential propagation).
pub const CREDENTIAL_ENV_KEY: &str = "FLEET_CREDENTIAL_TOKEN";

/// Well-known fallback environment variable key used when no credential
/// token is configured (§6: "exactly one of {token, api key} must validate
/// at call time").
pub const API_KEY_ENV_KEY: &str = "FLEET_API_KEY";

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub credential_token: Option<String>,
    pub caps: ResourceCaps,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            credential_token: None,
            caps: ResourceCaps::unbounded(Duration::from_secs(24 * 3600)),
        }
    }

    fleet_core::setters! {
        set {
            args: Vec<String>,
            env: HashMap<String, String>,
            caps: ResourceCaps,
        }
        option {
            working_dir: PathBuf,
            credential_token: String,
        }
    }

    /// Validate a non-empty command (§4.1 start precondition) and resource
    /// caps (§6).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Empty { field: "command" });
        }
        self.caps.validate()?;
        Ok(())
    }

    /// Build the environment map to apply to the spawned child, injecting
    /// the credential token under the well-known key, or falling back to
    /// whatever api-key env var the caller already set (§6).
    pub fn effective_env(&self) -> HashMap<String, String> {
        let mut env = self.env.clone();
        if let Some(token) = &self.credential_token {
            env.insert(CREDENTIAL_ENV_KEY.to_string(), token.clone());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_command() {
        let config = ProcessConfig::new("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_nonempty_command() {
        let config = ProcessConfig::new("true");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn credential_token_injected_under_well_known_key() {
        let config = ProcessConfig::new("true").credential_token("secret-abc");
        let env = config.effective_env();
        assert_eq!(env.get(CREDENTIAL_ENV_KEY).map(String::as_str), Some("secret-abc"));
    }

    #[test]
    fn no_token_means_no_injected_key() {
        let config = ProcessConfig::new("true");
        assert!(!config.effective_env().contains_key(CREDENTIAL_ENV_KEY));
    }
}
