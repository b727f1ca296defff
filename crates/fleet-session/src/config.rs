// SPDX-License-Identifier: MIT

//! Session configuration (§3 Session.SessionConfig, §6 bounds).

use fleet_core::{ConfigError, ResourceCaps};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Tool a session may be permitted to invoke (§3 tool allow-list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    CodeInterpreter,
    FileSearch,
    Function,
}

fleet_core::simple_display! {
    Tool {
        CodeInterpreter => "code_interpreter",
        FileSearch => "file_search",
        Function => "function",
    }
}

pub const MIN_MAX_TURNS: u32 = 1;
pub const MAX_MAX_TURNS: u32 = 1000;
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;
pub const MIN_TOOL_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MIN_WALL_DURATION: Duration = Duration::from_secs(60);
pub const MAX_WALL_DURATION: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub working_dir: Option<PathBuf>,
    pub system_prompt: Option<String>,
    pub max_turns: u32,
    pub temperature: f64,
    pub tools: Vec<Tool>,
    pub tool_timeout: Duration,
    pub env: HashMap<String, String>,
    pub caps: ResourceCaps,
    pub max_wall_duration: Duration,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            working_dir: None,
            system_prompt: None,
            max_turns: 50,
            temperature: 1.0,
            tools: Vec::new(),
            tool_timeout: Duration::from_secs(30),
            env: HashMap::new(),
            caps: ResourceCaps::unbounded(MAX_WALL_DURATION),
            max_wall_duration: Duration::from_secs(3600),
        }
    }

    fleet_core::setters! {
        into {
            system_prompt: String,
        }
        set {
            max_turns: u32,
            temperature: f64,
            tools: Vec<Tool>,
            tool_timeout: Duration,
            env: HashMap<String, String>,
            caps: ResourceCaps,
            max_wall_duration: Duration,
        }
        option {
            working_dir: PathBuf,
        }
    }

    /// Validate every bound named in §3/§6. Equality over these fields is
    /// what the base pool uses to match sessions to a requested config
    /// (§4.4 `acquire`), so validation runs before any comparison.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_MAX_TURNS..=MAX_MAX_TURNS).contains(&self.max_turns) {
            return Err(ConfigError::out_of_range("max_turns", "1..=1000", self.max_turns));
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ConfigError::out_of_range("temperature", "0.0..=2.0", self.temperature));
        }
        if !(MIN_TOOL_TIMEOUT..=MAX_TOOL_TIMEOUT).contains(&self.tool_timeout) {
            return Err(ConfigError::out_of_range(
                "tool_timeout",
                "1s..=5m",
                self.tool_timeout.as_secs_f64(),
            ));
        }
        if !(MIN_WALL_DURATION..=MAX_WALL_DURATION).contains(&self.max_wall_duration) {
            return Err(ConfigError::out_of_range(
                "max_wall_duration",
                "1m..=24h",
                self.max_wall_duration.as_secs_f64(),
            ));
        }
        self.caps.validate()?;
        Ok(())
    }

    /// Equality used by the base pool to match an idle session against a
    /// requested config (§4.4: "equality over working dir, tool set,
    /// resource caps").
    pub fn matches_for_pooling(&self, other: &SessionConfig) -> bool {
        self.working_dir == other.working_dir
            && tool_set_eq(&self.tools, &other.tools)
            && self.caps == other.caps
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn tool_set_eq(a: &[Tool], b: &[Tool]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by_key(|t| tool_rank(*t));
    b.sort_by_key(|t| tool_rank(*t));
    a == b
}

fn tool_rank(tool: Tool) -> u32 {
    match tool {
        Tool::CodeInterpreter => 0,
        Tool::FileSearch => 1,
        Tool::Function => 2,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
