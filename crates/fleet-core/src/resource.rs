// SPDX-License-Identifier: MIT

//! Resource caps shared by `Process` and `Session` configs (§3, SPEC_FULL §3).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource caps: max memory, max CPU fraction, max wall duration.
///
/// Enforced at process spawn/health-check time by the supervisor; advisory
/// to the pool/autoscaler for the owning session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceCaps {
    pub max_memory_bytes: Option<u64>,
    pub max_cpu_fraction: Option<f64>,
    #[serde(with = "duration_ms")]
    pub max_wall_duration: Duration,
}

impl ResourceCaps {
    pub fn unbounded(max_wall_duration: Duration) -> Self {
        Self { max_memory_bytes: None, max_cpu_fraction: None, max_wall_duration }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(frac) = self.max_cpu_fraction {
            if !(0.0..=1.0).contains(&frac) {
                return Err(ConfigError::out_of_range("max_cpu_fraction", "0..=1", frac));
            }
        }
        if self.max_wall_duration.is_zero() {
            return Err(ConfigError::invalid("max_wall_duration", "must be positive"));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
