// SPDX-License-Identifier: MIT

//! Task priority (§3 Task, §4.7 Worker Pool queues).

use serde::{Deserialize, Serialize};

/// Priority of a `Task`. `High` and `Critical` route to the priority queue
/// (§4.7); `Low`/`Normal` route to the standard queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Whether tasks of this priority are submitted to the priority queue.
    pub fn is_elevated(self) -> bool {
        self >= Priority::High
    }
}

crate::simple_display! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
}
