// SPDX-License-Identifier: MIT

//! Newline-framed JSON parser with multiline object support (§4.8.2).

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_MAX_LINE_SIZE: usize = 1024 * 1024;

struct Inner {
    partial: String,
    depth: i64,
}

/// Parses newline-framed JSON objects, tolerating objects/arrays that span
/// multiple lines by tracking brace/bracket depth across `parse_next`
/// calls. Never poisoned: any parse failure resets to a clean slate.
pub struct JsonStreamParser {
    inner: Mutex<Inner>,
    max_line_size: usize,
    error_count: AtomicU64,
}

impl JsonStreamParser {
    pub fn new() -> Self {
        Self::with_max_line_size(DEFAULT_MAX_LINE_SIZE)
    }

    pub fn with_max_line_size(max_line_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { partial: String::new(), depth: 0 }),
            max_line_size,
            error_count: AtomicU64::new(0),
        }
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Pull mode: feed one line, get back a completed value once the
    /// accumulated brace/bracket depth returns to zero.
    pub fn parse_next(&self, line: &str) -> Option<Value> {
        if line.len() > self.max_line_size {
            self.recover();
            self.error_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut inner = self.inner.lock();
        let trimmed = line.trim();
        if inner.partial.is_empty() {
            if trimmed.is_empty() {
                return None;
            }
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return None;
            }
        }

        inner.depth += depth_delta(line);
        inner.partial.push_str(line);
        inner.partial.push('\n');

        if inner.depth > 0 {
            return None;
        }

        let candidate = std::mem::take(&mut inner.partial);
        inner.depth = 0;
        drop(inner);

        match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Discard any partial state. Always safe to call; the parser has no
    /// poisoned state to recover from, this just gives callers an explicit
    /// reset point (§4.8.2 "always recoverable").
    pub fn recover(&self) {
        let mut inner = self.inner.lock();
        inner.partial.clear();
        inner.depth = 0;
    }

    /// Push mode: spawn a task that parses each incoming line and forwards
    /// completed values, for callers that want a lazy async sequence
    /// instead of driving `parse_next` themselves (§4.8.2).
    pub fn spawn_push(self: Arc<Self>, mut lines: mpsc::Receiver<String>) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                if let Some(value) = self.parse_next(&line) {
                    if tx.send(value).await.is_err() {
                        break;
                    }
                }
            }
        });
        rx
    }
}

impl Default for JsonStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Net change in brace/bracket depth contributed by one line, ignoring
/// braces/brackets inside string literals.
fn depth_delta(line: &str) -> i64 {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escape = false;
    for ch in line.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
