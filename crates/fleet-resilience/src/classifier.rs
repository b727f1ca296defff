// SPDX-License-Identifier: MIT

//! Error classifier (§4.9.1): learned overrides, then ordered pattern
//! rules, then a keyword-family heuristic, with a capped classification
//! cache and rolling per-kind/per-severity statistics.

use fleet_core::{ErrorKind, Severity};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, VecDeque};

const CACHE_CAPACITY: usize = 1000;
const STATS_CAPACITY: usize = 100;

/// The outcome of classifying an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClass {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub retryable: bool,
    pub circuit_break: bool,
}

impl ErrorClass {
    pub const fn new(kind: ErrorKind, severity: Severity, retryable: bool, circuit_break: bool) -> Self {
        Self { kind, severity, retryable, circuit_break }
    }
}

/// Where a classification came from, kept alongside rolling stats so a
/// caller can judge how much to trust a given class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedBy {
    Learned,
    Rule,
    Heuristic,
}

#[derive(Debug, Clone)]
struct Classification {
    kind: ErrorKind,
    severity: Severity,
    source: ClassifiedBy,
}

/// A substring or regex rule mapped to an [`ErrorClass`]; the highest
/// `weight` rule whose pattern matches wins (§4.9.1 step 2).
pub struct PatternRule {
    pattern: RulePattern,
    pub weight: i32,
    pub class: ErrorClass,
}

enum RulePattern {
    Substring(String),
    Regex(Regex),
}

impl PatternRule {
    pub fn substring(pattern: impl Into<String>, weight: i32, class: ErrorClass) -> Self {
        Self { pattern: RulePattern::Substring(pattern.into().to_lowercase()), weight, class }
    }

    pub fn regex(pattern: &str, weight: i32, class: ErrorClass) -> Result<Self, regex::Error> {
        Ok(Self { pattern: RulePattern::Regex(Regex::new(pattern)?), weight, class })
    }

    fn matches(&self, lowercased: &str) -> bool {
        match &self.pattern {
            RulePattern::Substring(s) => lowercased.contains(s.as_str()),
            RulePattern::Regex(re) => re.is_match(lowercased),
        }
    }
}

struct Stats {
    history: VecDeque<Classification>,
}

impl Stats {
    fn new() -> Self {
        Self { history: VecDeque::new() }
    }

    fn record(&mut self, classification: Classification) {
        if self.history.len() == STATS_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(classification);
    }

    fn count_by_kind(&self, kind: ErrorKind) -> usize {
        self.history.iter().filter(|c| c.kind == kind).count()
    }

    fn count_by_severity(&self, severity: Severity) -> usize {
        self.history.iter().filter(|c| c.severity == severity).count()
    }
}

/// Classifies opaque error messages into an [`ErrorClass`] (§4.9.1).
/// Thread-safe; a single instance is shared across the retry engine and
/// circuit breaker call sites.
pub struct ErrorClassifier {
    learned: Mutex<HashMap<String, ErrorClass>>,
    rules: Mutex<Vec<PatternRule>>,
    cache: Mutex<(HashMap<String, ErrorClass>, VecDeque<String>)>,
    stats: Mutex<Stats>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self {
            learned: Mutex::new(HashMap::new()),
            rules: Mutex::new(builtin_rules()),
            cache: Mutex::new((HashMap::new(), VecDeque::new())),
            stats: Mutex::new(Stats::new()),
        }
    }

    pub fn with_rule(self, rule: PatternRule) -> Self {
        self.rules.lock().push(rule);
        self
    }

    /// Register an exact-match override for a message (§4.9.1 step 1).
    /// Takes precedence over every rule and invalidates any cached
    /// classification for the same message.
    pub fn learn_from_error(&self, message: &str, class: ErrorClass) {
        self.learned.lock().insert(message.to_string(), class);
        let (map, order) = &mut *self.cache.lock();
        map.remove(message);
        order.retain(|k| k != message);
    }

    pub fn classify(&self, message: &str) -> ErrorClass {
        if let Some(class) = self.cache.lock().0.get(message).copied() {
            return class;
        }

        let (class, source) = if let Some(class) = self.learned.lock().get(message).copied() {
            (class, ClassifiedBy::Learned)
        } else if let Some(class) = self.match_rule(message) {
            (class, ClassifiedBy::Rule)
        } else {
            (heuristic_classify(message), ClassifiedBy::Heuristic)
        };

        self.cache_insert(message, class);
        self.stats.lock().record(Classification { kind: class.kind, severity: class.severity, source });
        class
    }

    fn match_rule(&self, message: &str) -> Option<ErrorClass> {
        let lowercased = message.to_lowercase();
        let rules = self.rules.lock();
        rules
            .iter()
            .filter(|rule| rule.matches(&lowercased))
            .max_by_key(|rule| rule.weight)
            .map(|rule| rule.class)
    }

    fn cache_insert(&self, message: &str, class: ErrorClass) {
        let (map, order) = &mut *self.cache.lock();
        if !map.contains_key(message) {
            if order.len() >= CACHE_CAPACITY {
                if let Some(evicted) = order.pop_front() {
                    map.remove(&evicted);
                }
            }
            order.push_back(message.to_string());
        }
        map.insert(message.to_string(), class);
    }

    pub fn count_by_kind(&self, kind: ErrorKind) -> usize {
        self.stats.lock().count_by_kind(kind)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.stats.lock().count_by_severity(severity)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::substring("connection refused", 100, ErrorClass::new(ErrorKind::Network, Severity::Medium, true, false)),
        PatternRule::substring("timeout", 100, ErrorClass::new(ErrorKind::Timeout, Severity::Medium, true, false)),
        PatternRule::substring("process exited", 100, ErrorClass::new(ErrorKind::Process, Severity::Medium, true, false)),
        PatternRule::substring("permission denied", 100, ErrorClass::new(ErrorKind::Auth, Severity::Fatal, false, false)),
        PatternRule::substring("invalid api key", 100, ErrorClass::new(ErrorKind::Auth, Severity::Fatal, false, false)),
        PatternRule::substring("rate limit", 90, ErrorClass::new(ErrorKind::Quota, Severity::Medium, true, false)),
        PatternRule::substring("service unavailable", 90, ErrorClass::new(ErrorKind::Network, Severity::Medium, true, false)),
        PatternRule::substring("out of memory", 90, ErrorClass::new(ErrorKind::Resource, Severity::Critical, true, true)),
        PatternRule::substring("resource limit", 90, ErrorClass::new(ErrorKind::Resource, Severity::Critical, true, true)),
    ]
}

/// Keyword-family fallback (§4.9.1 step 3) for messages no rule matched.
fn heuristic_classify(message: &str) -> ErrorClass {
    let lowercased = message.to_lowercase();
    if lowercased.contains("denied") || lowercased.contains("unauthorized") || lowercased.contains("forbidden") {
        ErrorClass::new(ErrorKind::Auth, Severity::Fatal, false, false)
    } else if lowercased.contains("refused") || lowercased.contains("reset") || lowercased.contains("network") || lowercased.contains("dns") {
        ErrorClass::new(ErrorKind::Network, Severity::Medium, true, false)
    } else if lowercased.contains("limit") || lowercased.contains("quota") || lowercased.contains("throttle") {
        ErrorClass::new(ErrorKind::Quota, Severity::Medium, true, false)
    } else if lowercased.contains("memory") || lowercased.contains("oom") || lowercased.contains("disk") {
        ErrorClass::new(ErrorKind::Resource, Severity::Critical, true, true)
    } else if lowercased.contains("timed out") || lowercased.contains("timeout") || lowercased.contains("deadline") {
        ErrorClass::new(ErrorKind::Timeout, Severity::Medium, true, false)
    } else if lowercased.contains("invalid") || lowercased.contains("malformed") || lowercased.contains("parse") {
        ErrorClass::new(ErrorKind::Validation, Severity::Low, false, false)
    } else {
        ErrorClass::new(ErrorKind::Unknown, Severity::Medium, true, false)
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
