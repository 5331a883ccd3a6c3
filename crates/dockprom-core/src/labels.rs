//! Metric label helpers.
//!
//! Every published series carries the target's display name plus one label per
//! configured exposed label. Exposed label names come from arbitrary workload
//! labels (`com.example.team`), so they are sanitized into legal exposition
//! label keys and prefixed with `label_`.

use std::collections::HashSet;

use crate::error::{DockpromError, Result};
use crate::stats::Target;

/// Base label key carrying the target's display name.
pub const NAME_LABEL: &str = "name";

const EXPOSED_PREFIX: &str = "label_";

/// Split a comma-separated label list, trimming entries and dropping empties.
pub fn parse_label_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replace every character that is illegal in a label key with `_`.
pub fn sanitize_label_key(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Replace every character that is illegal in a metric name with `_`.
pub fn sanitize_metric_name(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Whether `s` is usable as a metric name (or prefix) without sanitizing.
pub fn is_valid_metric_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Fixed mapping from exposed workload labels to exposition label keys.
///
/// Built once from configuration; shared by the registry (key set) and every
/// worker (values).
#[derive(Debug, Clone)]
pub struct LabelSchema {
    /// (workload label, exposition key)
    exposed: Vec<(String, String)>,
}

impl LabelSchema {
    /// Fails when two exposed labels sanitize to the same key.
    pub fn new(exposed: &[String]) -> Result<Self> {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(NAME_LABEL.to_string());

        let mut out = Vec::with_capacity(exposed.len());
        for label in exposed {
            let key = format!("{EXPOSED_PREFIX}{}", sanitize_label_key(label));
            if !seen.insert(key.clone()) {
                return Err(DockpromError::Config(format!(
                    "exposed label {label:?} collides with another label as {key:?}"
                )));
            }
            out.push((label.clone(), key));
        }
        Ok(Self { exposed: out })
    }

    /// Base label keys in publication order: `name`, then exposed labels.
    pub fn keys(&self) -> Vec<String> {
        std::iter::once(NAME_LABEL.to_string())
            .chain(self.exposed.iter().map(|(_, k)| k.clone()))
            .collect()
    }

    /// Compute a target's label set. Missing labels map to an empty string.
    pub fn label_set(&self, target: &Target) -> LabelSet {
        let mut pairs = Vec::with_capacity(self.exposed.len() + 1);
        pairs.push((NAME_LABEL.to_string(), target.name.clone()));
        for (label, key) in &self.exposed {
            let value = target.labels.get(label).cloned().unwrap_or_default();
            pairs.push((key.clone(), value));
        }
        LabelSet { pairs }
    }
}

/// Base label values of one target, fixed for a worker's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Borrowed (key, value) view of the base labels followed by `extra`.
    pub fn with_extra<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        self.pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }
}
