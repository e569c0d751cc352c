//! Run and exec option sets.
//!
//! Options are kept as a loose key/value bag so that keys the session does not
//! know about still reach the engine call. Only the session keys (`detach`,
//! `tty`, `stdin_open`, `remove`) are consulted by the derived accessors; the
//! remaining run keys are forwarded to the container configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Option keys recognized on container runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOption {
    Detach,
    Tty,
    #[serde(rename = "stdin_open")]
    Interactive,
    Remove,
    User,
    WorkingDir,
    Hostname,
    Domainname,
    Privileged,
    NetworkMode,
    ReadOnly,
    Init,
}

impl RunOption {
    pub const ALL: [RunOption; 12] = [
        RunOption::Detach,
        RunOption::Tty,
        RunOption::Interactive,
        RunOption::Remove,
        RunOption::User,
        RunOption::WorkingDir,
        RunOption::Hostname,
        RunOption::Domainname,
        RunOption::Privileged,
        RunOption::NetworkMode,
        RunOption::ReadOnly,
        RunOption::Init,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Detach => "detach",
            Self::Tty => "tty",
            Self::Interactive => "stdin_open",
            Self::Remove => "remove",
            Self::User => "user",
            Self::WorkingDir => "working_dir",
            Self::Hostname => "hostname",
            Self::Domainname => "domainname",
            Self::Privileged => "privileged",
            Self::NetworkMode => "network_mode",
            Self::ReadOnly => "read_only",
            Self::Init => "init",
        }
    }
}

/// Option keys recognized on exec calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecOption {
    Detach,
    Tty,
    #[serde(rename = "stdin")]
    Interactive,
    Stream,
}

impl ExecOption {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Detach => "detach",
            Self::Tty => "tty",
            Self::Interactive => "stdin",
            Self::Stream => "stream",
        }
    }
}

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Strict truth: only `Bool(true)` counts.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text form for string-typed engine settings; integers are accepted (`user: 1000`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Key/value bag of run/exec flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet {
    values: BTreeMap<String, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Replace every key with the contents of `values`.
    pub fn set_all<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OptionValue>,
    {
        self.values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
    }

    /// Update the given keys, keeping the ones not mentioned.
    pub fn merge<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OptionValue>,
    {
        for (k, v) in values {
            self.values.insert(k.into(), v.into());
        }
    }

    /// Replace when `used_new_config` is set, merge otherwise.
    pub fn set_options(&mut self, used_new_config: bool, other: OptionSet) {
        if used_new_config {
            self.set_all(other.values);
        } else {
            self.merge(other.values);
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// True only when `key` is present and set to boolean `true`.
    pub fn is_true(&self, key: &str) -> bool {
        self.values.get(key).map(OptionValue::is_true).unwrap_or(false)
    }

    /// Boolean value of `option`, if set to a boolean.
    pub fn flag(&self, option: RunOption) -> Option<bool> {
        self.values.get(option.key()).and_then(OptionValue::as_bool)
    }

    /// Text value of `option`, if set to a string or integer.
    pub fn text(&self, option: RunOption) -> Option<String> {
        self.values.get(option.key()).and_then(OptionValue::as_text)
    }

    pub fn is_detach(&self) -> bool {
        self.is_true(RunOption::Detach.key())
    }

    pub fn is_remove(&self) -> bool {
        self.is_true(RunOption::Remove.key())
    }

    pub fn is_stream(&self) -> bool {
        self.is_true(ExecOption::Stream.key())
    }

    pub fn is_tty(&self) -> bool {
        self.is_true(RunOption::Tty.key())
    }

    pub fn is_interactive(&self) -> bool {
        self.is_true(RunOption::Interactive.key())
    }

    /// Keys that none of the recognized run options cover.
    pub fn unrecognized_run_keys(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|k| !RunOption::ALL.iter().any(|o| o.key() == *k))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for OptionSet
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        set.merge(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_require_strict_true() {
        let set = OptionSet::new()
            .with("detach", "true")
            .with("remove", 1)
            .with("stream", false);

        assert!(!set.is_detach());
        assert!(!set.is_remove());
        assert!(!set.is_stream());
        assert!(!OptionSet::new().is_detach());

        let set = OptionSet::new()
            .with("detach", true)
            .with("remove", true)
            .with("stream", true);
        assert!(set.is_detach());
        assert!(set.is_remove());
        assert!(set.is_stream());
    }

    #[test]
    fn test_merge_keeps_unmentioned_keys() {
        let mut set = OptionSet::new().with("detach", true).with("tty", true);
        set.merge([("tty", false)]);

        assert!(set.is_detach());
        assert_eq!(set.get("tty"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_set_all_discards_previous_keys() {
        let mut set = OptionSet::new().with("detach", true).with("remove", true);
        set.set_all([("tty", true)]);

        assert_eq!(set.len(), 1);
        assert!(!set.is_detach());
        assert!(!set.is_remove());
        assert!(set.is_tty());
    }

    #[test]
    fn test_set_options_selects_replace_or_merge() {
        let mut set = OptionSet::new().with("detach", true);
        set.set_options(false, OptionSet::new().with("remove", true));
        assert!(set.is_detach() && set.is_remove());

        set.set_options(true, OptionSet::new().with("remove", true));
        assert!(!set.is_detach() && set.is_remove());
    }

    #[test]
    fn test_unrecognized_keys_are_listed() {
        let set = OptionSet::new()
            .with("detach", true)
            .with("privileged", true)
            .with("mem_limit", "512m")
            .with("cap_add", "NET_ADMIN");

        assert_eq!(set.unrecognized_run_keys(), vec!["cap_add", "mem_limit"]);
    }

    #[test]
    fn test_typed_run_option_values() {
        let set = OptionSet::new()
            .with("user", 1000)
            .with("working_dir", "/src")
            .with("privileged", true)
            .with("init", "yes");

        assert_eq!(set.text(RunOption::User).as_deref(), Some("1000"));
        assert_eq!(set.text(RunOption::WorkingDir).as_deref(), Some("/src"));
        assert_eq!(set.flag(RunOption::Privileged), Some(true));
        assert_eq!(set.flag(RunOption::Init), None);
        assert_eq!(set.text(RunOption::Hostname), None);
    }

    #[test]
    fn test_deserialize_from_json_object() {
        let set: OptionSet =
            serde_json::from_str(r#"{"detach": true, "remove": "yes", "stdin_open": 1}"#).unwrap();

        assert!(set.is_detach());
        assert!(!set.is_remove());
        assert_eq!(set.get("stdin_open"), Some(&OptionValue::Int(1)));
    }
}
