//! Warn-once logging for absorbed configuration errors
//!
//! A bad AI definition or a missing stat must not spam the log every tick,
//! so each distinct key is reported a single time per process.

use std::sync::OnceLock;

use hashbrown::HashSet;
use parking_lot::Mutex;

fn warned_keys() -> &'static Mutex<HashSet<String>> {
    static WARNED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    WARNED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Returns true the first time `key` is seen, false afterwards
pub fn first_occurrence(key: &str) -> bool {
    let mut warned = warned_keys().lock();
    if warned.contains(key) {
        return false;
    }
    warned.insert(key.to_string());
    true
}

/// Emit a `tracing::warn!` for `key` only once
pub fn warn_once(key: &str, message: &str) {
    if first_occurrence(key) {
        tracing::warn!(key, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_only_once() {
        let key = "log_once::test::unique-key";
        assert!(first_occurrence(key));
        assert!(!first_occurrence(key));
        assert!(!first_occurrence(key));
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        assert!(first_occurrence("log_once::test::a"));
        assert!(first_occurrence("log_once::test::b"));
    }
}
