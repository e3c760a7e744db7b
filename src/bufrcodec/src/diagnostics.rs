//! The unstructured, caller-visible diagnostic channel required by the
//! public `get_log()` / `clear_log()` operations. This sits alongside the
//! `log` crate facade used at individual parse/decode call sites: `log`
//! macros go wherever a subscriber is installed (or nowhere, if none is),
//! while this buffer is always there for a caller who just wants the lines.

use std::sync::Mutex;

static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());

pub fn push(line: impl Into<String>) {
    let line = line.into();
    log::warn!("{line}");
    LOG.lock().unwrap().push(line);
}

pub fn get_log() -> Vec<String> {
    LOG.lock().unwrap().clone()
}

pub fn clear_log() {
    LOG.lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_clear_round_trip() {
        clear_log();
        push("a");
        push("b");
        assert_eq!(get_log(), vec!["a".to_string(), "b".to_string()]);
        clear_log();
        assert!(get_log().is_empty());
    }
}
