//! Thread-local capture of executed operations.
//!
//! Every execution call on a builder emits one JSON line through [`op_event!`](crate::op_event).
//! Tests enable the sink for their own thread and assert on what ran, without
//! installing a global logger.

use std::cell::RefCell;

/// `log` target operation events are routed to.
pub const OPS_TARGET: &str = "mongo_fluent::ops";

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the sink for this thread when dropped.
pub struct OpSinkGuard;

impl Drop for OpSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

pub fn enable_thread_sink() -> OpSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    OpSinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Takes everything captured so far. Empty when the sink is off.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Captured events parsed back into JSON values; lines that fail to parse are skipped.
pub fn events() -> Vec<serde_json::Value> {
    snapshot().iter().filter_map(|l| serde_json::from_str(l).ok()).collect()
}

/// Records `{"op", "collection", "ok"}` for one execution call.
#[macro_export]
macro_rules! op_event {
    ($op:expr, $collection:expr, $ok:expr) => {{
        let __line = serde_json::json!({
            "op": $op,
            "collection": $collection,
            "ok": $ok,
        })
        .to_string();
        $crate::utils::devlog::write_str(&__line);
        log::trace!(target: $crate::utils::devlog::OPS_TARGET, "{}", __line);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_captures_only_while_enabled() {
        crate::op_event!("get", "before", true);
        let g = enable_thread_sink();
        crate::op_event!("count", "users", false);
        let ev = events();
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0]["op"], "count");
        assert_eq!(ev[0]["collection"], "users");
        assert_eq!(ev[0]["ok"], false);
        assert_eq!(drain().len(), 1);
        assert!(snapshot().is_empty());
        drop(g);
        crate::op_event!("get", "after", true);
        assert!(drain().is_empty());
    }
}
