use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Order ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, matching how intents reference parents.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential ID generator for intents submitted without an ID.
///
/// IDs are `replay-1`, `replay-2`, ... in submission order, so identical inputs
/// always produce identical IDs. A number whose ID a caller already used is
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct OrderIdGen {
    next: u64,
    /// Lowercased caller-supplied IDs.
    claimed: HashSet<String>,
}

impl OrderIdGen {
    pub fn next_id(&mut self) -> OrderId {
        loop {
            self.next += 1;
            let id = format!("replay-{}", self.next);
            if !self.claimed.contains(&id) {
                return OrderId(id);
            }
        }
    }

    /// Use the caller's ID when present, otherwise generate one.
    pub fn resolve(&mut self, requested: Option<&str>) -> OrderId {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => {
                self.claimed.insert(id.to_ascii_lowercase());
                OrderId::new(id)
            }
            _ => self.next_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_sequential() {
        let mut ids = OrderIdGen::default();
        assert_eq!(ids.next_id().as_str(), "replay-1");
        assert_eq!(ids.next_id().as_str(), "replay-2");
    }

    #[test]
    fn resolve_keeps_caller_ids_and_skips_blank() {
        let mut ids = OrderIdGen::default();
        assert_eq!(ids.resolve(Some("  entry-7 ")).as_str(), "entry-7");
        assert_eq!(ids.resolve(Some("   ")).as_str(), "replay-1");
        assert_eq!(ids.resolve(None).as_str(), "replay-2");
    }

    #[test]
    fn generated_ids_skip_caller_claims() {
        let mut ids = OrderIdGen::default();
        assert_eq!(ids.resolve(Some("REPLAY-1")).as_str(), "REPLAY-1");
        assert_eq!(ids.resolve(Some("replay-2")).as_str(), "replay-2");
        assert_eq!(ids.resolve(None).as_str(), "replay-3");
        assert_eq!(ids.next_id().as_str(), "replay-4");
    }

    #[test]
    fn matches_ignores_case() {
        assert!(OrderId::new("Entry-1").matches("entry-1"));
        assert!(!OrderId::new("entry-1").matches("entry-2"));
    }
}
