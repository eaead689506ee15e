use std::collections::HashSet;

use crate::models::SegmentKey;

/// Segments already credited during the current continuous listen.
///
/// Cleared on every explicit seek so a replay earns credit again.
#[derive(Debug, Clone, Default)]
pub struct PassSet {
    credited: HashSet<SegmentKey>,
}

impl PassSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `key` is seen in this pass.
    pub fn record_if_new(&mut self, key: SegmentKey) -> bool {
        self.credited.insert(key)
    }

    pub fn contains(&self, key: SegmentKey) -> bool {
        self.credited.contains(&key)
    }

    pub fn clear(&mut self) {
        self.credited.clear();
    }

    pub fn len(&self) -> usize {
        self.credited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credited.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_once_until_cleared() {
        let mut pass = PassSet::new();
        let key = SegmentKey::new(0, 2);

        assert!(pass.record_if_new(key));
        assert!(!pass.record_if_new(key));
        assert!(!pass.record_if_new(key));
        assert!(pass.contains(key));

        pass.clear();
        assert!(pass.is_empty());
        assert!(pass.record_if_new(key));
        assert_eq!(pass.len(), 1);
    }
}
