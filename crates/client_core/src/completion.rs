//! Last known "images completed" count, kept across responses that omit it.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

/// Zero means nothing observed yet; otherwise the stored count is `value - 1`.
#[derive(Debug, Default)]
pub struct CompletionCounter {
    slot: AtomicU64,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a count reported by the server. A value lower than one already
    /// observed is ignored so the progress indicator never moves backwards.
    pub fn observe(&self, value: u32) -> u32 {
        let encoded = u64::from(value) + 1;
        let previous = self.slot.fetch_max(encoded, Ordering::AcqRel);
        if previous > encoded {
            warn!(
                reported = value,
                kept = previous - 1,
                "completion count regressed; keeping last observed value"
            );
            return (previous - 1) as u32;
        }
        if previous != encoded {
            debug!(images_completed = value, "completion count updated");
        }
        value
    }

    pub fn read(&self) -> Option<u32> {
        match self.slot.load(Ordering::Acquire) {
            0 => None,
            encoded => Some((encoded - 1) as u32),
        }
    }

    /// Records a response's count when it carried one and returns the count to show.
    pub fn resolve(&self, reported: Option<u32>) -> Option<u32> {
        match reported {
            Some(v) => Some(self.observe(v)),
            None => self.read(),
        }
    }

    pub fn display_count(&self) -> u32 {
        self.read().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_reads_none() {
        let cache = CompletionCounter::new();
        assert_eq!(cache.read(), None);
        assert_eq!(cache.display_count(), 0);
    }

    #[test]
    fn zero_is_a_real_observation() {
        let cache = CompletionCounter::new();
        cache.observe(0);
        assert_eq!(cache.read(), Some(0));
    }

    #[test]
    fn omitted_values_keep_last_observed_count() {
        let cache = CompletionCounter::new();
        let reads = [Some(0), None, Some(1), None, None, Some(3), None];
        let mut shown = Vec::new();
        for reported in reads {
            shown.push(cache.resolve(reported));
        }
        assert_eq!(
            shown,
            vec![Some(0), Some(0), Some(1), Some(1), Some(1), Some(3), Some(3)]
        );
        assert!(shown.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn regressing_value_is_ignored() {
        let cache = CompletionCounter::new();
        assert_eq!(cache.observe(3), 3);
        assert_eq!(cache.observe(1), 3);
        assert_eq!(cache.read(), Some(3));
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let a = CompletionCounter::new();
        let b = CompletionCounter::new();
        a.observe(4);
        assert_eq!(b.read(), None);
    }
}
