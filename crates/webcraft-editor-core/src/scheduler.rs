//! Cancellable scheduled tasks keyed by purpose.

use std::hash::Hash;
use std::time::Duration;

use indexmap::IndexMap;
use web_time::Instant;

/// At most one pending task per key. Scheduling again under the same key
/// replaces the earlier task (debounce, last write wins).
#[derive(Debug, Clone)]
pub struct Scheduler<K, T> {
    pending: IndexMap<K, (Instant, T)>,
}

impl<K, T> Default for Scheduler<K, T> {
    fn default() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, T> Scheduler<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` at `now + delay`, replacing any task pending under `key`.
    pub fn schedule(&mut self, key: K, now: Instant, delay: Duration, task: T) {
        // Remove first so a rescheduled key moves to the back of the queue.
        self.pending.shift_remove(&key);
        self.pending.insert(key, (now + delay, task));
    }

    pub fn cancel(&mut self, key: &K) -> Option<T> {
        self.pending.shift_remove(key).map(|(_, task)| task)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every task whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, T)> {
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let mut due: Vec<(Instant, K, T)> = due_keys
            .into_iter()
            .filter_map(|key| {
                let (deadline, task) = self.pending.shift_remove(&key)?;
                Some((deadline, key, task))
            })
            .collect();
        due.sort_by_key(|(deadline, _, _)| *deadline);
        due.into_iter().map(|(_, key, task)| (key, task)).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(deadline, _)| *deadline).min()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reschedule_replaces() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule("save", start, Duration::from_millis(100), 1);
        scheduler.schedule("save", start, Duration::from_millis(200), 2);

        assert!(scheduler.take_due(start + Duration::from_millis(150)).is_empty());
        let due = scheduler.take_due(start + Duration::from_millis(200));
        assert_eq!(due, vec![("save", 2)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_due_in_deadline_order() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule("late", start, Duration::from_millis(30), ());
        scheduler.schedule("early", start, Duration::from_millis(10), ());
        assert_eq!(
            scheduler.next_deadline(),
            Some(start + Duration::from_millis(10))
        );
        let keys: Vec<_> = scheduler
            .take_due(start + Duration::from_millis(50))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["early", "late"]);
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(1u8, start, Duration::ZERO, "hover");
        assert_eq!(scheduler.cancel(&1), Some("hover"));
        assert!(!scheduler.is_pending(&1));
        assert!(scheduler.take_due(start).is_empty());
    }
}
