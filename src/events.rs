//! Bounded event stream observed by the control surface.
//!
//! Only the control context writes here; the capture thread reports through
//! `log` and `stats` instead.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Local;

/// Keeps the most recent `capacity` messages.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `message`, evicting the oldest entry when full.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        let stamped = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);

        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(stamped);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.contains(needle))
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_entries() {
        let log = EventLog::new(3);
        for i in 0..5 {
            log.push(format!("event {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].ends_with("event 2"));
        assert!(entries[2].ends_with("event 4"));
        assert!(!log.contains("event 1"));
    }

    #[test]
    fn entries_carry_a_local_wall_clock_stamp() {
        let log = EventLog::new(4);
        log.push("started");
        let entry = &log.entries()[0];
        let (stamp, message) = entry.split_once("] ").unwrap();
        assert_eq!(message, "started");

        let stamp = stamp.strip_prefix('[').unwrap();
        assert!(chrono::NaiveTime::parse_from_str(stamp, "%H:%M:%S").is_ok(), "bad stamp {stamp}");
    }

    #[test]
    fn zero_capacity_still_keeps_the_last_event() {
        let log = EventLog::new(0);
        log.push("a");
        log.push("b");
        assert_eq!(log.capacity(), 1);
        assert!(log.contains("b"));
        assert!(!log.contains("a"));
    }
}
