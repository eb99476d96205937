//! Optimistic display synchronization
//!
//! A polling reader refreshes every field from the device while the operator
//! may be typing into the same fields. Two TTL maps decide whether a polled
//! value may replace what is on screen:
//!
//! - a **lock** is taken when a value is submitted and lasts
//!   [`LOCK_WINDOW`](crate::constants::guard::LOCK_WINDOW), covering the round
//!   trip of the set request and any restart it triggers
//! - an **edit** is refreshed on every keystroke and lasts
//!   [`EDIT_WINDOW`](crate::constants::guard::EDIT_WINDOW); submitting drops it
//!
//! The protocol is time-boxed, not linearizable: a set that takes longer than
//! the lock window can briefly show the stale device value until the next poll.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use mc_protocol::SettingKey;

use crate::constants::guard::{EDIT_WINDOW, LOCK_WINDOW};

#[derive(Debug, Clone)]
pub struct ConcurrencyGuard<K = SettingKey> {
    locks: HashMap<K, Instant>,
    edits: HashMap<K, Instant>,
    lock_window: Duration,
    edit_window: Duration,
}

impl<K: Eq + Hash + Copy> ConcurrencyGuard<K> {
    pub fn new() -> Self {
        Self::with_windows(LOCK_WINDOW, EDIT_WINDOW)
    }

    pub fn with_windows(lock_window: Duration, edit_window: Duration) -> Self {
        Self {
            locks: HashMap::new(),
            edits: HashMap::new(),
            lock_window,
            edit_window,
        }
    }

    /// Operator touched the field: (re)start its edit window
    pub fn mark_edit(&mut self, key: K, now: Instant) {
        self.edits.insert(key, now + self.edit_window);
    }

    /// A value was submitted: lock the field and forget the edit
    pub fn submit(&mut self, key: K, now: Instant) {
        self.locks.insert(key, now + self.lock_window);
        self.edits.remove(&key);
    }

    pub fn is_locked(&self, key: K, now: Instant) -> bool {
        self.locks.get(&key).is_some_and(|expiry| now < *expiry)
    }

    /// Field has an unexpired edit (rendered as dirty)
    pub fn is_editing(&self, key: K, now: Instant) -> bool {
        self.edits.get(&key).is_some_and(|expiry| now < *expiry)
    }

    /// Whether a freshly polled value for `key` may replace the displayed one.
    /// Expired entries for the key are dropped when the answer is yes.
    pub fn should_adopt(&mut self, key: K, now: Instant) -> bool {
        if self.is_locked(key, now) || self.is_editing(key, now) {
            return false;
        }
        self.locks.remove(&key);
        self.edits.remove(&key);
        true
    }

    /// Apply a polled value to `displayed` unless the field is protected.
    /// Returns true when the displayed value was replaced.
    pub fn reconcile<T>(&mut self, key: K, displayed: &mut T, polled: T, now: Instant) -> bool {
        if self.should_adopt(key, now) {
            *displayed = polled;
            true
        } else {
            false
        }
    }

    /// Drop every expired entry
    pub fn prune(&mut self, now: Instant) {
        self.locks.retain(|_, expiry| now < *expiry);
        self.edits.retain(|_, expiry| now < *expiry);
    }
}

impl<K: Eq + Hash + Copy> Default for ConcurrencyGuard<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize operator input before it is submitted: trim, accept a decimal
/// comma, and drop empty input entirely.
pub fn normalize_input(raw: &str) -> Option<String> {
    let value = raw.trim().replacen(',', ".", 1);
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_lock_protects_submitted_value() {
        let mut guard = ConcurrencyGuard::new();
        let t = Instant::now();
        let mut gain = 5.0_f32;

        guard.submit(SettingKey::Gain, t);

        // Stale poll during the lock window keeps the submitted value
        assert!(!guard.reconcile(SettingKey::Gain, &mut gain, 4.2, t + ms(3000)));
        assert_eq!(gain, 5.0);

        // After the window with no edit, the device value wins
        assert!(guard.reconcile(SettingKey::Gain, &mut gain, 4.2, t + ms(6000)));
        assert_eq!(gain, 4.2);
    }

    #[test]
    fn test_edit_window_refreshes_on_each_keystroke() {
        let mut guard = ConcurrencyGuard::new();
        let t = Instant::now();

        guard.mark_edit(SettingKey::Rate, t);
        guard.mark_edit(SettingKey::Rate, t + ms(8000));

        assert!(!guard.should_adopt(SettingKey::Rate, t + ms(12000)));
        assert!(guard.is_editing(SettingKey::Rate, t + ms(17999)));
        assert!(guard.should_adopt(SettingKey::Rate, t + ms(18000)));
        assert!(!guard.is_editing(SettingKey::Rate, t + ms(18000)));
    }

    #[test]
    fn test_submit_clears_edit() {
        let mut guard = ConcurrencyGuard::new();
        let t = Instant::now();

        guard.mark_edit(SettingKey::Buffer, t);
        guard.submit(SettingKey::Buffer, t + ms(1000));

        assert!(!guard.is_editing(SettingKey::Buffer, t + ms(1000)));
        // Only the 5 s lock remains, not the 10 s edit
        assert!(!guard.should_adopt(SettingKey::Buffer, t + ms(5999)));
        assert!(guard.should_adopt(SettingKey::Buffer, t + ms(6000)));
    }

    #[test]
    fn test_edit_outlives_lock() {
        let mut guard = ConcurrencyGuard::new();
        let t = Instant::now();

        guard.submit(SettingKey::Gain, t);
        guard.mark_edit(SettingKey::Gain, t + ms(1000));

        assert!(!guard.should_adopt(SettingKey::Gain, t + ms(7000)));
        assert!(guard.should_adopt(SettingKey::Gain, t + ms(11000)));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut guard = ConcurrencyGuard::new();
        let t = Instant::now();

        guard.submit(SettingKey::Gain, t);
        assert!(guard.should_adopt(SettingKey::Rate, t + ms(100)));
        assert!(!guard.should_adopt(SettingKey::Gain, t + ms(100)));
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let mut guard: ConcurrencyGuard = ConcurrencyGuard::with_windows(ms(10), ms(20));
        let t = Instant::now();
        guard.submit(SettingKey::Gain, t);
        guard.mark_edit(SettingKey::Rate, t);

        guard.prune(t + ms(15));
        assert!(!guard.is_locked(SettingKey::Gain, t + ms(15)));
        assert!(guard.is_editing(SettingKey::Rate, t + ms(15)));
    }

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("  5,5 "), Some("5.5".to_string()));
        assert_eq!(normalize_input("1,2,3"), Some("1.2,3".to_string()));
        assert_eq!(normalize_input("on"), Some("on".to_string()));
        assert_eq!(normalize_input("   "), None);
        assert_eq!(normalize_input(""), None);
    }
}
