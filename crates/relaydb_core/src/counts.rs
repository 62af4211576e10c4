//! Push-based count observers.
//!
//! The store publishes its aggregates after every committed mutation. Each
//! view is a [`tokio::sync::watch`] channel, so:
//!
//! - a new subscriber reads the current value immediately
//! - bursts of mutations may coalesce into one wake-up
//! - the latest value is never lost
//!
//! Receivers work with or without a runtime: `borrow()` is synchronous and
//! `changed().await` is available inside async code.
//!
//! ```rust
//! use relaydb_codec::Entry;
//! use relaydb_core::RecordStore;
//!
//! let store = RecordStore::open_in_memory().unwrap();
//! let unsent = store.observe_count_unsent();
//! assert_eq!(*unsent.borrow(), 0);
//! store.append(Entry::new().with("tap", 1)).unwrap();
//! assert_eq!(*unsent.borrow(), 1);
//! ```

use tokio::sync::watch;

/// Both store aggregates at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    /// Records present in any state.
    pub all: u64,
    /// Records still pending.
    pub unsent: u64,
}

/// Owner side of the count channels.
#[derive(Debug)]
pub(crate) struct CountObservers {
    all: watch::Sender<u64>,
    unsent: watch::Sender<u64>,
    both: watch::Sender<Counts>,
}

impl CountObservers {
    pub(crate) fn new(initial: Counts) -> Self {
        Self {
            all: watch::Sender::new(initial.all),
            unsent: watch::Sender::new(initial.unsent),
            both: watch::Sender::new(initial),
        }
    }

    /// Publishes new figures; only views whose value changed are notified.
    pub(crate) fn publish(&self, counts: Counts) {
        self.all.send_if_modified(|current| replace_if_changed(current, counts.all));
        self.unsent
            .send_if_modified(|current| replace_if_changed(current, counts.unsent));
        self.both.send_if_modified(|current| replace_if_changed(current, counts));
    }

    pub(crate) fn subscribe_all(&self) -> watch::Receiver<u64> {
        self.all.subscribe()
    }

    pub(crate) fn subscribe_unsent(&self) -> watch::Receiver<u64> {
        self.unsent.subscribe()
    }

    pub(crate) fn subscribe_both(&self) -> watch::Receiver<Counts> {
        self.both.subscribe()
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut T, next: T) -> bool {
    if *current == next {
        false
    } else {
        *current = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_subscriber_sees_current_value() {
        let observers = CountObservers::new(Counts { all: 3, unsent: 2 });
        observers.publish(Counts { all: 4, unsent: 3 });
        let all = observers.subscribe_all();
        let unsent = observers.subscribe_unsent();
        assert_eq!(*all.borrow(), 4);
        assert_eq!(*unsent.borrow(), 3);
        assert_eq!(*observers.subscribe_both().borrow(), Counts { all: 4, unsent: 3 });
    }

    #[test]
    fn unchanged_view_is_not_notified() {
        let observers = CountObservers::new(Counts::default());
        let mut all = observers.subscribe_all();
        let mut unsent = observers.subscribe_unsent();
        observers.publish(Counts { all: 0, unsent: 0 });
        assert!(!all.has_changed().unwrap());
        observers.publish(Counts { all: 1, unsent: 0 });
        assert!(all.has_changed().unwrap());
        assert!(!unsent.has_changed().unwrap());
        assert_eq!(*all.borrow_and_update(), 1);
        assert_eq!(*unsent.borrow_and_update(), 0);
    }

    #[test]
    fn burst_coalesces_to_last_value() {
        let observers = CountObservers::new(Counts::default());
        let mut unsent = observers.subscribe_unsent();
        for n in 1..=50 {
            observers.publish(Counts { all: n, unsent: n });
        }
        assert!(unsent.has_changed().unwrap());
        assert_eq!(*unsent.borrow_and_update(), 50);
        assert!(!unsent.has_changed().unwrap());
    }
}
