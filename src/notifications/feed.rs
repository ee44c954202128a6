//! In-memory notification list and unread counter.

use std::collections::HashMap;

use crate::models::Notification;

/// Handle for one optimistic read flip, used to confirm or undo it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMark {
    pub seq: u64,
    pub flipped: usize,
}

/// Outstanding server writes for one notification id.
#[derive(Debug, Clone, Copy)]
struct PendingRead {
    /// Sequence of the newest write issued for the id.
    latest: u64,
    /// Local flips not yet confirmed by any successful write.
    unconfirmed: usize,
}

/// Ordered notifications (newest arrival first) with a running unread count.
///
/// `unread` always equals the number of entries with `is_read == false`.
/// `epoch` advances on every session change; pushes tagged with an older
/// epoch come from a torn-down channel and are dropped.
///
/// Read writes for the same id are last-write-wins: a failed write is only
/// undone when no newer write for that id has been issued since.
#[derive(Debug, Default, Clone)]
pub struct NotificationFeed {
    items: Vec<Notification>,
    unread: usize,
    epoch: u64,
    pending: HashMap<String, PendingRead>,
    next_seq: u64,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop everything and start a new epoch.
    pub fn reset(&mut self) -> u64 {
        self.items.clear();
        self.unread = 0;
        self.pending.clear();
        self.epoch += 1;
        self.epoch
    }

    /// Replace the list with a freshly fetched backlog.
    pub fn replace_backlog(&mut self, epoch: u64, backlog: Vec<Notification>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.unread = backlog.iter().filter(|n| !n.is_read).count();
        self.items = backlog;
        true
    }

    /// Prepend a pushed notification.
    pub fn push(&mut self, epoch: u64, notification: Notification) -> bool {
        if epoch != self.epoch {
            return false;
        }
        if !notification.is_read {
            self.unread += 1;
        }
        self.items.insert(0, notification);
        true
    }

    /// Flip every unread entry with `id` to read and open a write for it.
    pub fn mark_read(&mut self, id: &str) -> ReadMark {
        let mut flipped = 0;
        for n in self.items.iter_mut().filter(|n| n.id == id && !n.is_read) {
            n.is_read = true;
            flipped += 1;
        }
        self.unread = self.unread.saturating_sub(flipped);

        self.next_seq += 1;
        let seq = self.next_seq;
        let pending = self.pending.entry(id.to_string()).or_insert(PendingRead {
            latest: seq,
            unconfirmed: 0,
        });
        pending.latest = seq;
        pending.unconfirmed += flipped;
        ReadMark { seq, flipped }
    }

    /// The write `seq` for `id` succeeded; its flips are now durable.
    pub fn confirm_read(&mut self, epoch: u64, id: &str, seq: u64) {
        if epoch != self.epoch {
            return;
        }
        if let Some(pending) = self.pending.get_mut(id) {
            pending.unconfirmed = 0;
            if pending.latest == seq {
                self.pending.remove(id);
            }
        }
    }

    /// The write `seq` for `id` failed. Restores the unconfirmed flips unless
    /// a newer write for the same id is still outstanding or has succeeded.
    /// Returns how many entries were restored.
    pub fn revert_read(&mut self, epoch: u64, id: &str, seq: u64) -> usize {
        if epoch != self.epoch {
            return 0;
        }
        let count = match self.pending.get(id) {
            Some(pending) if pending.latest == seq => pending.unconfirmed,
            _ => return 0,
        };
        self.pending.remove(id);

        let mut restored = 0;
        for n in self
            .items
            .iter_mut()
            .filter(|n| n.id == id && n.is_read)
            .take(count)
        {
            n.is_read = false;
            restored += 1;
        }
        self.unread += restored;
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(id: &str, is_read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: "join_request".to_string(),
            title: format!("Title {}", id),
            message: "message".to_string(),
            data: None,
            is_read,
            created_at: Utc::now(),
        }
    }

    fn recount(feed: &NotificationFeed) -> usize {
        feed.items().iter().filter(|n| !n.is_read).count()
    }

    #[test]
    fn test_backlog_sets_unread_count() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.replace_backlog(epoch, vec![note("a", false), note("b", true), note("c", false)]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_push_prepends_and_counts_unread_only() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));
        feed.push(epoch, note("b", true));
        feed.push(epoch, note("c", false));

        let ids: Vec<&str> = feed.items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_mark_read_never_goes_negative() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));

        assert_eq!(feed.mark_read("a").flipped, 1);
        assert_eq!(feed.mark_read("a").flipped, 0);
        assert_eq!(feed.mark_read("missing").flipped, 0);
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_unread_matches_flags_for_interleavings() {
        // Deterministic pseudo-random interleavings of pushes and mark-reads.
        for seed in 0u64..50 {
            let mut feed = NotificationFeed::new();
            let epoch = feed.reset();
            let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let mut pushed = 0;

            for _ in 0..40 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let roll = (state >> 33) % 10;
                if roll < 6 {
                    let read = roll == 0;
                    feed.push(epoch, note(&format!("n{}", pushed), read));
                    pushed += 1;
                } else if pushed > 0 {
                    let target = (state >> 40) as usize % pushed;
                    feed.mark_read(&format!("n{}", target));
                }
                assert_eq!(feed.unread_count(), recount(&feed), "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_revert_restores_unread() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));
        let mark = feed.mark_read("a");

        assert_eq!(feed.revert_read(epoch, "a", mark.seq), 1);
        assert_eq!(feed.unread_count(), 1);
        assert!(!feed.items()[0].is_read);
    }

    #[test]
    fn test_superseded_failure_does_not_revert() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));

        let first = feed.mark_read("a");
        let second = feed.mark_read("a");
        assert_eq!(first.flipped, 1);
        assert_eq!(second.flipped, 0);

        // Second write lands first, then the first one fails.
        feed.confirm_read(epoch, "a", second.seq);
        assert_eq!(feed.revert_read(epoch, "a", first.seq), 0);
        assert!(feed.items()[0].is_read);
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_failure_while_newer_write_in_flight_does_not_revert() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));

        let first = feed.mark_read("a");
        let second = feed.mark_read("a");
        assert_eq!(feed.revert_read(epoch, "a", first.seq), 0);
        assert_eq!(feed.unread_count(), 0);

        // The newest write failing as well undoes the original flip.
        assert_eq!(feed.revert_read(epoch, "a", second.seq), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn test_confirmed_flip_survives_later_failure() {
        let mut feed = NotificationFeed::new();
        let epoch = feed.reset();
        feed.push(epoch, note("a", false));

        let first = feed.mark_read("a");
        let second = feed.mark_read("a");
        feed.confirm_read(epoch, "a", first.seq);
        assert_eq!(feed.revert_read(epoch, "a", second.seq), 0);
        assert!(feed.items()[0].is_read);
        assert_eq!(feed.unread_count(), recount(&feed));
    }

    #[test]
    fn test_stale_epoch_is_rejected() {
        let mut feed = NotificationFeed::new();
        let old = feed.reset();
        let current = feed.reset();
        assert!(!feed.push(old, note("a", false)));
        assert!(feed.push(current, note("b", false)));
        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }
}
