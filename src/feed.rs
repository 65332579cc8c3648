//! Panel contract: seed once, then advance with a pure tick.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Tick Driver │────►│  Panel::tick │────►│  next state  │
//! │  (interval)  │     │  (pure fn)   │     │  + notices   │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        ▲                    ▲
//!        │              ┌─────┴──────┐
//!    start/stop         │  Entropy   │
//!                       └────────────┘
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::Entropy;
use crate::logging::Domain;
use crate::notify::Notice;

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutput<S> {
    pub next: S,
    pub notices: Vec<Notice>,
    /// Records created or changed by this tick, for aggregate counters.
    pub touched: u64,
}

impl<S> TickOutput<S> {
    pub fn quiet(next: S) -> Self {
        Self { next, notices: Vec::new(), touched: 0 }
    }
}

pub trait Panel: Send + Sync + 'static {
    type State: Clone + Send + 'static;

    fn name(&self) -> &'static str;

    fn domain(&self) -> Domain;

    fn interval(&self) -> Duration;

    fn seed(&self, draws: &mut dyn Entropy, now: DateTime<Utc>) -> Self::State;

    /// Must not depend on anything other than its arguments.
    fn tick(
        &self,
        state: &Self::State,
        draws: &mut dyn Entropy,
        now: DateTime<Utc>,
    ) -> TickOutput<Self::State>;

    /// Number of records currently held, for summaries.
    fn len(&self, state: &Self::State) -> usize;
}

/// Newest-first sequence with an optional retention cap.
#[derive(Debug, Clone, Serialize)]
pub struct CappedFeed<T> {
    items: VecDeque<T>,
    cap: Option<usize>,
}

impl<T> CappedFeed<T> {
    pub fn bounded(cap: usize) -> Self {
        Self { items: VecDeque::with_capacity(cap), cap: Some(cap) }
    }

    pub fn unbounded() -> Self {
        Self { items: VecDeque::new(), cap: None }
    }

    /// Build from records given newest first; extra records past the cap are dropped.
    pub fn from_newest_first(items: impl IntoIterator<Item = T>, cap: Option<usize>) -> Self {
        let mut feed = Self { items: items.into_iter().collect(), cap };
        feed.enforce_cap();
        feed
    }

    pub fn prepend(&mut self, item: T) {
        self.items.push_front(item);
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if let Some(cap) = self.cap {
            while self.items.len() > cap {
                self.items.pop_back();
            }
        }
    }

    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f);
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.iter().cloned().collect()
    }
}

/// Fixed-length oldest-first window; pushing evicts the oldest once full.
#[derive(Debug, Clone, Serialize)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    len: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(len: usize) -> Self {
        Self { items: VecDeque::with_capacity(len), len }
    }

    /// Returns the evicted sample, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.len {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn capacity(&self) -> usize {
        self.len
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_feed_keeps_most_recent() {
        let mut feed = CappedFeed::bounded(3);
        for i in 0..10 {
            feed.prepend(i);
            assert!(feed.len() <= 3);
        }
        assert_eq!(feed.to_vec(), vec![9, 8, 7]);
    }

    #[test]
    fn unbounded_feed_grows() {
        let mut feed = CappedFeed::unbounded();
        for i in 0..100 {
            feed.prepend(i);
        }
        assert_eq!(feed.len(), 100);
        assert_eq!(feed.head(), Some(&99));
    }

    #[test]
    fn from_newest_first_applies_cap() {
        let feed = CappedFeed::from_newest_first(vec![5, 4, 3, 2], Some(2));
        assert_eq!(feed.to_vec(), vec![5, 4]);
    }

    #[test]
    fn sliding_window_evicts_fifo() {
        let mut w = SlidingWindow::new(3);
        assert_eq!(w.push(1), None);
        assert_eq!(w.push(2), None);
        assert_eq!(w.push(3), None);
        assert_eq!(w.push(4), Some(1));
        assert_eq!(w.len(), 3);
        assert_eq!(w.oldest(), Some(&2));
        assert_eq!(w.newest(), Some(&4));
    }
}
