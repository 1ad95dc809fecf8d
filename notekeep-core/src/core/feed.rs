//! Live note lists that refresh after every committed write.
//!
//! A [`NoteFeed`] is the receiving half of a `tokio::sync::watch` channel.
//! The store keeps the sending halves in a [`FeedRegistry`] and, after each
//! commit, recomputes every distinct query once and publishes the result.
//! Subscribers therefore only ever observe committed snapshots, and a slow
//! subscriber never holds up a writer: it simply sees the latest value when
//! it next looks.
//!
//! Dropping a `NoteFeed` is the whole of cancellation. The registry notices
//! the closed channel on the next publish or subscribe and forgets it.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::{Note, Result};

/// Which query a feed tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedQuery {
    /// Every note, newest first.
    All,
    /// Notes whose title or text contains the query string.
    Search(String),
}

/// A subscription to a live, ordered note list.
#[derive(Debug)]
pub struct NoteFeed {
    query: FeedQuery,
    rx: watch::Receiver<Vec<Note>>,
}

impl NoteFeed {
    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    /// Returns the most recent snapshot and marks it as seen.
    pub fn latest(&mut self) -> Vec<Note> {
        self.rx.borrow_and_update().clone()
    }

    /// True if a snapshot newer than the last one returned by [`latest`](Self::latest)
    /// has been published.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next published snapshot and returns it.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Vec<Note>> {
        self.rx.changed().await.ok()?;
        Some(self.latest())
    }
}

/// Sending halves of every live feed, grouped by query.
#[derive(Default)]
pub(crate) struct FeedRegistry {
    senders: Vec<(FeedQuery, watch::Sender<Vec<Note>>)>,
}

impl FeedRegistry {
    /// Registers a new feed whose first value is `initial`.
    pub(crate) fn subscribe(&mut self, query: FeedQuery, initial: Vec<Note>) -> NoteFeed {
        self.prune();
        let (tx, rx) = watch::channel(initial);
        self.senders.push((query.clone(), tx));
        NoteFeed { query, rx }
    }

    fn prune(&mut self) {
        self.senders.retain(|(_, tx)| !tx.is_closed());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }

    /// Drops closed feeds, then recomputes each distinct live query once via
    /// `load` and pushes the snapshot to its subscribers.
    ///
    /// A query that fails to load is logged and its subscribers keep their
    /// previous snapshot.
    pub(crate) fn publish<F>(&mut self, mut load: F)
    where
        F: FnMut(&FeedQuery) -> Result<Vec<Note>>,
    {
        self.prune();

        let mut snapshots: HashMap<FeedQuery, Option<Vec<Note>>> = HashMap::new();
        for (query, tx) in &self.senders {
            let snapshot = snapshots.entry(query.clone()).or_insert_with(|| {
                load(query)
                    .map_err(|e| log::error!("failed to refresh feed {query:?}: {e}"))
                    .ok()
            });
            if let Some(notes) = snapshot {
                tx.send_replace(notes.clone());
            }
        }
    }
}
