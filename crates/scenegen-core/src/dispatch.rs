//! Commit ordering for concurrently generated units
//!
//! Units generate concurrently, but steps of one scene must be persisted in
//! selector order. Each unit holds a [`CommitTurn`]: it waits for the unit
//! before it in the same scene, commits, then passes the turn on.
//!
//! - A predecessor that finishes without committing (failure, staging,
//!   cancellation) releases the turn by being dropped.
//! - Turns only wait on earlier units, so in-order dispatch cannot deadlock.

use std::collections::HashMap;
use tokio::sync::oneshot;

/// Right to commit after the previous unit of the same scene
#[derive(Debug, Default)]
pub struct CommitTurn {
    predecessor: Option<oneshot::Receiver<()>>,
    successor: Option<oneshot::Sender<()>>,
}

impl CommitTurn {
    /// Create a turn that never waits
    #[inline]
    #[must_use]
    pub fn free() -> Self {
        Self::default()
    }

    /// Whether this turn waits on a predecessor
    #[inline]
    #[must_use]
    pub fn has_predecessor(&self) -> bool {
        self.predecessor.is_some()
    }

    /// Wait until the predecessor committed or gave up
    pub async fn wait(&mut self) {
        if let Some(rx) = self.predecessor.take() {
            // a dropped sender means the predecessor gave up
            let _ = rx.await;
        }
    }

    /// Let the successor commit
    #[inline]
    pub fn pass(mut self) {
        if let Some(tx) = self.successor.take() {
            let _ = tx.send(());
        }
    }
}

/// Build one turn per unit, chaining units that share a scene
///
/// `scene_ids` is in dispatch order. With `ordered` false every turn is free.
#[must_use]
pub fn commit_turns(scene_ids: impl IntoIterator<Item = u64>, ordered: bool) -> Vec<CommitTurn> {
    if !ordered {
        return scene_ids.into_iter().map(|_| CommitTurn::free()).collect();
    }
    let mut last: HashMap<u64, oneshot::Receiver<()>> = HashMap::new();
    scene_ids
        .into_iter()
        .map(|scene_id| {
            let (tx, rx) = oneshot::channel();
            CommitTurn {
                predecessor: last.insert(scene_id, rx),
                successor: Some(tx),
            }
        })
        .collect()
}
