//! Change notification for a page's linked blocks.
//!
//! The HTTP API has no push channel, so the watcher polls the blocks linked
//! to a page, fingerprints them, and ticks a `watch` channel whenever the
//! fingerprint moves.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::block::Block;
use crate::traits::Notebook;

/// Hash of the uuids and contents of `blocks` and their descendants.
pub fn fingerprint(blocks: &[Block]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for block in blocks {
        block.walk(&mut |b| {
            b.uuid.hash(&mut hasher);
            b.content.hash(&mut hasher);
        });
    }
    hasher.finish()
}

/// Background poller publishing a tick whenever a page's linked blocks change.
pub struct ChangeWatcher {
    ticks: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start polling `page` every `every`. The first poll only records a
    /// baseline.
    pub fn spawn(notebook: Arc<dyn Notebook>, page: impl Into<String>, every: Duration) -> Self {
        let page = page.into();
        let (tx, ticks) = watch::channel(0u64);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<u64> = None;
            debug!(page = %page, every_ms = every.as_millis(), "watching linked blocks");

            loop {
                ticker.tick().await;
                let blocks = match notebook.linked_blocks(&page).await {
                    Ok(blocks) => blocks,
                    Err(e) => {
                        warn!(page = %page, error = %e, "failed to poll linked blocks");
                        continue;
                    }
                };

                let current = fingerprint(&blocks);
                match last {
                    Some(previous) if previous == current => trace!(page = %page, "no change"),
                    Some(_) => {
                        debug!(page = %page, blocks = blocks.len(), "linked blocks changed");
                        tx.send_modify(|n| *n = n.wrapping_add(1));
                    }
                    None => {}
                }
                last = Some(current);
            }
        });

        Self { ticks, handle }
    }

    /// New receiver of change ticks. Dropping it unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        let mut rx = self.ticks.clone();
        rx.mark_unchanged();
        rx
    }

    /// Stop polling.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Whether the polling task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
