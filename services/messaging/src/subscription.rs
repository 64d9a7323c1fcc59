//! Live match subscriptions
//!
//! Wraps the store's per-document change feed in a spawned forwarding task
//! that decodes each document and hands the full match to the callback.
//! Dropping or unsubscribing the handle aborts the task, after which no
//! further callbacks run.

use datastore::collections::MATCHES;
use datastore::document::DocumentStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use types::ids::MatchId;
use types::matching::Match;

/// Handle for one live subscription
///
/// The subscription stays active for the lifetime of the handle.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Tear the subscription down. Idempotent with drop.
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    /// Whether the forwarding task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Register a live-update listener for one match.
///
/// Each change delivers the full current match, message log included. A
/// subscriber that falls behind the feed skips ahead to newer states; since
/// every event is complete state, nothing is lost by skipping.
pub fn subscribe<S, F>(store: &S, match_id: MatchId, mut callback: F) -> SubscriptionHandle
where
    S: DocumentStore + ?Sized,
    F: FnMut(Match) + Send + 'static,
{
    let mut rx = store.watch(MATCHES, *match_id.as_uuid());
    let task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(doc) => match doc.decode::<Match>() {
                    Ok(m) => callback(m),
                    Err(e) => {
                        tracing::warn!(match_id = %match_id, error = %e, "undecodable match update")
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(match_id = %match_id, skipped, "subscription lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    SubscriptionHandle { task }
}
