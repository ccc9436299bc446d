use crate::domain::{Board, CardId, CardLocation, ColumnId};
use crate::engine::store::BoardStore;
use crate::error::{BoardError, Result};
use crate::storage::Storage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A persistence request describing one finished move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveIntent {
    ReorderWithinColumn {
        column_id: ColumnId,
        card_id: CardId,
        new_index: usize,
    },
    MoveAcrossColumns {
        card_id: CardId,
        from_column_id: ColumnId,
        to_column_id: ColumnId,
        new_index: usize,
    },
}

impl MoveIntent {
    /// The intent that takes a card from `origin` to `destination`, or
    /// `None` when they are the same place
    pub fn between(
        card_id: &CardId,
        origin: &CardLocation,
        destination: &CardLocation,
    ) -> Option<Self> {
        if origin == destination {
            return None;
        }
        let intent = if origin.column_id == destination.column_id {
            Self::ReorderWithinColumn {
                column_id: destination.column_id.clone(),
                card_id: card_id.clone(),
                new_index: destination.index,
            }
        } else {
            Self::MoveAcrossColumns {
                card_id: card_id.clone(),
                from_column_id: origin.column_id.clone(),
                to_column_id: destination.column_id.clone(),
                new_index: destination.index,
            }
        };
        Some(intent)
    }

    pub fn card_id(&self) -> &CardId {
        match self {
            Self::ReorderWithinColumn { card_id, .. }
            | Self::MoveAcrossColumns { card_id, .. } => card_id,
        }
    }

    pub fn destination(&self) -> CardLocation {
        match self {
            Self::ReorderWithinColumn {
                column_id,
                new_index,
                ..
            } => CardLocation::new(column_id.clone(), *new_index),
            Self::MoveAcrossColumns {
                to_column_id,
                new_index,
                ..
            } => CardLocation::new(to_column_id.clone(), *new_index),
        }
    }

    async fn send(&self, storage: &dyn Storage) -> Result<()> {
        match self {
            Self::ReorderWithinColumn {
                column_id,
                card_id,
                new_index,
            } => storage.reorder_within_column(column_id, card_id, *new_index).await,
            Self::MoveAcrossColumns {
                card_id,
                from_column_id,
                to_column_id,
                new_index,
            } => {
                storage
                    .move_across_columns(card_id, from_column_id, to_column_id, *new_index)
                    .await
            }
        }
    }
}

/// A move applied to the store but not yet confirmed by storage
#[derive(Debug, Clone)]
pub struct CommittedMove {
    pub intent: MoveIntent,
    /// Where the card was before the drag
    pub origin: CardLocation,
    /// Board before the drag began
    pub snapshot: Arc<Board>,
    /// Board right after the drop
    pub committed: Arc<Board>,
}

impl CommittedMove {
    /// Folds a later move of the same card into this one. The later target
    /// wins; the earlier origin and snapshot are kept.
    pub fn coalesce(self, later: CommittedMove) -> Option<CommittedMove> {
        let destination = later.intent.destination();
        let intent = MoveIntent::between(self.intent.card_id(), &self.origin, &destination)?;
        Some(CommittedMove {
            intent,
            origin: self.origin,
            snapshot: self.snapshot,
            committed: later.committed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Storage accepted the move (and any moves queued behind it)
    Confirmed,
    /// Another request for the card is in flight; this one will follow it
    Queued,
}

/// Sends committed moves to storage and undoes them when storage refuses
///
/// At most one request per card is in flight. Moves arriving meanwhile are
/// queued and coalesced so only the latest target is sent next.
pub struct Reconciler {
    storage: Arc<dyn Storage>,
    store: Arc<BoardStore>,
    timeout: Duration,
    // card -> move waiting behind the in-flight request
    pending: Mutex<HashMap<CardId, Option<CommittedMove>>>,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn Storage>, store: Arc<BoardStore>, timeout: Duration) -> Self {
        Self {
            storage,
            store,
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a request for the card is currently in flight
    pub fn is_pending(&self, card_id: &CardId) -> bool {
        self.pending.lock().contains_key(card_id)
    }

    pub async fn reconcile(&self, mv: CommittedMove) -> Result<ReconcileOutcome> {
        let card_id = mv.intent.card_id().clone();

        {
            let mut pending = self.pending.lock();
            if let Some(queued) = pending.get_mut(&card_id) {
                *queued = match queued.take() {
                    Some(earlier) => earlier.coalesce(mv),
                    None => Some(mv),
                };
                tracing::debug!(card_id = %card_id, "Move queued behind in-flight request");
                return Ok(ReconcileOutcome::Queued);
            }
            pending.insert(card_id.clone(), None);
        }

        let mut current = mv;
        loop {
            let sent = self.send(&current.intent).await;
            match sent {
                Ok(()) => {
                    tracing::info!(card_id = %card_id, intent = ?current.intent, "Move persisted");
                    let mut pending = self.pending.lock();
                    match pending.get_mut(&card_id).and_then(Option::take) {
                        Some(next) => current = next,
                        None => {
                            pending.remove(&card_id);
                            return Ok(ReconcileOutcome::Confirmed);
                        }
                    }
                }
                Err(reason) => {
                    let dropped = self.pending.lock().remove(&card_id).flatten();
                    if dropped.is_some() {
                        tracing::debug!(card_id = %card_id, "Discarding queued move after failure");
                    }
                    tracing::warn!(
                        card_id = %card_id,
                        reason = %reason,
                        "Persisting move failed; rolling back"
                    );

                    if let Err(e) = self.store.rollback(
                        &current.committed,
                        &current.snapshot,
                        &card_id,
                        &current.origin,
                    ) {
                        tracing::error!(card_id = %card_id, error = %e, "Rollback failed");
                    }

                    let err = BoardError::PersistenceFailure {
                        card_id: card_id.to_string(),
                        reason,
                    };
                    self.store.report_error(&err);
                    return Err(err);
                }
            }
        }
    }

    async fn send(&self, intent: &MoveIntent) -> std::result::Result<(), String> {
        match tokio::time::timeout(self.timeout, intent.send(self.storage.as_ref())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {} ms", self.timeout.as_millis())),
        }
    }
}
