use crate::domain::{Board, Card, CardId, CardLocation};
use crate::engine::locator::card_moved;
use crate::error::{BoardError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Receives board updates; implemented by the rendering side
pub trait BoardObserver: Send + Sync {
    /// Called once per committed transition with the new board
    fn on_board_changed(&self, board: &Arc<Board>);

    /// Called when a drag starts (`Some`) or ends (`None`)
    fn on_active_card(&self, _card: Option<&Card>) {}

    /// Called for user-visible errors
    fn on_error(&self, _error: &BoardError) {}
}

/// Holds the canonical board value
///
/// Every change swaps in a new `Arc<Board>`; readers never see a half-applied
/// update. The store is owned by the caller and shared by `Arc`.
pub struct BoardStore {
    state: Mutex<Arc<Board>>,
    observers: RwLock<Vec<Arc<dyn BoardObserver>>>,
}

impl BoardStore {
    pub fn new(board: Board) -> Result<Self> {
        board.validate()?;
        Ok(Self {
            state: Mutex::new(Arc::new(board)),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Returns the current board
    pub fn state(&self) -> Arc<Board> {
        self.state.lock().clone()
    }

    pub fn subscribe(&self, observer: Arc<dyn BoardObserver>) {
        self.observers.write().push(observer);
    }

    /// Atomically replaces the board
    ///
    /// Replacing with an equal board is not a transition and notifies nobody.
    pub fn replace_state(&self, next: Board) -> Result<Arc<Board>> {
        self.update(|_| Ok(Some(next)))
            .map(|committed| committed.unwrap_or_else(|| self.state()))
    }

    /// Computes, validates and swaps in a new board under one lock
    ///
    /// `f` returns `None` to leave the board untouched. Returns the new board
    /// if one was committed.
    pub fn update<F>(&self, f: F) -> Result<Option<Arc<Board>>>
    where
        F: FnOnce(&Board) -> Result<Option<Board>>,
    {
        let committed = {
            let mut state = self.state.lock();
            let Some(next) = f(&**state)? else {
                return Ok(None);
            };
            if let Err(e) = next.validate() {
                tracing::error!(error = %e, "Rejected board update");
                return Err(e);
            }
            if next == **state {
                return Ok(None);
            }
            let next = Arc::new(next);
            *state = next.clone();
            next
        };

        self.notify(&committed);
        Ok(Some(committed))
    }

    /// Undoes a move of `card_id`
    ///
    /// If the board is still exactly `expected` (the board the move produced)
    /// the `snapshot` is restored wholesale. Otherwise other changes landed in
    /// between, so only the card is put back at `origin`.
    pub fn rollback(
        &self,
        expected: &Arc<Board>,
        snapshot: &Arc<Board>,
        card_id: &CardId,
        origin: &CardLocation,
    ) -> Result<Option<Arc<Board>>> {
        self.update(|current| restore(current, expected, snapshot, card_id, origin))
    }

    /// Undoes a hover preview like [`BoardStore::rollback`], unless the card
    /// has been moved away from where the preview put it
    ///
    /// In that case the board already shows the card somewhere else (a failed
    /// persistence put it back) and is left as is.
    pub fn revert_preview(
        &self,
        preview: &Arc<Board>,
        snapshot: &Arc<Board>,
        card_id: &CardId,
        origin: &CardLocation,
    ) -> Result<Option<Arc<Board>>> {
        self.update(|current| {
            if card_moved(preview, current, card_id) {
                tracing::warn!(card_id = %card_id, "Card moved during drag; keeping board");
                return Ok(None);
            }
            restore(current, preview, snapshot, card_id, origin)
        })
    }

    /// Tells observers which card is being dragged
    pub fn announce_active(&self, card: Option<&Card>) {
        for observer in self.observers.read().iter() {
            observer.on_active_card(card);
        }
    }

    /// Surfaces an error to observers
    pub fn report_error(&self, error: &BoardError) {
        for observer in self.observers.read().iter() {
            observer.on_error(error);
        }
    }

    fn notify(&self, board: &Arc<Board>) {
        for observer in self.observers.read().iter() {
            observer.on_board_changed(board);
        }
    }
}

fn restore(
    current: &Board,
    expected: &Board,
    snapshot: &Board,
    card_id: &CardId,
    origin: &CardLocation,
) -> Result<Option<Board>> {
    if current == expected {
        return Ok(Some(snapshot.clone()));
    }
    if current.find_card(card_id).is_none() {
        tracing::warn!(card_id = %card_id, "Card vanished before rollback; leaving board as is");
        return Ok(None);
    }
    tracing::debug!(card_id = %card_id, "Board changed since move; compensating single card");
    current
        .relocate_card(card_id, &origin.column_id, origin.index)
        .map(Some)
}
