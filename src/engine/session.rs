use crate::config::HoverMode;
use crate::domain::{Board, Card, CardId, CardLocation};
use crate::engine::locator::{card_moved, locate_card, locate_drop_target, DroppableId};
use crate::engine::reconcile::{CommittedMove, MoveIntent};
use crate::engine::resolver::{resolve_drop, resolve_hover};
use crate::engine::store::BoardStore;
use crate::error::{BoardError, Result};
use std::mem;
use std::sync::Arc;

/// The card being dragged and the board as it was before the drag began
#[derive(Debug, Clone)]
struct ActiveDrag {
    card: Card,
    origin: CardLocation,
    snapshot: Arc<Board>,
    /// Last board this drag committed; `snapshot` until a hover previews
    latest: Arc<Board>,
}

#[derive(Debug, Clone, Default)]
enum DragSession {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

/// Tracks one drag gesture from start to drop or cancel
///
/// Hover events update the store directly; the drop yields a
/// [`CommittedMove`] for the reconciler when the card ended up somewhere
/// other than where it started.
pub struct DragController {
    store: Arc<BoardStore>,
    hover_mode: HoverMode,
    session: DragSession,
}

impl DragController {
    pub fn new(store: Arc<BoardStore>, hover_mode: HoverMode) -> Self {
        Self {
            store,
            hover_mode,
            session: DragSession::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.session, DragSession::Dragging(_))
    }

    /// Data for the floating proxy under the pointer
    pub fn active_card(&self) -> Option<&Card> {
        match &self.session {
            DragSession::Dragging(drag) => Some(&drag.card),
            DragSession::Idle => None,
        }
    }

    pub fn start(&mut self, active: &CardId) -> Result<()> {
        if let DragSession::Dragging(drag) = &self.session {
            tracing::warn!(
                card_id = %active,
                dragging = %drag.card.id,
                "Drag start ignored; another drag is active"
            );
            return Err(BoardError::DragInProgress(drag.card.id.to_string()));
        }

        let snapshot = self.store.state();
        let origin = locate_card(&snapshot, active)
            .ok_or_else(|| BoardError::CardNotFound(active.to_string()))?;
        let card = snapshot
            .find_card(active)
            .cloned()
            .ok_or_else(|| BoardError::CardNotFound(active.to_string()))?;

        tracing::debug!(
            card_id = %active,
            column_id = %origin.column_id,
            index = origin.index,
            "Drag started"
        );
        self.store.announce_active(Some(&card));
        self.session = DragSession::Dragging(ActiveDrag {
            card,
            origin,
            latest: snapshot.clone(),
            snapshot,
        });
        Ok(())
    }

    /// Handles a hover event; `None` means the pointer is over nothing
    pub fn over(&mut self, active: &CardId, over: Option<&DroppableId>) -> Result<()> {
        let drag = match &mut self.session {
            DragSession::Dragging(drag) => drag,
            DragSession::Idle => return Err(BoardError::NoActiveDrag),
        };
        check_active(drag, active)?;

        let Some(over) = over else {
            return Ok(());
        };
        if self.hover_mode == HoverMode::Overlay {
            return Ok(());
        }

        let latest = &drag.latest;
        let result = self.store.update(|board| {
            ensure_in_place(latest, board, active)?;
            let target = locate_drop_target(board, over)
                .ok_or_else(|| BoardError::UnresolvedTarget(format!("{over:?}")))?;
            resolve_hover(board, active, &target)
        });

        match result {
            Ok(Some(preview)) => {
                tracing::debug!(card_id = %active, "Hover preview committed");
                drag.latest = preview;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e @ BoardError::UnresolvedTarget(_)) => {
                tracing::debug!(card_id = %active, error = %e, "Hover target ignored");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(card_id = %active, error = %e, "Aborting drag");
                let drag = drag.clone();
                self.finish(&drag, true);
                Err(e)
            }
        }
    }

    /// Handles the drop. The session always ends here.
    pub fn drop_on(
        &mut self,
        active: &CardId,
        over: Option<&DroppableId>,
    ) -> Result<Option<CommittedMove>> {
        let drag = match mem::take(&mut self.session) {
            DragSession::Dragging(drag) => drag,
            DragSession::Idle => return Err(BoardError::NoActiveDrag),
        };
        if let Err(e) = check_active(&drag, active) {
            // keep the real session alive; the event was for someone else
            self.session = DragSession::Dragging(drag);
            return Err(e);
        }

        let Some(over) = over else {
            tracing::debug!(card_id = %active, "Dropped outside any column");
            self.finish(&drag, true);
            return Ok(None);
        };

        let result = self.store.update(|board| {
            ensure_in_place(&drag.latest, board, active)?;
            let target = locate_drop_target(board, over)
                .ok_or_else(|| BoardError::UnresolvedTarget(format!("{over:?}")))?;
            resolve_drop(board, active, &target)
        });

        let committed = match result {
            Ok(Some(board)) => board,
            Ok(None) => self.store.state(),
            Err(e) => {
                tracing::warn!(card_id = %active, error = %e, "Drop discarded");
                self.finish(&drag, true);
                return Err(e);
            }
        };
        self.finish(&drag, false);

        let Some(destination) = locate_card(&committed, active) else {
            return Err(BoardError::StaleSource(active.to_string()));
        };
        let Some(intent) = MoveIntent::between(active, &drag.origin, &destination) else {
            tracing::debug!(card_id = %active, "Card back where it started");
            return Ok(None);
        };

        tracing::info!(
            card_id = %active,
            from = %drag.origin.column_id,
            to = %destination.column_id,
            index = destination.index,
            "Move committed"
        );
        Ok(Some(CommittedMove {
            intent,
            origin: drag.origin,
            snapshot: drag.snapshot,
            committed,
        }))
    }

    /// Abandons the drag and restores the board from before it began
    pub fn cancel(&mut self) -> Result<()> {
        match mem::take(&mut self.session) {
            DragSession::Dragging(drag) => {
                tracing::debug!(card_id = %drag.card.id, "Drag cancelled");
                self.finish(&drag, true);
                Ok(())
            }
            DragSession::Idle => Err(BoardError::NoActiveDrag),
        }
    }

    /// Returns to idle, optionally undoing any hover previews first
    fn finish(&mut self, drag: &ActiveDrag, discard_preview: bool) {
        if discard_preview && !Arc::ptr_eq(&drag.latest, &drag.snapshot) {
            let reverted = self.store.revert_preview(
                &drag.latest,
                &drag.snapshot,
                &drag.card.id,
                &drag.origin,
            );
            if let Err(e) = reverted {
                tracing::error!(
                    card_id = %drag.card.id,
                    error = %e,
                    "Could not undo hover preview"
                );
            }
        }
        self.session = DragSession::Idle;
        self.store.announce_active(None);
    }
}

/// Fails when something other than this drag moved the card since `latest`
///
/// A failed save of an earlier move puts the card back where storage has it;
/// the drag's origin and snapshot no longer describe a state storage accepts.
fn ensure_in_place(latest: &Board, current: &Board, active: &CardId) -> Result<()> {
    if card_moved(latest, current, active) {
        tracing::warn!(card_id = %active, "Card moved under the drag; ending session");
        return Err(BoardError::MovedDuringDrag(active.to_string()));
    }
    Ok(())
}

fn check_active(drag: &ActiveDrag, active: &CardId) -> Result<()> {
    if &drag.card.id != active {
        return Err(BoardError::ActiveMismatch {
            expected: drag.card.id.to_string(),
            got: active.to_string(),
        });
    }
    Ok(())
}
