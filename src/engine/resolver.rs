//! Computes the board that results from a hover or drop event.
//!
//! All functions are pure: they take the current board and return the next
//! one, or `None` when the event leaves the board as it is.

use crate::domain::{Board, CardId, ColumnId};
use crate::engine::locator::{locate_card, DropTarget};
use crate::error::{BoardError, Result};

/// Whether an event is a transient hover or the final drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    Hover,
    Final,
}

pub fn resolve(
    board: &Board,
    active: &CardId,
    target: Option<&DropTarget>,
    mode: MoveMode,
) -> Result<Option<Board>> {
    match (mode, target) {
        (_, None) => Ok(None),
        (MoveMode::Hover, Some(target)) => resolve_hover(board, active, target),
        (MoveMode::Final, Some(target)) => resolve_drop(board, active, target),
    }
}

/// Previews a cross-column move by appending the card to the hovered column.
///
/// Hovering within the card's own column does nothing; reordering there is
/// settled on drop.
pub fn resolve_hover(
    board: &Board,
    active: &CardId,
    target: &DropTarget,
) -> Result<Option<Board>> {
    let source = locate_card(board, active)
        .ok_or_else(|| BoardError::StaleSource(active.to_string()))?;

    if &source.column_id == target.column_id() {
        return Ok(None);
    }

    checked(board, active, target.column_id(), usize::MAX).map(Some)
}

/// Settles a drop.
///
/// * on a column: the card goes to the end of it
/// * on a card in the same column: array move to that card's index
/// * on a card in another column: inserted at that card's index, ahead of it
pub fn resolve_drop(
    board: &Board,
    active: &CardId,
    target: &DropTarget,
) -> Result<Option<Board>> {
    let source = locate_card(board, active)
        .ok_or_else(|| BoardError::StaleSource(active.to_string()))?;

    let (to, index) = match target {
        DropTarget::Column { column_id } => {
            let column = board
                .find_column(column_id)
                .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;
            let len = column.cards.len();
            let end = if &source.column_id == column_id { len - 1 } else { len };
            (column_id, end)
        }
        DropTarget::Card {
            column_id, index, ..
        } => (column_id, *index),
    };

    if &source.column_id == to && source.index == index {
        tracing::debug!(card_id = %active, index, "Drop on own position; nothing to do");
        return Ok(None);
    }

    checked(board, active, to, index).map(Some)
}

fn checked(board: &Board, active: &CardId, to: &ColumnId, index: usize) -> Result<Board> {
    board.relocate_card(active, to, index).map_err(|e| {
        if matches!(e, BoardError::InvariantViolation(_)) {
            tracing::error!(card_id = %active, error = %e, "Move would corrupt the board");
        }
        e
    })
}
