//! Resolves identifiers from drag events against the current board.

use crate::domain::{Board, CardId, CardLocation, Column, ColumnId};
use serde::{Deserialize, Serialize};

/// An identifier reported by the gesture source for a droppable region
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DroppableId {
    Column(ColumnId),
    Card(CardId),
}

impl From<ColumnId> for DroppableId {
    fn from(id: ColumnId) -> Self {
        Self::Column(id)
    }
}

impl From<CardId> for DroppableId {
    fn from(id: CardId) -> Self {
        Self::Card(id)
    }
}

/// What a drag event is over, resolved against the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// The column itself (its background or an empty column)
    Column { column_id: ColumnId },
    /// A card, with the column currently holding it
    Card {
        card_id: CardId,
        column_id: ColumnId,
        index: usize,
    },
}

impl DropTarget {
    pub fn column_id(&self) -> &ColumnId {
        match self {
            Self::Column { column_id } | Self::Card { column_id, .. } => column_id,
        }
    }
}

pub fn locate_card(board: &Board, card_id: &CardId) -> Option<CardLocation> {
    board.columns.iter().find_map(|col| {
        col.position_of(card_id)
            .map(|index| CardLocation::new(col.id.clone(), index))
    })
}

pub fn locate_drop_target(board: &Board, target: &DroppableId) -> Option<DropTarget> {
    match target {
        DroppableId::Column(column_id) => {
            board.find_column(column_id).map(|col| DropTarget::Column {
                column_id: col.id.clone(),
            })
        }
        DroppableId::Card(card_id) => {
            locate_card(board, card_id).map(|loc| DropTarget::Card {
                card_id: card_id.clone(),
                column_id: loc.column_id,
                index: loc.index,
            })
        }
    }
}

/// Whether `card_id` sits somewhere else in `after` than it did in `before`
///
/// Within one column only the order relative to cards present in both boards
/// counts, so cards added or removed around it do not register as a move.
/// A card missing from either board has not moved.
pub fn card_moved(before: &Board, after: &Board, card_id: &CardId) -> bool {
    let (Some(was), Some(now)) = (locate_card(before, card_id), locate_card(after, card_id))
    else {
        return false;
    };
    if was.column_id != now.column_id {
        return true;
    }
    let (Some(old), Some(new)) = (
        before.find_column(&was.column_id),
        after.find_column(&now.column_id),
    ) else {
        return false;
    };
    shared_rank(old, new, card_id) != shared_rank(new, old, card_id)
}

fn shared_rank(column: &Column, other: &Column, card_id: &CardId) -> Option<usize> {
    column
        .cards
        .iter()
        .filter(|card| other.position_of(&card.id).is_some())
        .position(|card| &card.id == card_id)
}

/// Resolves an untagged identifier: column ids are tried first, then cards.
///
/// Only correct while column and card identifiers never collide; prefer
/// [`locate_drop_target`] when the gesture source can tag its ids.
pub fn locate_raw_target(board: &Board, raw: &str) -> Option<DropTarget> {
    let as_column = DroppableId::Column(ColumnId::from(raw));
    locate_drop_target(board, &as_column)
        .or_else(|| locate_drop_target(board, &DroppableId::Card(CardId::from(raw))))
}
