use crate::domain::card::{Card, CardId};
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    /// Generates a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ColumnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a card sits on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLocation {
    pub column_id: ColumnId,
    pub index: usize,
}

impl CardLocation {
    pub fn new(column_id: ColumnId, index: usize) -> Self {
        Self { column_id, index }
    }
}

/// An ordered container of cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Column {
    pub fn new(id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            cards: Vec::new(),
        }
    }

    pub fn with_cards(mut self, cards: Vec<Card>) -> Self {
        self.cards = cards;
        self
    }

    /// Position of a card within this column
    pub fn position_of(&self, card_id: &CardId) -> Option<usize> {
        self.cards.iter().position(|c| &c.id == card_id)
    }

    pub fn card_ids(&self) -> Vec<&CardId> {
        self.cards.iter().map(|c| &c.id).collect()
    }
}

/// Kanban board state
///
/// Columns own their cards; a card lives in exactly one column. Updates
/// never mutate a shared board in place: callers clone, change the copy and
/// hand it to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub title: String,
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(title: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            title: title.into(),
            columns,
        }
    }

    pub fn find_column(&self, column_id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == column_id)
    }

    fn find_column_mut(&mut self, column_id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == column_id)
    }

    /// Finds a card anywhere on the board
    pub fn find_card(&self, card_id: &CardId) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|col| col.cards.iter())
            .find(|c| &c.id == card_id)
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Returns a copy of the board with `column` appended
    pub fn with_column(&self, column: Column) -> Result<Board> {
        let mut next = self.clone();
        next.columns.push(column);
        next.validate()?;
        Ok(next)
    }

    /// Returns a copy of the board with `card` appended to a column
    pub fn with_card(&self, column_id: &ColumnId, card: Card) -> Result<Board> {
        let mut next = self.clone();
        next.find_column_mut(column_id)
            .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?
            .cards
            .push(card);
        next.validate()?;
        Ok(next)
    }

    /// Returns a copy of the board with a card taken out of its column and
    /// inserted into `to` at `index`.
    ///
    /// The index refers to the destination column after removal and is
    /// clamped to its length, so `usize::MAX` appends.
    pub fn relocate_card(&self, card_id: &CardId, to: &ColumnId, index: usize) -> Result<Board> {
        let mut next = self.clone();

        let card = next
            .columns
            .iter_mut()
            .find_map(|col| col.position_of(card_id).map(|pos| col.cards.remove(pos)))
            .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;

        let dest = next
            .find_column_mut(to)
            .ok_or_else(|| BoardError::ColumnNotFound(to.to_string()))?;
        let index = index.min(dest.cards.len());
        dest.cards.insert(index, card);

        next.ensure_same_cards(self)?;
        Ok(next)
    }

    /// Checks that column ids are unique and every card appears exactly once
    pub fn validate(&self) -> Result<()> {
        let mut columns = HashSet::new();
        for column in &self.columns {
            if !columns.insert(&column.id) {
                return Err(BoardError::InvariantViolation(format!(
                    "duplicate column {}",
                    column.id
                )));
            }
        }

        let mut cards = HashSet::new();
        for card in self.columns.iter().flat_map(|col| col.cards.iter()) {
            if !cards.insert(&card.id) {
                return Err(BoardError::InvariantViolation(format!(
                    "card {} appears more than once",
                    card.id
                )));
            }
        }

        Ok(())
    }

    /// Checks that `self` holds exactly the cards of `before`, each once
    pub fn ensure_same_cards(&self, before: &Board) -> Result<()> {
        self.validate()?;

        let after: HashSet<&CardId> = self.card_ids().collect();
        let before: HashSet<&CardId> = before.card_ids().collect();

        if let Some(lost) = before.difference(&after).next() {
            return Err(BoardError::InvariantViolation(format!("card {lost} was lost")));
        }
        if let Some(added) = after.difference(&before).next() {
            return Err(BoardError::InvariantViolation(format!(
                "card {added} appeared from nowhere"
            )));
        }
        Ok(())
    }

    fn card_ids(&self) -> impl Iterator<Item = &CardId> {
        self.columns
            .iter()
            .flat_map(|col| col.cards.iter().map(|c| &c.id))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(
            "Default Board",
            vec![
                Column::new(ColumnId::from("todo"), "Todo"),
                Column::new(ColumnId::from("doing"), "Doing"),
                Column::new(ColumnId::from("done"), "Done"),
            ],
        )
    }
}
