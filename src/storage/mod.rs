use crate::{
    domain::{Board, Card, CardFields, CardId, Column, ColumnId},
    error::Result,
};
use async_trait::async_trait;

pub mod memory;

/// Backend that holds the authoritative copy of the board
///
/// Every call either succeeds or fails as a whole; a failed move leaves the
/// backend as it was.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads the board to show on startup
    async fn load_board(&self) -> Result<Board>;

    /// Moves a card to `new_index` within its current column
    async fn reorder_within_column(
        &self,
        column_id: &ColumnId,
        card_id: &CardId,
        new_index: usize,
    ) -> Result<()>;

    /// Moves a card into another column at `new_index`
    async fn move_across_columns(
        &self,
        card_id: &CardId,
        from_column_id: &ColumnId,
        to_column_id: &ColumnId,
        new_index: usize,
    ) -> Result<()>;

    /// Creates an empty column at the end of the board
    async fn create_column(&self, title: &str) -> Result<Column>;

    /// Creates a card at the end of a column
    async fn create_task(&self, column_id: &ColumnId, fields: CardFields) -> Result<Card>;
}
