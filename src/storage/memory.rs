use crate::{
    domain::{Board, Card, CardFields, CardId, Column, ColumnId},
    engine::reconcile::MoveIntent,
    error::{BoardError, Result},
    storage::Storage,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// In-memory backend
///
/// Keeps its own copy of the board and applies intents to it, which makes
/// it handy for demos and tests. Failures can be scripted with
/// [`MemoryStorage::fail_next`].
pub struct MemoryStorage {
    board: Mutex<Board>,
    intents: Mutex<Vec<MoveIntent>>,
    failures: Mutex<VecDeque<String>>,
    latency: Option<Duration>,
}

impl MemoryStorage {
    pub fn new(board: Board) -> Self {
        Self {
            board: Mutex::new(board),
            intents: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            latency: None,
        }
    }

    /// Delays every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next call fail with `reason`
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failures.lock().push_back(reason.into());
    }

    /// The backend's copy of the board
    pub fn board(&self) -> Board {
        self.board.lock().clone()
    }

    /// Move intents accepted so far, oldest first
    pub fn intents(&self) -> Vec<MoveIntent> {
        self.intents.lock().clone()
    }

    async fn begin(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().pop_front() {
            Some(reason) => Err(BoardError::StorageError(reason)),
            None => Ok(()),
        }
    }

    fn apply(&self, intent: MoveIntent, expected_column: &ColumnId) -> Result<()> {
        let mut board = self.board.lock();
        let card_id = intent.card_id();

        let in_column = board
            .find_column(expected_column)
            .ok_or_else(|| BoardError::ColumnNotFound(expected_column.to_string()))?
            .position_of(card_id)
            .is_some();
        if !in_column {
            return Err(BoardError::StorageError(format!(
                "card {card_id} is not in column {expected_column}"
            )));
        }

        let destination = intent.destination();
        *board = board.relocate_card(card_id, &destination.column_id, destination.index)?;
        self.intents.lock().push(intent);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_board(&self) -> Result<Board> {
        self.begin().await?;
        Ok(self.board())
    }

    async fn reorder_within_column(
        &self,
        column_id: &ColumnId,
        card_id: &CardId,
        new_index: usize,
    ) -> Result<()> {
        self.begin().await?;
        let intent = MoveIntent::ReorderWithinColumn {
            column_id: column_id.clone(),
            card_id: card_id.clone(),
            new_index,
        };
        self.apply(intent, column_id)
    }

    async fn move_across_columns(
        &self,
        card_id: &CardId,
        from_column_id: &ColumnId,
        to_column_id: &ColumnId,
        new_index: usize,
    ) -> Result<()> {
        self.begin().await?;
        let intent = MoveIntent::MoveAcrossColumns {
            card_id: card_id.clone(),
            from_column_id: from_column_id.clone(),
            to_column_id: to_column_id.clone(),
            new_index,
        };
        self.apply(intent, from_column_id)
    }

    async fn create_column(&self, title: &str) -> Result<Column> {
        self.begin().await?;
        let column = Column::new(ColumnId::generate(), title);
        let mut board = self.board.lock();
        *board = board.with_column(column.clone())?;
        Ok(column)
    }

    async fn create_task(&self, column_id: &ColumnId, fields: CardFields) -> Result<Card> {
        self.begin().await?;
        let card = Card::from_fields(CardId::generate(), fields);
        let mut board = self.board.lock();
        *board = board.with_card(column_id, card.clone())?;
        Ok(card)
    }
}
