use crate::config::EngineConfig;
use crate::domain::{Board, Card, CardFields, CardId, Column, ColumnId};
use crate::engine::locator::DroppableId;
use crate::engine::reconcile::{ReconcileOutcome, Reconciler};
use crate::engine::session::DragController;
use crate::engine::store::{BoardObserver, BoardStore};
use crate::error::{BoardError, Result};
use crate::storage::Storage;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Drives one board: takes gesture events, keeps the board value and hands
/// finished moves to storage.
///
/// Gesture handlers are synchronous. Persisting a drop runs as a task on the
/// tokio runtime the engine was built in, so a new drag can begin while it
/// is in flight; the returned handle resolves once storage has answered.
pub struct BoardEngine {
    store: Arc<BoardStore>,
    controller: DragController,
    reconciler: Arc<Reconciler>,
    storage: Arc<dyn Storage>,
    runtime: Handle,
}

impl BoardEngine {
    /// Must be called from within a tokio runtime
    pub fn new(board: Board, storage: Arc<dyn Storage>, config: &EngineConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| BoardError::NoRuntime(e.to_string()))?;
        let store = Arc::new(BoardStore::new(board)?);
        let controller = DragController::new(store.clone(), config.hover_mode);
        let reconciler = Arc::new(Reconciler::new(
            storage.clone(),
            store.clone(),
            config.persistence_timeout(),
        ));
        Ok(Self {
            store,
            controller,
            reconciler,
            storage,
            runtime,
        })
    }

    /// Builds an engine around the board held by `storage`
    pub async fn load(storage: Arc<dyn Storage>, config: &EngineConfig) -> Result<Self> {
        let board = storage.load_board().await?;
        tracing::debug!(
            columns = board.columns.len(),
            cards = board.card_count(),
            "Board loaded"
        );
        Self::new(board, storage, config)
    }

    pub fn subscribe(&self, observer: Arc<dyn BoardObserver>) {
        self.store.subscribe(observer);
    }

    pub fn snapshot(&self) -> Arc<Board> {
        self.store.state()
    }

    pub fn active_card(&self) -> Option<&Card> {
        self.controller.active_card()
    }

    pub fn is_pending(&self, card_id: &CardId) -> bool {
        self.reconciler.is_pending(card_id)
    }

    pub fn on_drag_start(&mut self, active: &CardId) -> Result<()> {
        self.controller.start(active)
    }

    pub fn on_drag_over(&mut self, active: &CardId, over: Option<&DroppableId>) -> Result<()> {
        self.controller.over(active, over)
    }

    /// Settles the drop. Returns a handle to the persistence task when the
    /// card actually moved.
    pub fn on_drag_end(
        &mut self,
        active: &CardId,
        over: Option<&DroppableId>,
    ) -> Result<Option<JoinHandle<Result<ReconcileOutcome>>>> {
        let Some(mv) = self.controller.drop_on(active, over)? else {
            return Ok(None);
        };
        let reconciler = self.reconciler.clone();
        Ok(Some(self.runtime.spawn(async move { reconciler.reconcile(mv).await })))
    }

    pub fn on_drag_cancel(&mut self) -> Result<()> {
        self.controller.cancel()
    }

    /// Creates a column in storage, then shows it
    pub async fn create_column(&self, title: &str) -> Result<Column> {
        let column = self.storage.create_column(title).await?;
        self.store
            .update(|board| board.with_column(column.clone()).map(Some))?;
        tracing::info!(column_id = %column.id, "Column created");
        Ok(column)
    }

    /// Creates a card at the end of a column in storage, then shows it
    pub async fn create_card(&self, column_id: &ColumnId, fields: CardFields) -> Result<Card> {
        let card = self.storage.create_task(column_id, fields).await?;
        self.store
            .update(|board| board.with_card(column_id, card.clone()).map(Some))?;
        tracing::info!(card_id = %card.id, column_id = %column_id, "Card created");
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::tests::{expect, layout, shape, Recorder};
    use crate::engine::MoveIntent;
    use crate::storage::memory::MemoryStorage;
    use proptest::prelude::*;
    use std::time::Duration;

    fn engine(board: Board) -> (Arc<MemoryStorage>, BoardEngine) {
        let storage = Arc::new(MemoryStorage::new(board.clone()));
        let engine = BoardEngine::new(board, storage.clone(), &EngineConfig::default()).unwrap();
        (storage, engine)
    }

    fn card(id: &str) -> DroppableId {
        CardId::from(id).into()
    }

    fn column(id: &str) -> DroppableId {
        ColumnId::from(id).into()
    }

    #[tokio::test]
    async fn test_same_column_reorder_is_persisted() {
        let (storage, mut engine) = engine(layout(&[("a", &["1", "2", "3"])]));
        let active = CardId::from("2");

        engine.on_drag_start(&active).unwrap();
        engine.on_drag_over(&active, Some(&card("3"))).unwrap();
        let handle = engine.on_drag_end(&active, Some(&card("3"))).unwrap().unwrap();

        assert_eq!(shape(&engine.snapshot()), expect(&[("a", &["1", "3", "2"])]));
        assert_eq!(handle.await.unwrap().unwrap(), ReconcileOutcome::Confirmed);
        assert_eq!(
            storage.intents(),
            vec![MoveIntent::ReorderWithinColumn {
                column_id: ColumnId::from("a"),
                card_id: active,
                new_index: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_previews_coalesce_into_one_intent() {
        let (storage, mut engine) = engine(layout(&[("a", &["1"]), ("b", &[]), ("c", &["3"])]));
        let active = CardId::from("1");

        engine.on_drag_start(&active).unwrap();
        engine.on_drag_over(&active, Some(&column("b"))).unwrap();
        engine.on_drag_over(&active, Some(&card("3"))).unwrap();
        let handle = engine.on_drag_end(&active, Some(&card("3"))).unwrap().unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(
            storage.intents(),
            vec![MoveIntent::MoveAcrossColumns {
                card_id: active,
                from_column_id: ColumnId::from("a"),
                to_column_id: ColumnId::from("c"),
                new_index: 0,
            }]
        );
        assert_eq!(shape(&storage.board()), shape(&engine.snapshot()));
        assert_eq!(
            shape(&engine.snapshot()),
            expect(&[("a", &[]), ("b", &[]), ("c", &["1", "3"])])
        );
    }

    #[tokio::test]
    async fn test_noop_drop_sends_nothing() {
        let (storage, mut engine) = engine(layout(&[("a", &["1", "2"])]));
        let before = engine.snapshot();
        let active = CardId::from("1");

        engine.on_drag_start(&active).unwrap();
        let handle = engine.on_drag_end(&active, Some(&card("1"))).unwrap();

        assert!(handle.is_none());
        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert!(storage.intents().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_sends_nothing() {
        let board = layout(&[("a", &["1", "2"]), ("b", &[])]);
        let (storage, mut engine) = engine(board.clone());
        let active = CardId::from("1");

        engine.on_drag_start(&active).unwrap();
        engine.on_drag_over(&active, Some(&column("b"))).unwrap();
        engine.on_drag_cancel().unwrap();

        assert_eq!(*engine.snapshot(), board);
        assert!(engine.active_card().is_none());
        assert!(storage.intents().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_reverts_drop() {
        let board = layout(&[("a", &["1"]), ("b", &[])]);
        let (storage, mut engine) = engine(board.clone());
        let recorder = Arc::new(Recorder::default());
        engine.subscribe(recorder.clone());
        storage.fail_next("network unreachable");
        let active = CardId::from("1");

        engine.on_drag_start(&active).unwrap();
        let handle = engine.on_drag_end(&active, Some(&column("b"))).unwrap().unwrap();
        assert_eq!(shape(&engine.snapshot()), expect(&[("a", &[]), ("b", &["1"])]));

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(BoardError::PersistenceFailure { .. })));
        assert!(result.unwrap_err().is_user_visible());
        assert_eq!(*engine.snapshot(), board);
        assert_eq!(recorder.errors.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_drag_while_persisting() {
        let board = layout(&[("a", &["1", "2"]), ("b", &[])]);
        let storage = Arc::new(
            MemoryStorage::new(board.clone()).with_latency(Duration::from_millis(50)),
        );
        let mut engine =
            BoardEngine::new(board, storage.clone(), &EngineConfig::default()).unwrap();

        let one = CardId::from("1");
        engine.on_drag_start(&one).unwrap();
        let first = engine.on_drag_end(&one, Some(&column("b"))).unwrap().unwrap();
        tokio::task::yield_now().await;
        assert!(engine.is_pending(&one));

        let two = CardId::from("2");
        engine.on_drag_start(&two).unwrap();
        engine.on_drag_over(&two, Some(&card("1"))).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), ReconcileOutcome::Confirmed);

        let second = engine.on_drag_end(&two, Some(&card("1"))).unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(shape(&engine.snapshot()), expect(&[("a", &[]), ("b", &["2", "1"])]));
        assert_eq!(shape(&storage.board()), shape(&engine.snapshot()));
    }

    #[tokio::test]
    async fn test_load_and_create() {
        let storage = Arc::new(MemoryStorage::new(Board::default()));
        let engine = BoardEngine::load(storage.clone(), &EngineConfig::default())
            .await
            .unwrap();

        let column = engine.create_column("Blocked").await.unwrap();
        let created = engine
            .create_card(&column.id, CardFields::new("Ship it"))
            .await
            .unwrap();

        let board = engine.snapshot();
        assert_eq!(board.columns.len(), 4);
        assert_eq!(board.find_card(&created.id).unwrap().title, "Ship it");
        assert_eq!(*board, storage.board());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_board() {
        let storage = Arc::new(MemoryStorage::new(Board::default()));
        let engine =
            BoardEngine::new(Board::default(), storage.clone(), &EngineConfig::default()).unwrap();
        storage.fail_next("quota exceeded");

        assert!(engine.create_column("Later").await.is_err());
        assert_eq!(*engine.snapshot(), Board::default());
    }

    /// Starts a second drag of card 1 while its first move to b is failing
    async fn redrag_during_failed_save() -> (Arc<MemoryStorage>, BoardEngine) {
        let board = layout(&[("a", &["1"]), ("b", &[]), ("c", &[])]);
        let storage =
            Arc::new(MemoryStorage::new(board.clone()).with_latency(Duration::from_millis(100)));
        storage.fail_next("disk full");
        let mut engine =
            BoardEngine::new(board, storage.clone(), &EngineConfig::default()).unwrap();
        let one = CardId::from("1");

        engine.on_drag_start(&one).unwrap();
        let first = engine.on_drag_end(&one, Some(&column("b"))).unwrap().unwrap();
        tokio::task::yield_now().await;

        engine.on_drag_start(&one).unwrap();
        engine.on_drag_over(&one, Some(&column("c"))).unwrap();
        let failed = first.await.unwrap();
        assert!(matches!(failed, Err(BoardError::PersistenceFailure { .. })));
        (storage, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_failed_save_of_dragged_card() {
        let (storage, mut engine) = redrag_during_failed_save().await;

        engine.on_drag_cancel().unwrap();

        assert_eq!(shape(&storage.board()), shape(&engine.snapshot()));
        assert_eq!(
            shape(&engine.snapshot()),
            expect(&[("a", &["1"]), ("b", &[]), ("c", &[])])
        );
        assert!(!engine.is_pending(&CardId::from("1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_after_failed_save_of_dragged_card() {
        let (storage, mut engine) = redrag_during_failed_save().await;
        let one = CardId::from("1");

        let result = engine.on_drag_end(&one, Some(&column("c")));
        assert!(matches!(result, Err(BoardError::MovedDuringDrag(_))));

        assert_eq!(shape(&storage.board()), shape(&engine.snapshot()));
        assert_eq!(
            shape(&engine.snapshot()),
            expect(&[("a", &["1"]), ("b", &[]), ("c", &[])])
        );
        assert!(storage.intents().is_empty());
        assert!(engine.active_card().is_none());
    }

    #[test]
    fn test_new_outside_runtime_is_an_error() {
        let board = layout(&[("a", &["1"]), ("b", &[])]);
        let storage = Arc::new(MemoryStorage::new(board.clone()));

        let result = BoardEngine::new(board, storage, &EngineConfig::default());
        assert!(matches!(result, Err(BoardError::NoRuntime(_))));
    }

    #[test]
    fn test_drop_outside_runtime_persists_on_engine_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let board = layout(&[("a", &["1"]), ("b", &[])]);
        let storage = Arc::new(MemoryStorage::new(board.clone()));
        let mut engine = {
            let _guard = runtime.enter();
            BoardEngine::new(board, storage.clone(), &EngineConfig::default()).unwrap()
        };
        let active = CardId::from("1");

        engine.on_drag_start(&active).unwrap();
        let handle = engine.on_drag_end(&active, Some(&column("b"))).unwrap().unwrap();

        let outcome = runtime.block_on(handle).unwrap().unwrap();
        assert_eq!(outcome, ReconcileOutcome::Confirmed);
        assert_eq!(shape(&storage.board()), shape(&engine.snapshot()));
    }

    const CARDS: [&str; 6] = ["1", "2", "3", "4", "5", "6"];
    const COLUMNS: [&str; 4] = ["a", "b", "c", "d"];

    #[derive(Debug, Clone)]
    enum Release {
        Cancel,
        Outside,
        OnColumn(usize),
        OnCard(usize),
    }

    #[derive(Debug, Clone)]
    struct Gesture {
        active: usize,
        hovers: Vec<DroppableId>,
        release: Release,
    }

    fn droppable_strategy() -> impl Strategy<Value = DroppableId> {
        prop_oneof![
            (0..CARDS.len()).prop_map(|i| card(CARDS[i])),
            (0..COLUMNS.len()).prop_map(|i| column(COLUMNS[i])),
        ]
    }

    fn release_strategy() -> impl Strategy<Value = Release> {
        prop_oneof![
            Just(Release::Cancel),
            Just(Release::Outside),
            (0..COLUMNS.len()).prop_map(Release::OnColumn),
            (0..CARDS.len()).prop_map(Release::OnCard),
        ]
    }

    fn gesture_strategy() -> impl Strategy<Value = Gesture> {
        (
            0..CARDS.len(),
            prop::collection::vec(droppable_strategy(), 0..4),
            release_strategy(),
        )
            .prop_map(|(active, hovers, release)| Gesture {
                active,
                hovers,
                release,
            })
    }

    proptest! {
        #[test]
        fn test_gesture_sequences_keep_every_card_once(
            gestures in prop::collection::vec(gesture_strategy(), 1..40)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let board = layout(&[
                    ("a", &["1", "2", "3"]),
                    ("b", &["4", "5"]),
                    ("c", &[]),
                    ("d", &["6"]),
                ]);
                let (storage, mut engine) = engine(board.clone());

                for gesture in gestures {
                    let active = CardId::from(CARDS[gesture.active]);
                    engine.on_drag_start(&active).unwrap();

                    for over in &gesture.hovers {
                        engine.on_drag_over(&active, Some(over)).unwrap();
                        prop_assert!(engine.snapshot().ensure_same_cards(&board).is_ok());
                    }

                    let handle = match gesture.release {
                        Release::Cancel => {
                            engine.on_drag_cancel().unwrap();
                            None
                        }
                        Release::Outside => engine.on_drag_end(&active, None).unwrap(),
                        Release::OnColumn(i) => {
                            engine.on_drag_end(&active, Some(&column(COLUMNS[i]))).unwrap()
                        }
                        Release::OnCard(i) => {
                            engine.on_drag_end(&active, Some(&card(CARDS[i]))).unwrap()
                        }
                    };
                    if let Some(handle) = handle {
                        handle.await.unwrap().unwrap();
                    }

                    let snapshot = engine.snapshot();
                    prop_assert!(snapshot.ensure_same_cards(&board).is_ok());
                    prop_assert_eq!(shape(&storage.board()), shape(&snapshot));
                }
                Ok(())
            })?;
        }
    }
}
