//! Drag-and-drop engine: locating drop targets, computing moves, tracking the
//! drag session and reconciling finished moves with storage.

pub mod board_engine;
pub mod locator;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod store;

pub use board_engine::BoardEngine;
pub use locator::{
    card_moved, locate_card, locate_drop_target, locate_raw_target, DropTarget, DroppableId,
};
pub use reconcile::{CommittedMove, MoveIntent, ReconcileOutcome, Reconciler};
pub use resolver::{resolve, MoveMode};
pub use session::DragController;
pub use store::{BoardObserver, BoardStore};
