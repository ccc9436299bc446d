//! # Hlavi Board
//!
//! Drag-and-drop engine for Hlavi kanban boards.
//!
//! Given the start, hover, drop and cancel events of a drag gesture, this
//! crate computes the resulting column and card order, decides whether a
//! drop landed on a column or on a card inside it, and reconciles each
//! finished move with a storage backend, rolling back when the backend
//! refuses. Rendering and gesture detection are left to the caller.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use config::{EngineConfig, HoverMode};
pub use domain::{
    board::{Board, CardLocation, Column, ColumnId},
    card::{Card, CardFields, CardId, Priority},
};
pub use engine::{BoardEngine, BoardObserver, BoardStore, DroppableId, MoveIntent};
pub use error::{BoardError, Result};
pub use storage::Storage;
