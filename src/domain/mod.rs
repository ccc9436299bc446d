pub mod board;
pub mod card;

pub use board::{Board, CardLocation, Column, ColumnId};
pub use card::{Card, CardFields, CardId, Priority};
