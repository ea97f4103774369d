//! Tactical puzzle extraction from completed chess games.
//!
//! A game arrives as a list of UCI coordinate moves. [`find_puzzles`] replays
//! it position by position against a UCI engine child process and emits a
//! [`Puzzle`] wherever the player on move blundered in a still-playable
//! position.

pub mod analyzer;
pub mod moves;
pub mod piece;
pub mod puzzle;
pub mod uci;

pub use analyzer::{find_puzzles, AnalysisOptions};
pub use moves::{InvalidMove, Move};
pub use piece::ChessPiece;
pub use puzzle::Puzzle;
pub use uci::EngineError;
