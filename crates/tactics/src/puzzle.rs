use crate::moves::Move;

/// A one-move tactics puzzle mined from a game.
///
/// `position` is the FEN of the board before `setup_move`; applying
/// `setup_move` reaches the position where `correct_move` is the engine's
/// choice and `incorrect_move` is what was actually played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    pub position: String,
    pub setup_move: Move,
    pub correct_move: Move,
    pub incorrect_move: Move,
}
