//! Puzzle store: one insert per mined puzzle.

use sqlx::PgPool;
use tactics::{Move, Puzzle};
use tracing::debug;

use crate::error::WorkerError;
use crate::job::GameJob;

const INSERT_PUZZLE: &str = r#"INSERT INTO Puzzles (
    CreatedDate,
    LastModifiedDate,
    Position,
    SetupMovedFrom,
    SetupMovedTo,
    SetupPiecePromotedTo,
    MovedFrom,
    MovedTo,
    PiecePromotedTo,
    IncorrectMovedFrom,
    IncorrectMovedTo,
    IncorrectPiecePromotedTo,
    Site,
    GameDate,
    GameUrl,
    AssociatedPlayerId,
    BlackPlayerName,
    WhitePlayerName
) VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"#;

#[derive(Clone)]
pub struct PuzzleStore {
    pool: PgPool,
}

impl PuzzleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_puzzle(&self, job: &GameJob, puzzle: &Puzzle) -> Result<(), WorkerError> {
        let now = chrono::Utc::now();

        sqlx::query(INSERT_PUZZLE)
            .bind(now)
            .bind(&puzzle.position)
            .bind(&puzzle.setup_move.moved_from)
            .bind(&puzzle.setup_move.moved_to)
            .bind(promotion_code(&puzzle.setup_move))
            .bind(&puzzle.correct_move.moved_from)
            .bind(&puzzle.correct_move.moved_to)
            .bind(promotion_code(&puzzle.correct_move))
            .bind(&puzzle.incorrect_move.moved_from)
            .bind(&puzzle.incorrect_move.moved_to)
            .bind(promotion_code(&puzzle.incorrect_move))
            .bind(job.site_name())
            .bind(job.game_date)
            .bind(&job.game_url)
            .bind(job.associated_player_id)
            .bind(&job.black_player)
            .bind(&job.white_player)
            .execute(&self.pool)
            .await?;

        debug!(game_url = %job.game_url, "inserted puzzle");
        Ok(())
    }
}

/// Promotion column value: NULL for non-promotions, otherwise the piece's
/// small-integer code.
fn promotion_code(mv: &Move) -> Option<i16> {
    mv.promoted_to.map(|p| p.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_code_binds_null_without_promotion() {
        assert_eq!(promotion_code(&Move::parse("e2e4").unwrap()), None);
    }

    #[test]
    fn test_promotion_code_uses_piece_encoding() {
        assert_eq!(promotion_code(&Move::parse("e7e8q").unwrap()), Some(1));
        assert_eq!(promotion_code(&Move::parse("e7e8r").unwrap()), Some(2));
        assert_eq!(promotion_code(&Move::parse("e7e8b").unwrap()), Some(3));
        assert_eq!(promotion_code(&Move::parse("e7e8n").unwrap()), Some(4));
    }
}
