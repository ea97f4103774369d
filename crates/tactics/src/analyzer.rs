//! Game analysis: replay a game ply by ply through a UCI session and mine
//! one-move puzzles from decisive blunders.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::moves::Move;
use crate::puzzle::Puzzle;
use crate::uci::{EngineError, PositionSnapshot, UciSession};

/// Plies skipped at the start of every game. Opening moves rarely yield
/// instructive tactics and analysing transpositions is wasted engine time.
pub const OPENING_PLIES_SKIPPED: usize = 6;

/// The second-best move must be at least this much worse than the best for
/// the played deviation to count as a blunder.
pub const BLUNDER_MARGIN_CP: i32 = 300;

/// Positions where both top lines exceed this magnitude are already decided
/// and make for uninstructive puzzles.
pub const DECIDED_POSITION_CP: i32 = 600;

/// Pause after `stop`/`d` so the engine's `Fen:` line reaches the state
/// before the snapshot is taken.
const SETTLE_INTERVAL: Duration = Duration::from_millis(100);

const READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Path to the UCI engine executable.
    pub engine_path: String,
    /// Upper bound on per-ply search time, in seconds.
    pub seconds_per_move: u64,
    /// Both principal variations must reach this depth before a ply's
    /// search is considered finished early.
    pub target_depth: u32,
}

/// Analyse one game and return the puzzles found in it.
///
/// Spawns one engine child for the duration of the game. Cancellation (the
/// watch flag flipping to `true`) aborts the ply loop without awaiting the
/// in-flight search, shuts the session down, and returns what was collected
/// up to that point.
pub async fn find_puzzles(
    options: &AnalysisOptions,
    moves: &[String],
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Vec<Puzzle>, EngineError> {
    if moves.len() <= OPENING_PLIES_SKIPPED {
        debug!(move_count = moves.len(), "game too short to analyze");
        return Ok(Vec::new());
    }

    info!(move_count = moves.len(), "analyzing game");
    let mut session = UciSession::spawn(&options.engine_path, options.target_depth).await?;
    let outcome = analyze_moves(&mut session, options, moves, shutdown).await;
    session.close().await;
    outcome
}

async fn analyze_moves(
    session: &mut UciSession,
    options: &AnalysisOptions,
    moves: &[String],
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Vec<Puzzle>, EngineError> {
    session.await_ready(READY_TIMEOUT).await?;

    let mut puzzles = Vec::new();
    for index in OPENING_PLIES_SKIPPED..moves.len() {
        if *shutdown.borrow() {
            debug!(index, "analysis cancelled");
            break;
        }
        if let Some(puzzle) = analyze_position(session, options, moves, index, shutdown).await? {
            info!(
                index,
                correct = %puzzle.correct_move,
                incorrect = %puzzle.incorrect_move,
                "found puzzle"
            );
            puzzles.push(puzzle);
        }
    }
    Ok(puzzles)
}

/// Drive one ply of analysis: set the position before `moves[index]`, search
/// until the depth quorum or the per-move budget, then decide whether the
/// played move was a puzzle-worthy blunder.
async fn analyze_position(
    session: &mut UciSession,
    options: &AnalysisOptions,
    moves: &[String],
    index: usize,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<Puzzle>, EngineError> {
    let position_id = session.begin_position().await;
    session.set_position(&moves[..index]).await?;
    session.go_infinite().await?;

    let deadline = Instant::now() + Duration::from_secs(options.seconds_per_move);
    let reached = tokio::select! {
        reached = session.wait_for_depth_quorum(position_id, deadline) => reached,
        _ = shutdown.changed() => return Ok(None),
    };
    if !reached {
        debug!(index, "target depth not reached within per-move budget");
    }

    session.stop().await?;
    session.request_display().await?;
    tokio::select! {
        _ = tokio::time::sleep(SETTLE_INTERVAL) => {}
        _ = shutdown.changed() => return Ok(None),
    }

    let snapshot = session.snapshot().await;
    Ok(puzzle_from_snapshot(&snapshot, moves, index))
}

/// The blunder predicate plus puzzle assembly. `index` is the ply of the
/// played move; the snapshot describes the position before it.
fn puzzle_from_snapshot(
    snapshot: &PositionSnapshot,
    moves: &[String],
    index: usize,
) -> Option<Puzzle> {
    let played = moves[index].as_str();
    if !is_blunder(played, snapshot) {
        return None;
    }
    // The first analysed ply has no prior Fen capture; a puzzle without a
    // position is useless.
    if snapshot.previous_fen.is_empty() {
        return None;
    }

    let parsed = (
        Move::parse(&moves[index - 1]),
        Move::parse(&snapshot.pv_move),
        Move::parse(played),
    );
    match parsed {
        // Distinct UCI strings can still denote the same move (promotion
        // letters are case-insensitive), so compare the parsed forms too.
        (Ok(_), Ok(correct_move), Ok(incorrect_move)) if correct_move == incorrect_move => None,
        (Ok(setup_move), Ok(correct_move), Ok(incorrect_move)) => Some(Puzzle {
            position: snapshot.previous_fen.clone(),
            setup_move,
            correct_move,
            incorrect_move,
        }),
        _ => {
            warn!(index, pv = %snapshot.pv_move, "skipping puzzle with malformed move");
            None
        }
    }
}

/// A played move is a blunder worth a puzzle when the engine preferred a
/// different move, the second-best line is materially worse than the best,
/// and the position was not already decided either way.
fn is_blunder(played: &str, snapshot: &PositionSnapshot) -> bool {
    !snapshot.pv_move.is_empty()
        && played != snapshot.pv_move
        && (snapshot.pv1_score - snapshot.pv2_score).abs() >= BLUNDER_MARGIN_CP
        && snapshot.pv1_score.abs().min(snapshot.pv2_score.abs()) <= DECIDED_POSITION_CP
}
