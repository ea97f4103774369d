//! End-to-end analyser tests against a scripted engine stub.
//!
//! Each stub is a small shell script that speaks just enough UCI: it answers
//! `isready`, tracks the last `position` command's ply count, and emits a
//! fixed transcript per position on `go`/`d`. Determinism comes from the
//! transcript, so the expected puzzle set is a function of the script alone.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

use tactics::{find_puzzles, AnalysisOptions, Move, Puzzle};

const FEN_BEFORE_D2D3: &str = "r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";
const FEN_BEFORE_D7D6: &str = "r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1P3/3P1N2/PPP2PPP/RNBQK2R b KQkq - 0 4";

/// Generate a unique suffix to avoid collisions between test runs.
fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

fn write_stub_engine(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{name}-{}-{}.sh", std::process::id(), unique_suffix()));
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn options(engine_path: &PathBuf, seconds_per_move: u64) -> AnalysisOptions {
    AnalysisOptions {
        engine_path: engine_path.to_string_lossy().into_owned(),
        seconds_per_move,
        target_depth: 20,
    }
}

fn game(moves: &[&str]) -> Vec<String> {
    moves.iter().map(|m| m.to_string()).collect()
}

/// Stub for an Italian-opening game: at ply 6 the played move matches the
/// engine's choice; at ply 7 the engine prefers g8f6 while d7d6 loses 420 cp.
fn blunder_script() -> String {
    format!(
        r#"#!/bin/sh
idx=0
while IFS= read -r line; do
  case "$line" in
    isready) echo "readyok" ;;
    position*) set -- $line; [ $# -ge 3 ] && idx=$(($# - 3)) ;;
    go*)
      if [ "$idx" -eq 6 ]; then
        echo "info depth 20 seldepth 24 multipv 1 score cp 30 nodes 4242 pv d2d3 d7d6"
        echo "info depth 20 seldepth 24 multipv 2 score cp 10 nodes 4242 pv a2a3"
      else
        echo "info depth 20 seldepth 24 multipv 1 score cp 20 nodes 4242 pv g8f6 b1c3"
        echo "info depth 20 seldepth 24 multipv 2 score cp -400 nodes 4242 pv d7d6"
      fi
      ;;
    d)
      if [ "$idx" -eq 6 ]; then
        echo "Fen: {FEN_BEFORE_D2D3}"
      else
        echo "Fen: {FEN_BEFORE_D7D6}"
      fi
      ;;
    quit) exit 0 ;;
    *) ;;
  esac
done
"#
    )
}

#[tokio::test]
async fn short_game_is_skipped_without_consulting_the_engine() {
    // The opening prefix covers the whole game, so the bogus engine path is
    // never spawned.
    let opts = AnalysisOptions {
        engine_path: "/nonexistent/engine".to_string(),
        seconds_per_move: 1,
        target_depth: 20,
    };
    let moves = game(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4"]);
    let (_tx, mut rx) = watch::channel(false);

    let puzzles = find_puzzles(&opts, &moves, &mut rx).await.unwrap();
    assert!(puzzles.is_empty());
}

#[tokio::test]
async fn best_move_played_yields_no_puzzle() {
    let engine = write_stub_engine("uci-stub-best", &blunder_script());
    let opts = options(&engine, 5);
    // Seven moves: only ply 6 is analysed, and d2d3 is the engine's choice.
    let moves = game(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "d2d3"]);
    let (_tx, mut rx) = watch::channel(false);

    let puzzles = find_puzzles(&opts, &moves, &mut rx).await.unwrap();
    assert!(puzzles.is_empty());

    let _ = std::fs::remove_file(&engine);
}

#[tokio::test]
async fn clear_blunder_yields_one_puzzle_with_prior_fen() {
    let engine = write_stub_engine("uci-stub-blunder", &blunder_script());
    let opts = options(&engine, 5);
    let moves = game(&[
        "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "d2d3", "d7d6",
    ]);
    let (_tx, mut rx) = watch::channel(false);

    let puzzles = find_puzzles(&opts, &moves, &mut rx).await.unwrap();
    assert_eq!(
        puzzles,
        vec![Puzzle {
            position: FEN_BEFORE_D2D3.to_string(),
            setup_move: Move::parse("d2d3").unwrap(),
            correct_move: Move::parse("g8f6").unwrap(),
            incorrect_move: Move::parse("d7d6").unwrap(),
        }]
    );

    let _ = std::fs::remove_file(&engine);
}

#[tokio::test]
async fn cancellation_mid_game_returns_promptly_with_nothing() {
    // This stub never reports any search output, so every ply would wait
    // out the full per-move budget.
    let engine = write_stub_engine(
        "uci-stub-silent",
        r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    isready) echo "readyok" ;;
    quit) exit 0 ;;
    *) ;;
  esac
done
"#,
    );
    let opts = options(&engine, 30);
    let moves = game(&[
        "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "d2d3", "d7d6",
    ]);
    let (tx, mut rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = tx.send(true);
    });

    let started = Instant::now();
    let puzzles = find_puzzles(&opts, &moves, &mut rx).await.unwrap();
    assert!(puzzles.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cancellation took {:?}",
        started.elapsed()
    );

    let _ = std::fs::remove_file(&engine);
}
