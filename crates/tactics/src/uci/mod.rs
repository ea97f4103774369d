//! UCI engine session: child process, handshake, and the reader task.
//!
//! One session drives one engine child for the lifetime of one game. The
//! session splits into two threads of control: the *reader* task, sole
//! writer of [`AnalysisState`], and the *driver* (the analyser), which only
//! reads a snapshot after the stop/display settle. They meet at the
//! depth-quorum channel, a bounded non-blocking handoff tagged with the
//! current position id so late notifications from an abandoned search can
//! never unblock the next position's wait.

pub mod parser;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use parser::{parse_line, EngineLine};

pub use parser::MATE_SCORE;

/// Bounded capacity of the depth-quorum channel. Overflow drops the
/// notification; only the most recent position's token matters.
const QUORUM_CHANNEL_CAPACITY: usize = 10;

/// How long a child gets to exit after `quit` before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(std::io::Error),
    #[error("engine child is missing its {0} pipe")]
    MissingPipe(&'static str),
    #[error("failed to write to engine: {0}")]
    Write(std::io::Error),
    #[error("engine session is closed")]
    Closed,
    #[error("engine did not report ready in time")]
    ReadyTimeout,
}

/// Per-position analysis state, written only by the reader task.
#[derive(Debug, Default)]
struct AnalysisState {
    ready: bool,
    position_id: u64,
    pv_move: String,
    pv1_score: i32,
    pv1_depth: u32,
    pv2_score: i32,
    pv2_depth: u32,
    fen: String,
    previous_fen: String,
}

/// The driver's read-only view of the state, taken after the stop/display
/// handshake and settle sleep.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub pv_move: String,
    pub pv1_score: i32,
    pub pv2_score: i32,
    pub fen: String,
    pub previous_fen: String,
}

pub struct UciSession {
    child: Child,
    stdin: Option<ChildStdin>,
    state: Arc<Mutex<AnalysisState>>,
    quorum_rx: mpsc::Receiver<u64>,
    ready_notify: Arc<Notify>,
    reader: JoinHandle<()>,
    next_position_id: u64,
}

impl UciSession {
    /// Spawn the engine executable and issue the UCI handshake. The reader
    /// task starts consuming stdout immediately; call [`await_ready`] before
    /// the first position.
    ///
    /// [`await_ready`]: UciSession::await_ready
    pub async fn spawn(engine_path: &str, target_depth: u32) -> Result<Self, EngineError> {
        let mut child = Command::new(engine_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdin = child.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(EngineError::MissingPipe("stdout"))?;

        let state = Arc::new(Mutex::new(AnalysisState::default()));
        let ready_notify = Arc::new(Notify::new());
        let (quorum_tx, quorum_rx) = mpsc::channel(QUORUM_CHANNEL_CAPACITY);

        let reader = tokio::spawn(read_engine_output(
            BufReader::new(stdout),
            Arc::clone(&state),
            Arc::clone(&ready_notify),
            quorum_tx,
            target_depth,
        ));

        let mut session = Self {
            child,
            stdin: Some(stdin),
            state,
            quorum_rx,
            ready_notify,
            reader,
            next_position_id: 0,
        };

        session.send("uci").await?;
        session.send("ucinewgame").await?;
        session.send("isready").await?;
        session.send("setoption name UCI_AnalyseMode value true").await?;
        session.send("setoption name MultiPV value 2").await?;

        Ok(session)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "engine <");
        let stdin = self.stdin.as_mut().ok_or(EngineError::Closed)?;
        stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(EngineError::Write)?;
        stdin.flush().await.map_err(EngineError::Write)
    }

    /// Wait for the handshake's `readyok`.
    pub async fn await_ready(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state.lock().await.ready {
                return Ok(());
            }
            tokio::time::timeout_at(deadline, self.ready_notify.notified())
                .await
                .map_err(|_| EngineError::ReadyTimeout)?;
        }
    }

    /// Open a new per-position round: allocate a fresh position id, reset
    /// the depth counters, and drain notifications left over from the
    /// previous search.
    pub async fn begin_position(&mut self) -> u64 {
        self.next_position_id += 1;
        let id = self.next_position_id;

        let mut state = self.state.lock().await;
        state.position_id = id;
        state.pv1_depth = 0;
        state.pv2_depth = 0;
        drop(state);

        while self.quorum_rx.try_recv().is_ok() {}
        id
    }

    /// Send `position startpos moves ...` for the given move prefix.
    pub async fn set_position(&mut self, moves: &[String]) -> Result<(), EngineError> {
        let mut cmd = String::from("position startpos");
        if !moves.is_empty() {
            cmd.push_str(" moves");
            for mv in moves {
                cmd.push(' ');
                cmd.push_str(mv);
            }
        }
        self.send(&cmd).await
    }

    pub async fn go_infinite(&mut self) -> Result<(), EngineError> {
        self.send("go infinite").await
    }

    pub async fn stop(&mut self) -> Result<(), EngineError> {
        self.send("stop").await
    }

    /// Ask the engine to print its current position; the resulting `Fen:`
    /// line is absorbed into the state by the reader.
    pub async fn request_display(&mut self) -> Result<(), EngineError> {
        self.send("d").await
    }

    /// Block until the depth quorum for `position_id` is reported or the
    /// deadline passes. Tokens from earlier positions are discarded.
    pub async fn wait_for_depth_quorum(&mut self, position_id: u64, deadline: Instant) -> bool {
        loop {
            match tokio::time::timeout_at(deadline, self.quorum_rx.recv()).await {
                Err(_) => return false,
                Ok(None) => return false,
                Ok(Some(id)) if id == position_id => return true,
                Ok(Some(stale)) => {
                    debug!(stale, current = position_id, "discarding stale quorum token");
                }
            }
        }
    }

    pub async fn snapshot(&self) -> PositionSnapshot {
        let state = self.state.lock().await;
        PositionSnapshot {
            pv_move: state.pv_move.clone(),
            pv1_score: state.pv1_score,
            pv2_score: state.pv2_score,
            fen: state.fen.clone(),
            previous_fen: state.previous_fen.clone(),
        }
    }

    /// Orderly shutdown: `quit`, close stdin, wait for the reader to see
    /// EOF, then give the child a grace window before killing it.
    pub async fn close(mut self) {
        let _ = self.send("quit").await;
        drop(self.stdin.take());
        let _ = (&mut self.reader).await;
        if tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait())
            .await
            .is_err()
        {
            warn!("engine did not exit after quit, killing");
            let _ = self.child.kill().await;
        }
    }
}

impl Drop for UciSession {
    fn drop(&mut self) {
        // Best-effort kill if the session was dropped without close().
        let _ = self.child.start_kill();
    }
}

/// Reader task: consume engine stdout line by line until EOF and fold the
/// parsed lines into the shared state.
async fn read_engine_output(
    mut stdout: BufReader<tokio::process::ChildStdout>,
    state: Arc<Mutex<AnalysisState>>,
    ready_notify: Arc<Notify>,
    quorum_tx: mpsc::Sender<u64>,
    target_depth: u32,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match stdout.read_line(&mut line).await {
            Ok(0) => {
                debug!("engine stdout closed");
                return;
            }
            Ok(_) => {
                let trimmed = line.trim();
                debug!(line = trimmed, "engine >");
                let Some(parsed) = parse_line(trimmed) else {
                    continue;
                };
                apply_line(parsed, &state, &ready_notify, &quorum_tx, target_depth).await;
            }
            Err(e) => {
                warn!(error = %e, "error reading engine stdout");
                return;
            }
        }
    }
}

async fn apply_line(
    parsed: EngineLine,
    state: &Mutex<AnalysisState>,
    ready_notify: &Notify,
    quorum_tx: &mpsc::Sender<u64>,
    target_depth: u32,
) {
    match parsed {
        EngineLine::ReadyOk => {
            state.lock().await.ready = true;
            ready_notify.notify_one();
        }
        EngineLine::Info {
            depth,
            multipv,
            score,
            pv_move,
        } => {
            let mut state = state.lock().await;
            match multipv {
                1 => {
                    state.pv1_score = score;
                    state.pv1_depth = depth;
                    state.pv_move = pv_move;
                }
                2 => {
                    state.pv2_score = score;
                    state.pv2_depth = depth;
                }
                _ => return,
            }
            if state.pv1_depth >= target_depth && state.pv2_depth >= target_depth {
                // Non-blocking publish; a full channel just drops this token.
                let _ = quorum_tx.try_send(state.position_id);
            }
        }
        EngineLine::Fen(fen) => {
            let mut state = state.lock().await;
            state.previous_fen = std::mem::replace(&mut state.fen, fen);
        }
    }
}
