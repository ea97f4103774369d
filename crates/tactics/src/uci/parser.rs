//! Line parser for the subset of engine output the analyser consumes.
//!
//! Engines emit many informational lines; anything that does not match one
//! of the shapes below is dropped by the caller.

/// Score assigned to a forced mate, in centipawns. Positive when the side to
/// move mates, negative when it is being mated.
pub const MATE_SCORE: i32 = 10_000;

/// One parsed line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    ReadyOk,
    /// A `info depth .. multipv .. score .. pv ..` search update. `score` is
    /// in centipawns with mates collapsed to `±MATE_SCORE`; `pv_move` is the
    /// first move of the principal variation.
    Info {
        depth: u32,
        multipv: u32,
        score: i32,
        pv_move: String,
    },
    /// The `Fen:` line printed in response to the `d` display command.
    Fen(String),
}

/// Parse a single line of engine output. Returns `None` for lines the
/// analyser does not care about.
pub fn parse_line(line: &str) -> Option<EngineLine> {
    let line = line.trim();

    if line == "readyok" {
        return Some(EngineLine::ReadyOk);
    }
    if let Some(fen) = line.strip_prefix("Fen:") {
        return Some(EngineLine::Fen(fen.trim().to_string()));
    }
    if line.starts_with("info ") {
        return parse_info(line);
    }

    None
}

/// An info line is only useful once it carries all of depth, multipv, a
/// score and a pv; partial lines (e.g. `info string ...`) fall out as `None`.
fn parse_info(line: &str) -> Option<EngineLine> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let mut depth = None;
    let mut multipv = None;
    let mut score = None;
    let mut pv_move = None;

    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "multipv" => {
                i += 1;
                multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                match tokens.get(i) {
                    Some(&"cp") => {
                        i += 1;
                        score = tokens.get(i).and_then(|s| s.parse().ok());
                    }
                    Some(&"mate") => {
                        i += 1;
                        score = tokens
                            .get(i)
                            .and_then(|s| s.parse::<i32>().ok())
                            .map(mate_to_cp);
                    }
                    _ => {}
                }
            }
            "pv" => {
                pv_move = tokens.get(i + 1).map(|s| s.to_string());
                break;
            }
            _ => {}
        }
        i += 1;
    }

    Some(EngineLine::Info {
        depth: depth?,
        multipv: multipv?,
        score: score?,
        pv_move: pv_move?,
    })
}

/// Collapse a mate-in-N to a decisive centipawn value. `mate 0` is reported
/// by some engines for the mating side and maps to `+MATE_SCORE`.
fn mate_to_cp(n: i32) -> i32 {
    if n < 0 {
        -MATE_SCORE
    } else {
        MATE_SCORE
    }
}
