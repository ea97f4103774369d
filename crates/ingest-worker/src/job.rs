//! Game job decoding from the ingestion queue payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One game to mine for puzzles, immutable after decoding. Unknown payload
/// keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GameJob {
    #[serde(rename = "GameUrl")]
    pub game_url: String,

    /// 0 = lichess.org, 1 = chess.com.
    #[serde(rename = "Site")]
    pub site: i32,

    #[serde(rename = "GameDate")]
    pub game_date: DateTime<Utc>,

    /// Ordered half-moves in UCI coordinate form, from the initial position.
    #[serde(rename = "UCIMoves")]
    pub uci_moves: Vec<String>,

    /// Opaque key of the player the puzzles are mined for.
    #[serde(rename = "AssociatedPlayerId")]
    pub associated_player_id: i64,

    #[serde(rename = "WhitePlayer")]
    pub white_player: String,

    #[serde(rename = "BlackPlayer")]
    pub black_player: String,
}

impl GameJob {
    /// Display name of the hosting site; unknown codes persist as NULL.
    pub fn site_name(&self) -> Option<&'static str> {
        match self.site {
            0 => Some("lichess.org"),
            1 => Some("chess.com"),
            _ => None,
        }
    }
}
