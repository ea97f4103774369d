use std::fmt;

use thiserror::Error;

use crate::piece::ChessPiece;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid UCI move {uci:?}: {reason}")]
pub struct InvalidMove {
    pub uci: String,
    reason: &'static str,
}

impl InvalidMove {
    fn new(uci: &str, reason: &'static str) -> Self {
        Self {
            uci: uci.to_string(),
            reason,
        }
    }
}

/// A single unambiguous chess move: source square, destination square, and
/// the piece promoted to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub moved_from: String,
    pub moved_to: String,
    /// `None` when and only when the source string had length 4. Promotions
    /// are recorded as the white piece variant; color is attached by higher
    /// layers where needed.
    pub promoted_to: Option<ChessPiece>,
}

impl Move {
    /// Parse a UCI coordinate move (`e2e4`, `e7e8q`).
    pub fn parse(uci: &str) -> Result<Self, InvalidMove> {
        let b = uci.as_bytes();
        if b.len() != 4 && b.len() != 5 {
            return Err(InvalidMove::new(uci, "expected 4 or 5 characters"));
        }
        if !is_square(&b[0..2]) || !is_square(&b[2..4]) {
            return Err(InvalidMove::new(uci, "malformed square"));
        }

        let promoted_to = match b.len() {
            5 => match b[4].to_ascii_lowercase() {
                b'q' => Some(ChessPiece::WhiteQueen),
                b'r' => Some(ChessPiece::WhiteRook),
                b'b' => Some(ChessPiece::WhiteBishop),
                b'n' => Some(ChessPiece::WhiteKnight),
                _ => return Err(InvalidMove::new(uci, "unknown promotion piece")),
            },
            _ => None,
        };

        // The squares validated as ASCII, so character slicing is safe.
        Ok(Self {
            moved_from: uci[0..2].to_string(),
            moved_to: uci[2..4].to_string(),
            promoted_to,
        })
    }
}

fn is_square(b: &[u8]) -> bool {
    b.len() == 2 && (b'a'..=b'h').contains(&b[0]) && (b'1'..=b'8').contains(&b[1])
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.moved_from, self.moved_to)?;
        match self.promoted_to {
            Some(ChessPiece::WhiteQueen) => f.write_str("q"),
            Some(ChessPiece::WhiteRook) => f.write_str("r"),
            Some(ChessPiece::WhiteBishop) => f.write_str("b"),
            Some(ChessPiece::WhiteKnight) => f.write_str("n"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_move_has_no_promotion() {
        let mv = Move::parse("e2e4").unwrap();
        assert_eq!(mv.moved_from, "e2");
        assert_eq!(mv.moved_to, "e4");
        assert_eq!(mv.promoted_to, None);
    }

    #[test]
    fn test_parse_promotions() {
        assert_eq!(
            Move::parse("e7e8q").unwrap().promoted_to,
            Some(ChessPiece::WhiteQueen)
        );
        assert_eq!(
            Move::parse("a2a1R").unwrap().promoted_to,
            Some(ChessPiece::WhiteRook)
        );
        assert_eq!(
            Move::parse("h7h8b").unwrap().promoted_to,
            Some(ChessPiece::WhiteBishop)
        );
        assert_eq!(
            Move::parse("b2b1N").unwrap().promoted_to,
            Some(ChessPiece::WhiteKnight)
        );
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert!(Move::parse("").is_err());
        assert!(Move::parse("e2e").is_err());
        assert!(Move::parse("e2e4e5").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_squares() {
        assert!(Move::parse("i2e4").is_err());
        assert!(Move::parse("e9e4").is_err());
        assert!(Move::parse("e2x4").is_err());
        assert!(Move::parse("22e4").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_promotion_letter() {
        assert!(Move::parse("e7e8k").is_err());
        assert!(Move::parse("e7e8p").is_err());
        assert!(Move::parse("e7e8x").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        assert_eq!(Move::parse("e2e4").unwrap().to_string(), "e2e4");
        assert_eq!(Move::parse("e7e8Q").unwrap().to_string(), "e7e8q");
    }
}
