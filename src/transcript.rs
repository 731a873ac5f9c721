//! Append-only game transcript.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use halma_core::Player;

/// One line per applied move: `{turn}. white:{movetext}` for the first
/// mover, `{turn}. ... black:{movetext}` for the second, where the turn
/// number is one plus half the zero-based ply count.
#[derive(Debug)]
pub struct Transcript {
    file: File,
}

impl Transcript {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to open transcript file {}", path.display()))?;
        Ok(Self { file })
    }

    /// Append the entry for a move about to be applied at `ply`.
    pub fn record(&mut self, ply: u32, mover: Player, movetext: &str) -> io::Result<()> {
        let turn = ply / 2 + 1;
        match mover {
            Player::White => writeln!(self.file, "{turn}. {mover}:{movetext}")?,
            Player::Black => writeln!(self.file, "{turn}. ... {mover}:{movetext}")?,
        }
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record_game(path: &Path, moves: &[(u32, Player, &str)]) {
        let mut transcript = Transcript::create(path).unwrap();
        for (ply, mover, movetext) in moves {
            transcript.record(*ply, *mover, movetext).unwrap();
        }
    }

    #[test]
    fn test_turn_numbering_and_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.txt");
        record_game(
            &path,
            &[
                (0, Player::White, "c3-d4"),
                (1, Player::Black, "f6-e5"),
                (2, Player::White, "d4-f6"),
                (3, Player::Black, "e5-d4"),
            ],
        );
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "1. white:c3-d4\n1. ... black:f6-e5\n2. white:d4-f6\n2. ... black:e5-d4\n"
        );
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let moves = [(0, Player::White, "c3-d4"), (1, Player::Black, "f6-e5")];
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        record_game(&first, &moves);
        record_game(&second, &moves);
        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }
}
