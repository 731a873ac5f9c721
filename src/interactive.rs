//! Line-oriented interactive move source.
//!
//! Used for any human side when the display is suppressed or tournament
//! mode is on. Prompts go to stderr so stdout stays reserved for the
//! result line and the tournament feed.

use std::io::{self, BufRead, Write};

use halma_core::{Board, Move};

/// Read one legal move for the side to move, re-prompting on bad input.
/// `None` on end of input (graceful termination, not an error).
pub fn read_move(board: &Board, input: &mut dyn BufRead) -> io::Result<Option<Move>> {
    let mut line = String::new();
    loop {
        eprint!("{}> ", board.to_move());
        io::stderr().flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match board.parse_move(text) {
            Ok(mv) => return Ok(Some(mv)),
            Err(err) => eprintln!("{err}"),
        }
    }
}
