//! Engine-side protocol handler.
//!
//! Runs inside the engine child process (the hidden `engine` subcommand)
//! against its own board mirror. The controller's shutdown propagates here
//! as EOF on stdin, which ends the loop cleanly.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use halma_core::{best_move, Board, SearchOptions};

use crate::ipc::{Notification, ACK};

/// Entry point for the `engine` subcommand: ignore the wake signal, then
/// serve the protocol over stdin/stdout.
pub fn run(opts: &SearchOptions) -> Result<()> {
    // The supervisor already set this up via pre_exec; re-assert it so an
    // engine launched by hand is just as immune to stray wakes.
    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(Board::new(), opts, &mut stdin.lock(), &mut stdout.lock())
}

/// The protocol loop, over any line source/sink so tests can script it.
///
/// Per line: EOF exits cleanly; blank lines are skipped; a notify is
/// applied to the mirror when well-formed and acknowledged
/// unconditionally, so the controller never stalls waiting for an ack; a
/// request is answered with exactly one canonical movetext line, which is
/// also applied to the mirror; anything else is ignored.
pub fn serve(
    mut board: Board,
    opts: &SearchOptions,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        // A failed read and EOF are the same thing here: the controller is
        // gone, and exiting is the normal shutdown path.
        let n = match input.read_line(&mut line) {
            Ok(n) => n,
            Err(err) => {
                tracing::debug!("read from controller failed: {err}");
                return Ok(());
            }
        };
        if n == 0 {
            tracing::debug!("controller closed the pipe, exiting");
            return Ok(());
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.starts_with('>') {
            match Notification::parse(text) {
                Some(note) => match board.parse_move(&note.movetext) {
                    Ok(mv) => {
                        if let Err(err) = board.apply(&mv) {
                            tracing::warn!(movetext = %note.movetext, "forwarded move did not apply: {err}");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(movetext = %note.movetext, "ignoring unplayable forwarded move: {err}");
                    }
                },
                None => tracing::warn!(line = %text, "malformed notify line"),
            }
            writeln!(output, "{ACK}")
                .and_then(|()| output.flush())
                .context("engine: ack write failed")?;
        } else if text.starts_with('<') {
            let Some(mv) = best_move(&board, opts) else {
                // A correct controller never requests from a finished game;
                // exiting surfaces the defect on its side as an EOF.
                bail!("asked to move but no legal move exists");
            };
            writeln!(output, "{mv}")
                .and_then(|()| output.flush())
                .context("engine: move write failed")?;
            if let Err(err) = board.apply(&mv) {
                bail!("search produced an unplayable move {mv}: {err}");
            }
        } else {
            tracing::debug!(line = %text, "ignoring unknown control line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn opts() -> SearchOptions {
        SearchOptions {
            depth: 1,
            ..SearchOptions::default()
        }
    }

    fn run_serve(script: &str) -> Vec<String> {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        serve(Board::new(), &opts(), &mut input, &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_eof_exits_cleanly_with_no_output() {
        assert_eq!(run_serve(""), Vec::<String>::new());
    }

    #[test]
    fn test_notify_is_applied_and_acked() {
        let lines = run_serve(">white:c3-d4\n");
        assert_eq!(lines, vec!["ok"]);
    }

    #[test]
    fn test_request_after_notify_yields_legal_reply() {
        let lines = run_serve(">white:c3-d4\n<\n");
        assert_eq!(lines[0], "ok");
        assert_eq!(lines.len(), 2);
        // The reply must be legal for black in the post-notify position.
        let mut board = Board::new();
        board.apply(&board.parse_move("c3-d4").unwrap()).unwrap();
        board.parse_move(&lines[1]).unwrap();
    }

    #[test]
    fn test_malformed_notify_still_acked() {
        let lines = run_serve(">white:zzzz\n>white\n");
        // Second line has no colon, so it is malformed too - both acked.
        assert_eq!(lines, vec!["ok", "ok"]);
    }

    #[test]
    fn test_blank_and_unknown_lines_ignored() {
        let lines = run_serve("\n\nhello there\nstatus?\n");
        assert_eq!(lines, Vec::<String>::new());
    }

    #[test]
    fn test_request_from_start_position() {
        let lines = run_serve("<\n");
        assert_eq!(lines.len(), 1);
        Board::new().parse_move(&lines[0]).unwrap();
    }

    #[test]
    fn test_mirror_tracks_both_sides() {
        // Engine answers for white, is told black's reply, answers again.
        let mut input = Cursor::new(b"<\n".to_vec());
        let mut output = Vec::new();
        serve(Board::new(), &opts(), &mut input, &mut output).unwrap();
        let first = String::from_utf8(output).unwrap();
        let first = first.trim();

        let mut board = Board::new();
        board.apply(&board.parse_move(first).unwrap()).unwrap();
        let black_reply = board.legal_moves().into_iter().next().unwrap();

        let script = format!("<\n>black:{black_reply}\n<\n");
        let lines = run_serve(&script);
        assert_eq!(lines[0], first, "same options, same opening move");
        assert_eq!(lines[1], "ok");
        // Third line: a legal white move after the black reply.
        board.apply(&black_reply).unwrap();
        board.parse_move(&lines[2]).unwrap();
    }
}
