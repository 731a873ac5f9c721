//! Negamax alpha-beta search with iterative deepening.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;

use crate::board::{Board, Move, Player, Square, BOARD_SIZE};

/// Score representing an unreachable upper/lower bound.
pub const INF: i32 = 30_000;

/// Base score for a won position (adjusted by ply so faster wins rank
/// higher).
pub const WIN_SCORE: i32 = 29_000;

/// Knobs for one search invocation.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum iterative-deepening depth.
    pub depth: u8,
    /// Shuffle root moves so near-equal candidates vary between games.
    pub randomize: bool,
    /// Log per-depth statistics.
    pub verbose: bool,
    /// Soft time budget; deepening stops once it is spent.
    pub time_budget: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            depth: 3,
            randomize: false,
            verbose: false,
            time_budget: None,
        }
    }
}

/// Pick a move for the side to move.
///
/// Deepens from 1 to `opts.depth`, keeping the best move of the deepest
/// completed iteration, so even a truncated search never comes back empty
/// while a legal move exists. Returns `None` only when the position has no
/// legal move at all.
pub fn best_move(board: &Board, opts: &SearchOptions) -> Option<Move> {
    let start = Instant::now();
    let mut best: Option<Move> = None;
    for depth in 1..=opts.depth.max(1) {
        if best.is_some() {
            if let Some(budget) = opts.time_budget {
                if start.elapsed() >= budget {
                    break;
                }
            }
        }
        let mut nodes = 0u64;
        let moves = ordered_moves(board, opts.randomize);
        if moves.is_empty() {
            return None;
        }
        let mut alpha = -INF;
        let mut depth_best: Option<Move> = None;
        for mv in moves {
            let child = board.make_move(&mv);
            let score = -negamax(&child, depth - 1, 1, -INF, -alpha, &mut nodes);
            if score > alpha || depth_best.is_none() {
                alpha = score;
                depth_best = Some(mv);
            }
        }
        if opts.verbose {
            tracing::info!(
                depth,
                score = alpha,
                nodes,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "search depth complete"
            );
        }
        if depth_best.is_some() {
            best = depth_best;
        }
    }
    best
}

fn negamax(board: &Board, depth: u8, ply: u8, mut alpha: i32, beta: i32, nodes: &mut u64) -> i32 {
    *nodes += 1;

    if let Some(winner) = board.winner() {
        let score = WIN_SCORE - ply as i32;
        return if winner == board.to_move() {
            score
        } else {
            -score
        };
    }

    if depth == 0 {
        return evaluate(board);
    }

    let moves = ordered_moves(board, false);
    if moves.is_empty() {
        return evaluate(board);
    }

    let mut best_score = -INF;
    for mv in &moves {
        let child = board.make_move(mv);
        let score = -negamax(&child, depth - 1, ply + 1, -beta, -alpha, nodes);

        if score > best_score {
            best_score = score;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            break;
        }
    }

    best_score
}

/// Static evaluation from the side to move's perspective: the signed
/// difference of total camp distances.
fn evaluate(board: &Board) -> i32 {
    let me = board.to_move();
    distance_sum(board, me.opponent()) - distance_sum(board, me)
}

fn distance_sum(board: &Board, player: Player) -> i32 {
    let (tf, tr) = target_corner(player);
    let mut sum = 0;
    for rank in 0..BOARD_SIZE {
        for file in 0..BOARD_SIZE {
            let Some(sq) = Square::new(file, rank) else {
                continue;
            };
            if board.piece_at(sq) == Some(player) {
                let df = (file as i32 - tf).abs();
                let dr = (rank as i32 - tr).abs();
                sum += df.max(dr);
            }
        }
    }
    sum
}

fn target_corner(player: Player) -> (i32, i32) {
    match player {
        Player::White => ((BOARD_SIZE - 1) as i32, (BOARD_SIZE - 1) as i32),
        Player::Black => (0, 0),
    }
}

/// Moves sorted by forward progress; root randomization shuffles first so
/// ties come out in varying order.
fn ordered_moves(board: &Board, randomize: bool) -> Vec<Move> {
    let mut moves = board.legal_moves();
    if randomize {
        moves.shuffle(&mut rand::rng());
    }
    let (tf, tr) = target_corner(board.to_move());
    let dist = |sq: Square| {
        let df = (sq.file() as i32 - tf).abs();
        let dr = (sq.rank() as i32 - tr).abs();
        df.max(dr)
    };
    moves.sort_by_key(|mv| dist(mv.to()) - dist(mv.from()));
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Player;

    fn sq(text: &str) -> Square {
        text.parse().unwrap()
    }

    fn winning_position() -> Board {
        // White fills the black camp except g6; the last piece waits on g5.
        let mut white: Vec<Square> = Board::camp(Player::Black)
            .into_iter()
            .filter(|s| *s != sq("g6"))
            .collect();
        white.push(sq("g5"));
        let black: Vec<Square> = (0..9)
            .map(|i| Square::new(i % 4, 3 + i / 4).unwrap())
            .collect();
        Board::from_placement(&white, &black, 0)
    }

    #[test]
    fn test_finds_one_move_win() {
        let board = winning_position();
        for depth in [1, 3] {
            let opts = SearchOptions {
                depth,
                ..SearchOptions::default()
            };
            let mv = best_move(&board, &opts).expect("a move exists");
            let mut after = board.clone();
            after.apply(&mv).unwrap();
            assert_eq!(
                after.winner(),
                Some(Player::White),
                "depth {depth} search must complete the camp, played {mv}"
            );
        }
    }

    #[test]
    fn test_opening_move_is_legal() {
        let board = Board::new();
        let opts = SearchOptions {
            depth: 2,
            ..SearchOptions::default()
        };
        let mv = best_move(&board, &opts).expect("opening has moves");
        assert!(board.is_legal(&mv));
    }

    #[test]
    fn test_randomized_move_is_legal() {
        let board = Board::new();
        let opts = SearchOptions {
            depth: 1,
            randomize: true,
            ..SearchOptions::default()
        };
        for _ in 0..5 {
            let mv = best_move(&board, &opts).expect("opening has moves");
            assert!(board.is_legal(&mv));
        }
    }

    #[test]
    fn test_time_budget_still_returns_a_move() {
        let board = Board::new();
        let opts = SearchOptions {
            depth: 6,
            time_budget: Some(Duration::ZERO),
            ..SearchOptions::default()
        };
        // Depth 1 always completes; the budget only stops further deepening.
        assert!(best_move(&board, &opts).is_some());
    }
}
