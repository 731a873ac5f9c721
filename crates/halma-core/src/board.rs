//! Board state, move encoding and legality for two-player halma.
//!
//! The game is played on an 8x8 grid. Each side starts with nine pieces in
//! a 3x3 camp in its own corner and wins by occupying the whole opposite
//! camp. A move is either a single step to an adjacent empty square or a
//! chain of jumps, each hop passing over one adjacent piece into the empty
//! square directly beyond.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Width and height of the board.
pub const BOARD_SIZE: u8 = 8;

/// Width and height of each starting camp.
const CAMP_SIZE: u8 = 3;

/// The eight king-step directions.
const DIRS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// One of the two sides. `White` is the first mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    White,
    Black,
}

impl Player {
    /// The other side.
    pub fn opponent(self) -> Player {
        match self {
            Player::White => Player::Black,
            Player::Black => Player::White,
        }
    }

    /// Stable index for per-player arrays.
    pub fn index(self) -> usize {
        match self {
            Player::White => 0,
            Player::Black => 1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::White => write!(f, "white"),
            Player::Black => write!(f, "black"),
        }
    }
}

/// Error for a side name that is neither `white` nor `black`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown side {0:?}")]
pub struct ParsePlayerError(pub String);

impl FromStr for Player {
    type Err = ParsePlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(Player::White),
            "black" => Ok(Player::Black),
            other => Err(ParsePlayerError(other.to_string())),
        }
    }
}

/// A board coordinate, printed in algebraic form (`a1`..`h8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square(u8);

impl Square {
    /// Build a square from zero-based file and rank.
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        if file < BOARD_SIZE && rank < BOARD_SIZE {
            Some(Square(rank * BOARD_SIZE + file))
        } else {
            None
        }
    }

    /// Zero-based file (column), `a` = 0.
    pub fn file(self) -> u8 {
        self.0 % BOARD_SIZE
    }

    /// Zero-based rank (row), `1` = 0.
    pub fn rank(self) -> u8 {
        self.0 / BOARD_SIZE
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    /// The square displaced by `(df, dr)`, if it stays on the board.
    fn offset(self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file() as i8 + df;
        let rank = self.rank() as i8 + dr;
        if (0..BOARD_SIZE as i8).contains(&file) && (0..BOARD_SIZE as i8).contains(&rank) {
            Square::new(file as u8, rank as u8)
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

impl FromStr for Square {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(MoveError::BadSquare(s.to_string()));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| MoveError::BadSquare(s.to_string()))
    }
}

/// One move: the path of squares a piece travels, origin first.
///
/// The canonical movetext is the squares joined by `-`, e.g. `c3-d4` for a
/// step or `c3-e5-e7` for a jump chain. `Display` and `FromStr` round-trip
/// this form exactly. The "no move" sentinel of the session protocol is
/// expressed as `Option<Move>` being `None`, never as a special value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    path: Vec<Square>,
}

impl Move {
    /// Build a move from a path, rejecting short or self-crossing paths.
    pub fn new(path: Vec<Square>) -> Result<Move, MoveError> {
        if path.len() < 2 {
            return Err(MoveError::TooShort);
        }
        for (i, sq) in path.iter().enumerate() {
            if path[..i].contains(sq) {
                return Err(MoveError::RepeatedSquare(*sq));
            }
        }
        Ok(Move { path })
    }

    /// Square the moving piece starts on.
    pub fn from(&self) -> Square {
        self.path[0]
    }

    /// Square the moving piece ends on.
    pub fn to(&self) -> Square {
        self.path[self.path.len() - 1]
    }

    /// The full path, origin first.
    pub fn path(&self) -> &[Square] {
        &self.path
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sq) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{sq}")?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s
            .split('-')
            .map(str::parse)
            .collect::<Result<Vec<Square>, MoveError>>()?;
        Move::new(path)
    }
}

/// Why a movetext could not be turned into a move on the current board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    /// A coordinate was not of the form `a1`..`h8`.
    #[error("bad square {0:?}")]
    BadSquare(String),

    /// The path had fewer than two squares.
    #[error("a move needs at least two squares")]
    TooShort,

    /// The path visits the same square twice.
    #[error("square {0} repeats in the move path")]
    RepeatedSquare(Square),

    /// The move is well-formed but not legal in the current position.
    #[error("illegal move: {0}")]
    Illegal(String),
}

/// The full game position: occupancy plus the zero-based ply count.
///
/// The side to move and the turn number are always derived from the ply
/// count, never tracked separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Player>; 64],
    ply: u32,
}

impl Board {
    /// The starting position: both camps fully occupied by their owners.
    pub fn new() -> Board {
        let mut cells = [None; 64];
        for player in [Player::White, Player::Black] {
            for sq in Self::camp(player) {
                cells[sq.index()] = Some(player);
            }
        }
        Board { cells, ply: 0 }
    }

    /// The squares of `player`'s starting camp.
    pub fn camp(player: Player) -> Vec<Square> {
        let mut squares = Vec::with_capacity((CAMP_SIZE * CAMP_SIZE) as usize);
        for rank in 0..CAMP_SIZE {
            for file in 0..CAMP_SIZE {
                let sq = match player {
                    Player::White => Square::new(file, rank),
                    Player::Black => {
                        Square::new(BOARD_SIZE - 1 - file, BOARD_SIZE - 1 - rank)
                    }
                };
                if let Some(sq) = sq {
                    squares.push(sq);
                }
            }
        }
        squares
    }

    /// The side whose turn it is, derived from the ply count.
    pub fn to_move(&self) -> Player {
        if self.ply % 2 == 0 {
            Player::White
        } else {
            Player::Black
        }
    }

    /// Zero-based count of moves applied so far.
    pub fn ply(&self) -> u32 {
        self.ply
    }

    /// The piece on `sq`, if any.
    pub fn piece_at(&self, sq: Square) -> Option<Player> {
        self.cells[sq.index()]
    }

    /// Game-over detection: a side wins once the opposite camp is entirely
    /// occupied by its own pieces.
    pub fn winner(&self) -> Option<Player> {
        for player in [Player::White, Player::Black] {
            let target = Self::camp(player.opponent());
            if target.iter().all(|sq| self.piece_at(*sq) == Some(player)) {
                return Some(player);
            }
        }
        None
    }

    /// Whether `mv` is legal for the side to move.
    pub fn is_legal(&self, mv: &Move) -> bool {
        self.check_legal(mv).is_ok()
    }

    fn check_legal(&self, mv: &Move) -> Result<(), MoveError> {
        let mover = self.to_move();
        let origin = mv.from();
        if self.piece_at(origin) != Some(mover) {
            return Err(MoveError::Illegal(format!(
                "{origin} does not hold a {mover} piece"
            )));
        }
        for sq in &mv.path()[1..] {
            if self.piece_at(*sq).is_some() {
                return Err(MoveError::Illegal(format!("{sq} is occupied")));
            }
        }
        if mv.path().len() == 2 && is_adjacent(origin, mv.to()) {
            return Ok(());
        }
        for pair in mv.path().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let mid = jump_midpoint(a, b).ok_or_else(|| {
                MoveError::Illegal(format!("{a}-{b} is neither a step nor a jump"))
            })?;
            // The origin square is vacated the moment the piece lifts, so it
            // cannot be jumped over.
            if mid == origin || self.piece_at(mid).is_none() {
                return Err(MoveError::Illegal(format!(
                    "nothing to jump over between {a} and {b}"
                )));
            }
        }
        Ok(())
    }

    /// Apply a move for the side to move, advancing the ply count.
    pub fn apply(&mut self, mv: &Move) -> Result<(), MoveError> {
        self.check_legal(mv)?;
        let mover = self.to_move();
        self.cells[mv.from().index()] = None;
        self.cells[mv.to().index()] = Some(mover);
        self.ply += 1;
        Ok(())
    }

    /// Parse canonical movetext and validate it against this position.
    ///
    /// This is the single entry point for every move read off a pipe, a
    /// history file or the interactive reader.
    pub fn parse_move(&self, text: &str) -> Result<Move, MoveError> {
        let mv: Move = text.trim().parse()?;
        self.check_legal(&mv)?;
        Ok(mv)
    }

    /// All legal moves for the side to move.
    ///
    /// Jump destinations reachable along several chains are reported once,
    /// with the first (shortest) path found.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mover = self.to_move();
        let mut moves = Vec::new();
        for index in 0..64u8 {
            let origin = Square(index);
            if self.piece_at(origin) != Some(mover) {
                continue;
            }
            for (df, dr) in DIRS {
                if let Some(to) = origin.offset(df, dr) {
                    if self.piece_at(to).is_none() {
                        moves.push(Move {
                            path: vec![origin, to],
                        });
                    }
                }
            }
            self.collect_jumps(origin, &mut moves);
        }
        moves
    }

    fn collect_jumps(&self, origin: Square, moves: &mut Vec<Move>) {
        let mut seen = [false; 64];
        seen[origin.index()] = true;
        let mut queue: VecDeque<Vec<Square>> = VecDeque::new();
        queue.push_back(vec![origin]);
        while let Some(path) = queue.pop_front() {
            let last = path[path.len() - 1];
            for (df, dr) in DIRS {
                let Some(mid) = last.offset(df, dr) else {
                    continue;
                };
                let Some(land) = last.offset(2 * df, 2 * dr) else {
                    continue;
                };
                if mid == origin || self.piece_at(mid).is_none() {
                    continue;
                }
                if self.piece_at(land).is_some() || seen[land.index()] {
                    continue;
                }
                seen[land.index()] = true;
                let mut extended = path.clone();
                extended.push(land);
                moves.push(Move {
                    path: extended.clone(),
                });
                queue.push_back(extended);
            }
        }
    }

    /// Build an arbitrary position, for analysis and tests. A square named
    /// by both lists ends up black; plies already played fix the side to
    /// move.
    pub fn from_placement(white: &[Square], black: &[Square], ply: u32) -> Board {
        let mut cells = [None; 64];
        for sq in white {
            cells[sq.index()] = Some(Player::White);
        }
        for sq in black {
            cells[sq.index()] = Some(Player::Black);
        }
        Board { cells, ply }
    }

    /// Child position after a known-legal move. Used by the search, which
    /// only feeds back moves produced by [`Board::legal_moves`].
    pub(crate) fn make_move(&self, mv: &Move) -> Board {
        let mut child = self.clone();
        let mover = child.to_move();
        child.cells[mv.from().index()] = None;
        child.cells[mv.to().index()] = Some(mover);
        child.ply += 1;
        child
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

fn is_adjacent(a: Square, b: Square) -> bool {
    let df = (a.file() as i8 - b.file() as i8).abs();
    let dr = (a.rank() as i8 - b.rank() as i8).abs();
    df <= 1 && dr <= 1 && (df, dr) != (0, 0)
}

/// For a two-square displacement along one of the eight directions,
/// the square jumped over. `None` if `a`-`b` is not a jump shape.
fn jump_midpoint(a: Square, b: Square) -> Option<Square> {
    let df = b.file() as i8 - a.file() as i8;
    let dr = b.rank() as i8 - a.rank() as i8;
    let jump_shape =
        (df == 0 || df.abs() == 2) && (dr == 0 || dr.abs() == 2) && (df, dr) != (0, 0);
    if !jump_shape {
        return None;
    }
    a.offset(df / 2, dr / 2)
}
