//! The authoritative game controller: history replay and the turn loop.
//!
//! The controller owns the only board that decides legality, side to move
//! and the outcome. Children keep their own mirrors, synchronized solely
//! through protocol messages; any divergence is a protocol defect, not a
//! recoverable condition.

use std::io::{self, BufRead};
use std::time::Duration;

use anyhow::{Context, Result};
use halma_core::{Board, GameClock, Move, Player};

use crate::config::{SessionConfig, Settings};
use crate::interactive;
use crate::signals;
use crate::supervisor::{EngineLaunch, Supervisor};
use crate::transcript::Transcript;

/// How the turn loop ended. Every variant exits with success; fatal
/// conditions travel as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Game-over detection fired; the result line has been printed.
    GameOver(Player),
    /// A move source reported end of input.
    GracefulEof,
    /// An interrupt/terminate request was observed at a checkpoint.
    Terminated,
}

/// Which actor supplied the move this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveSource {
    Engine,
    Display,
    Console,
}

pub struct Controller {
    board: Board,
    clock: GameClock,
    config: SessionConfig,
    settings: Settings,
    supervisor: Supervisor,
    transcript: Option<Transcript>,
    console: Box<dyn BufRead + Send>,
}

impl Controller {
    pub fn new(config: SessionConfig, settings: Settings) -> Result<Self> {
        signals::install()?;
        let transcript = match &config.transcript {
            Some(path) => Some(Transcript::create(path)?),
            None => None,
        };
        let grace = Duration::from_millis(settings.grace_ms);
        Ok(Self {
            board: Board::new(),
            clock: GameClock::new(),
            config,
            settings,
            supervisor: Supervisor::new(grace),
            transcript,
            console: Box::new(io::BufReader::new(io::stdin())),
        })
    }

    /// Run the whole session: spawn children, replay history, loop until
    /// an outcome, then tear everything down. The teardown also runs on
    /// the error path before the failure propagates to the exit code.
    pub fn run(mut self) -> Result<()> {
        let result = self.drive();
        self.supervisor.shutdown();
        let outcome = result?;
        tracing::info!(?outcome, "session over");
        Ok(())
    }

    fn drive(&mut self) -> Result<Outcome> {
        if !self.config.no_display {
            let command = self.settings.display_command.clone();
            self.supervisor.spawn_display(&command)?;
        }
        let history = self.replay_history()?;
        if self.config.wants_engine() {
            let launch = EngineLaunch {
                command: self.settings.engine_command.clone(),
                depth: self.settings.search_depth,
                random: self.config.random,
                verbose: self.config.verbose,
                avg_time: self.settings.avg_time_secs,
            };
            self.supervisor.spawn_engine(&launch, &history)?;
        }
        loop {
            if let Some(outcome) = self.play_turn()? {
                return Ok(outcome);
            }
        }
    }

    /// Replay the stored opening before the engine exists, keeping the
    /// display and transcript in step exactly as the turn loop would.
    /// Returns the applied moves so a later engine spawn can bring its
    /// mirror to the same position.
    fn replay_history(&mut self) -> Result<Vec<(Player, String)>> {
        let Some(path) = self.config.history.clone() else {
            return Ok(Vec::new());
        };
        let file = std::fs::File::open(&path)
            .with_context(|| format!("failed to open history file {}", path.display()))?;
        let mut applied = Vec::new();
        for (lineno, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read history file {}", path.display()))?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let mv = self.board.parse_move(text).with_context(|| {
                format!("history file {} line {}", path.display(), lineno + 1)
            })?;
            let mover = self.board.to_move();
            let movetext = mv.to_string();
            self.echo_to_display(mover, &movetext)?;
            self.record_transcript(mover, &movetext)?;
            self.board
                .apply(&mv)
                .with_context(|| format!("history move {movetext} failed to apply"))?;
            applied.push((mover, movetext));
        }
        tracing::info!(plies = applied.len(), "history replayed");
        Ok(applied)
    }

    /// One iteration of the turn loop; `Ok(None)` means keep going.
    ///
    /// Order per turn: checkpoint the signal flags, check for a winner,
    /// acquire exactly one move for the side to move, charge the clock,
    /// write the transcript, echo to the display (unless the display was
    /// the source), emit the tournament feed line, apply the move, and
    /// finally forward it to an engine that played no part in it.
    fn play_turn(&mut self) -> Result<Option<Outcome>> {
        if signals::terminate_requested() {
            tracing::info!("termination requested");
            return Ok(Some(Outcome::Terminated));
        }
        if signals::take_child_exited() {
            self.supervisor.reap();
        }
        if let Some(winner) = self.board.winner() {
            println!("{winner} wins!");
            return Ok(Some(Outcome::GameOver(winner)));
        }

        let mover = self.board.to_move();
        let Some((mv, source)) = self.acquire_move(mover)? else {
            tracing::info!("end of input, ending the session");
            return Ok(Some(Outcome::GracefulEof));
        };

        let spent = self.clock.charge(mover);
        tracing::debug!(%mover, %mv, ?spent, ?source, "move acquired");

        let movetext = mv.to_string();
        self.record_transcript(mover, &movetext)?;
        if source != MoveSource::Display {
            self.echo_to_display(mover, &movetext)?;
        }
        if self.config.tournament && source == MoveSource::Engine {
            println!("@@@{mover}:{movetext}");
        }
        self.board
            .apply(&mv)
            .context("validated move failed to apply")?;
        if self.supervisor.has_engine() && !self.config.engine_plays(mover) {
            self.notify_engine(mover, &movetext)?;
        }
        Ok(None)
    }

    /// Ask exactly one source for the next move, per the mover's bound
    /// role. `None` only ever comes from the console (end of input); a
    /// peer that cannot answer is a fatal protocol failure.
    fn acquire_move(&mut self, mover: Player) -> Result<Option<(Move, MoveSource)>> {
        if self.config.engine_plays(mover) {
            let engine = self
                .supervisor
                .engine_mut()
                .context("engine-bound side but no engine running")?;
            let text = engine.request()?;
            let mv = self
                .board
                .parse_move(&text)
                .with_context(|| format!("engine replied with an unplayable move {text:?}"))?;
            return Ok(Some((mv, MoveSource::Engine)));
        }
        if self.supervisor.has_display() && !self.config.tournament {
            let display = self
                .supervisor
                .display_mut()
                .context("display vanished mid-session")?;
            let text = display.request()?;
            let mv = self
                .board
                .parse_move(&text)
                .with_context(|| format!("display replied with an unplayable move {text:?}"))?;
            return Ok(Some((mv, MoveSource::Display)));
        }
        let mv = interactive::read_move(&self.board, &mut *self.console)?;
        Ok(mv.map(|m| (m, MoveSource::Console)))
    }

    fn notify_engine(&mut self, mover: Player, movetext: &str) -> Result<()> {
        if let Some(engine) = self.supervisor.engine_mut() {
            engine
                .notify(mover, movetext)
                .context("engine failed to acknowledge the forwarded move")?;
        }
        Ok(())
    }

    fn echo_to_display(&mut self, mover: Player, movetext: &str) -> Result<()> {
        if let Some(display) = self.supervisor.display_mut() {
            display
                .notify(mover, movetext)
                .context("display failed to acknowledge the forwarded move")?;
        }
        Ok(())
    }

    fn record_transcript(&mut self, mover: Player, movetext: &str) -> Result<()> {
        if let Some(transcript) = &mut self.transcript {
            transcript
                .record(self.board.ply(), mover, movetext)
                .context("failed to write transcript")?;
        }
        Ok(())
    }
}
