//! Board engine: swap evaluation, cascade resolution and the input gate.
//!
//! Everything that would be an animation wait is a phase with a due time on
//! a board-local clock. `advance` drains the phases that are due, so the
//! outcome does not depend on how the caller slices time. Only one swap or
//! cascade is in flight at a time; `BoardState::Waiting` rejects new swipes
//! until the board settles.

use crate::error::BoardError;
use crate::grid::{self, Grid, Position};
use crate::matcher;
use crate::pool::DropPool;
use crate::swipe::{self, DEFAULT_SWIPE_RESIST, SwipeOutcome};
use crate::token::{Catalog, TokenKind, TokenSource};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Re-rolls spent avoiding an instant triple before a matching kind is accepted.
pub const DEFAULT_MAX_REROLLS: u32 = 100;

/// Destroy cycles one resolution may run before the board is forced to settle.
pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 64;

/// Waits standing in for animation playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Swap (and swap-back) travel time before the swap is evaluated.
    pub swap: Duration,
    /// Destroy animation before matched drops go back to the pool.
    pub destroy: Duration,
    /// Fall time after compaction and after refill.
    pub fall: Duration,
}

impl Timings {
    pub const INSTANT: Self = Self {
        swap: Duration::ZERO,
        destroy: Duration::ZERO,
        fall: Duration::ZERO,
    };
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            swap: Duration::from_millis(500),
            destroy: Duration::from_millis(200),
            fall: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    /// Per-column spawn flags; padded with `true` / truncated to `width`.
    pub spawn_columns: Vec<bool>,
    /// Rows above the board that new drops fall in from.
    pub spawn_offset: usize,
    /// Defaults to width * height.
    pub pool_capacity: Option<usize>,
    pub timings: Timings,
    pub swipe_resist: f32,
    pub max_rerolls: u32,
    pub max_cascade_depth: u32,
}

impl BoardConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            spawn_columns: Vec::new(),
            spawn_offset: 2,
            pool_capacity: None,
            timings: Timings::default(),
            swipe_resist: DEFAULT_SWIPE_RESIST,
            max_rerolls: DEFAULT_MAX_REROLLS,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }

    pub fn spawn_flags(&self) -> Vec<bool> {
        let mut flags = self.spawn_columns.clone();
        flags.resize(self.width, true);
        flags
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity.unwrap_or(self.width * self.height)
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        if self.width == 0 || self.height == 0 {
            return Err(BoardError::InvalidConfig(format!(
                "board must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        let open = self.spawn_flags().iter().filter(|&&f| f).count();
        let needed = open * self.height;
        if self.pool_capacity() < needed {
            return Err(BoardError::InvalidConfig(format!(
                "pool capacity {} is below the {} spawnable cells",
                self.pool_capacity(),
                needed
            )));
        }
        if self.max_cascade_depth == 0 {
            return Err(BoardError::InvalidConfig(
                "max cascade depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Input gate. Swipes are only accepted in `Continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Waiting,
    Continue,
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("Waiting"),
            Self::Continue => f.write_str("Continue"),
        }
    }
}

/// What the engine did, for the presentation layer to animate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// New drop placed at `position`, falling in from row `from_row` above the board.
    Spawned {
        position: Position,
        kind: TokenKind,
        from_row: usize,
    },
    Swapped { a: Position, b: Position },
    Reverted { a: Position, b: Position },
    Matched { positions: Vec<Position> },
    Destroyed { position: Position, kind: TokenKind },
    Fell { from: Position, to: Position },
    Settled { cascades: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub swaps: u32,
    pub reverts: u32,
    /// Destroy cycles run, across all resolutions.
    pub cascades: u32,
    pub destroyed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Swap shown; evaluate when due.
    Swapping { source: Position, target: Position },
    /// Swap-back shown; settle when due.
    Reverting,
    /// Matched drops are dying; release and compact when due.
    Destroying,
    /// Drops falling; refill when due.
    Falling,
    /// New drops falling in; re-scan when due.
    Refilling,
}

#[derive(Debug)]
pub struct Board<S: TokenSource = Catalog> {
    grid: Grid,
    pool: DropPool,
    spawn_columns: Vec<bool>,
    spawn_offset: usize,
    source: S,
    timings: Timings,
    swipe_resist: f32,
    max_rerolls: u32,
    max_cascade_depth: u32,
    state: BoardState,
    phase: Phase,
    clock: Duration,
    due: Duration,
    /// Destroyed drops held until their destroy window ends.
    dying: Vec<grid::Drop>,
    cascade_depth: u32,
    events: Vec<BoardEvent>,
    stats: BoardStats,
}

impl<S: TokenSource> Board<S> {
    /// Build the grid and pool and deal a full board with no triples on it.
    pub fn new(config: BoardConfig, source: S) -> Result<Self, BoardError> {
        let mut board = Self::assemble(config, source)?;
        for pos in board.grid.positions() {
            if board.spawn_columns[pos.column] {
                board.spawn_at(pos)?;
            }
        }
        // Re-roll limits can still let a triple through; resolve it before handing the board out.
        if board.resolve_matches()? {
            board.run_until_idle()?;
        }
        board.stats = BoardStats::default();
        debug!(
            width = board.grid.width(),
            height = board.grid.height(),
            drops = board.grid.occupied_count(),
            "board initialized"
        );
        Ok(board)
    }

    fn assemble(config: BoardConfig, source: S) -> Result<Self, BoardError> {
        config.validate()?;
        Ok(Self {
            grid: Grid::new(config.width, config.height),
            pool: DropPool::new(config.pool_capacity()),
            spawn_columns: config.spawn_flags(),
            spawn_offset: config.spawn_offset,
            source,
            timings: config.timings,
            swipe_resist: config.swipe_resist,
            max_rerolls: config.max_rerolls,
            max_cascade_depth: config.max_cascade_depth,
            state: BoardState::Continue,
            phase: Phase::Idle,
            clock: Duration::ZERO,
            due: Duration::ZERO,
            dying: Vec::new(),
            cascade_depth: 0,
            events: Vec::new(),
            stats: BoardStats::default(),
        })
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pool(&self) -> &DropPool {
        &self.pool
    }

    pub fn spawn_columns(&self) -> &[bool] {
        &self.spawn_columns
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn stats(&self) -> BoardStats {
        self.stats
    }

    /// Destroy cycles run so far by the resolution in flight.
    pub fn cascade_depth(&self) -> u32 {
        self.cascade_depth
    }

    /// No swap or cascade in flight.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Swipe from `source` by `(dx, dy)` board units (x right, y up).
    ///
    /// Busy boards, taps and swipes off the grid or into an empty cell are
    /// reported as outcomes and change nothing.
    pub fn on_swipe(&mut self, source: Position, vector: (f32, f32)) -> Result<SwipeOutcome, BoardError> {
        if self.state == BoardState::Waiting {
            return Ok(SwipeOutcome::Busy);
        }
        let (dx, dy) = vector;
        let occupied = self.grid.get(source)?.is_some();
        if !swipe::exceeds_resist(dx, dy, self.swipe_resist) {
            return Ok(SwipeOutcome::Tap);
        }
        let direction = swipe::classify(dx, dy);
        let Some(target) = direction.target(source, &self.grid) else {
            trace!(%source, ?direction, "swipe leaves the grid");
            return Ok(SwipeOutcome::Ignored);
        };
        if !occupied || self.grid.get(target)?.is_none() {
            return Ok(SwipeOutcome::Ignored);
        }

        self.state = BoardState::Waiting;
        self.grid.swap(source, target)?;
        self.events.push(BoardEvent::Swapped {
            a: source,
            b: target,
        });
        self.stats.swaps += 1;
        self.schedule(Phase::Swapping { source, target }, self.clock + self.timings.swap);
        debug!(%source, %target, ?direction, "swap started");
        Ok(SwipeOutcome::Started { source, target })
    }

    /// Start a cascade if the grid holds a triple. Returns false when idle boards have nothing to do
    /// or the board is busy.
    pub fn resolve_matches(&mut self) -> Result<bool, BoardError> {
        if self.state == BoardState::Waiting {
            return Ok(false);
        }
        if matcher::scan(&mut self.grid) == 0 {
            return Ok(false);
        }
        self.state = BoardState::Waiting;
        self.due = self.clock;
        self.begin_destroy()?;
        Ok(true)
    }

    /// Move the clock forward by `dt` and run every step that came due.
    pub fn advance(&mut self, dt: Duration) -> Result<(), BoardError> {
        self.clock += dt;
        while self.phase != Phase::Idle && self.clock >= self.due {
            self.step()?;
        }
        Ok(())
    }

    /// Skip the waits: run steps until the board settles.
    pub fn run_until_idle(&mut self) -> Result<(), BoardError> {
        while self.phase != Phase::Idle {
            self.clock = self.clock.max(self.due);
            self.step()?;
        }
        Ok(())
    }

    fn schedule(&mut self, phase: Phase, due: Duration) {
        self.phase = phase;
        self.due = due;
    }

    fn step(&mut self) -> Result<(), BoardError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Swapping { source, target } => {
                matcher::scan(&mut self.grid);
                let hit = |pos| {
                    self.grid
                        .get(pos)
                        .ok()
                        .flatten()
                        .is_some_and(grid::Drop::is_matched)
                };
                if hit(source) || hit(target) {
                    self.begin_destroy()?;
                } else {
                    matcher::clear_marks(&mut self.grid);
                    self.grid.swap(source, target)?;
                    self.events.push(BoardEvent::Reverted {
                        a: source,
                        b: target,
                    });
                    self.stats.reverts += 1;
                    debug!(%source, %target, "no match, swap reverted");
                    self.schedule(Phase::Reverting, self.due + self.timings.swap);
                }
            }
            Phase::Reverting => self.settle(),
            Phase::Destroying => {
                for drop in self.dying.drain(..) {
                    self.pool.release(drop)?;
                }
                self.compact()?;
                self.schedule(Phase::Falling, self.due + self.timings.fall);
            }
            Phase::Falling => {
                self.refill()?;
                self.schedule(Phase::Refilling, self.due + self.timings.fall);
            }
            Phase::Refilling => {
                if matcher::scan(&mut self.grid) == 0 {
                    self.settle();
                } else if self.cascade_depth >= self.max_cascade_depth {
                    warn!(
                        depth = self.cascade_depth,
                        "cascade depth bound reached, settling with triples left on the board"
                    );
                    matcher::clear_marks(&mut self.grid);
                    self.settle();
                } else {
                    self.begin_destroy()?;
                }
            }
        }
        Ok(())
    }

    /// Take every matched drop off the grid; they go back to the pool once the destroy window ends.
    fn begin_destroy(&mut self) -> Result<(), BoardError> {
        self.cascade_depth += 1;
        self.stats.cascades += 1;
        let positions = matcher::matched_positions(&self.grid);
        self.events.push(BoardEvent::Matched {
            positions: positions.clone(),
        });
        for &position in &positions {
            if let Some(drop) = self.grid.take(position)? {
                self.events.push(BoardEvent::Destroyed {
                    position,
                    kind: drop.kind(),
                });
                self.dying.push(drop);
            }
        }
        self.stats.destroyed += positions.len() as u32;
        debug!(
            depth = self.cascade_depth,
            destroyed = positions.len(),
            "destroying matched drops"
        );
        self.schedule(Phase::Destroying, self.due + self.timings.destroy);
        Ok(())
    }

    /// Gravity: one bottom-up pass per column, each drop drops by the number of holes beneath it.
    fn compact(&mut self) -> Result<(), BoardError> {
        let (w, h) = (self.grid.width(), self.grid.height());
        for column in 0..w {
            let mut holes = 0;
            for row in 0..h {
                let from = Position::new(column, row);
                if self.grid.get(from)?.is_none() {
                    holes += 1;
                } else if holes > 0 {
                    let to = Position::new(column, row - holes);
                    self.grid.swap(from, to)?;
                    trace!(%from, %to, "drop fell");
                    self.events.push(BoardEvent::Fell { from, to });
                }
            }
        }
        Ok(())
    }

    /// Fill every empty cell of the spawn columns, column by column, bottom up.
    fn refill(&mut self) -> Result<(), BoardError> {
        let mut spawned = 0;
        for pos in self.grid.positions() {
            if self.spawn_columns[pos.column] && self.grid.get(pos)?.is_none() {
                self.spawn_at(pos)?;
                spawned += 1;
            }
        }
        debug!(spawned, "board refilled");
        Ok(())
    }

    fn spawn_at(&mut self, position: Position) -> Result<(), BoardError> {
        let kind = self.pick_kind(position);
        let drop = self.pool.acquire(kind, position)?;
        self.grid.set(position, Some(drop))?;
        self.events.push(BoardEvent::Spawned {
            position,
            kind,
            from_row: self.grid.height() + self.spawn_offset + position.row,
        });
        Ok(())
    }

    /// Random kind, re-rolled a bounded number of times to avoid finishing a triple.
    fn pick_kind(&mut self, position: Position) -> TokenKind {
        let mut kind = self.source.random_kind();
        let mut rerolls = 0;
        while rerolls < self.max_rerolls && matcher::would_match(&self.grid, position, kind) {
            kind = self.source.random_kind();
            rerolls += 1;
        }
        kind
    }

    fn settle(&mut self) {
        debug!(cascades = self.cascade_depth, "board settled");
        self.events.push(BoardEvent::Settled {
            cascades: self.cascade_depth,
        });
        self.cascade_depth = 0;
        self.phase = Phase::Idle;
        self.state = BoardState::Continue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind::*;
    use proptest::prelude::*;

    /// Deals kinds from a fixed list, round robin.
    #[derive(Debug)]
    struct Script(Vec<TokenKind>, usize);

    impl TokenSource for Script {
        fn random_kind(&mut self) -> TokenKind {
            let k = self.0[self.1 % self.0.len()];
            self.1 += 1;
            k
        }
    }

    fn four_kinds(seed: u64) -> Catalog {
        Catalog::new(TokenKind::catalog(false), seed)
    }

    /// Board with a hand-written layout (top row first); nothing is resolved yet.
    fn board_from<S: TokenSource>(
        rows: &[&[Option<TokenKind>]],
        spawn_columns: Vec<bool>,
        timings: Timings,
        source: S,
    ) -> Board<S> {
        let h = rows.len();
        let w = rows[0].len();
        let mut config = BoardConfig::new(w, h);
        config.spawn_columns = spawn_columns;
        config.timings = timings;
        let mut board = Board::assemble(config, source).unwrap();
        for (i, row) in rows.iter().enumerate() {
            for (c, kind) in row.iter().enumerate() {
                if let Some(k) = kind {
                    let pos = Position::new(c, h - 1 - i);
                    let d = board.pool.acquire(*k, pos).unwrap();
                    board.grid.set(pos, Some(d)).unwrap();
                }
            }
        }
        board
    }

    fn assert_quiescent<S: TokenSource>(board: &Board<S>) {
        assert_eq!(board.state(), BoardState::Continue);
        assert!(board.is_idle());
        assert!(board.grid().is_consistent());
        assert!(!matcher::has_any_match(board.grid()));
        assert!(!matcher::has_triple(board.grid()), "unresolved triple left on the board");
        assert_eq!(board.pool().active_count(), board.grid().occupied_count());
        for pos in board.grid().positions() {
            if board.spawn_columns()[pos.column] {
                assert!(board.grid().get(pos).unwrap().is_some(), "hole at {pos}");
            }
        }
    }

    /// No empty cell sits below an occupied one in any column.
    fn assert_compacted(grid: &Grid) {
        for c in 0..grid.width() {
            let mut seen_hole = false;
            for r in 0..grid.height() {
                let occupied = grid.get(Position::new(c, r)).unwrap().is_some();
                assert!(!(seen_hole && occupied), "floating drop at ({c}, {r})");
                seen_hole |= !occupied;
            }
        }
    }

    fn count<F: Fn(&BoardEvent) -> bool>(events: &[BoardEvent], f: F) -> usize {
        events.iter().filter(|e| f(e)).count()
    }

    #[test]
    fn new_board_is_full_consistent_and_match_free() {
        for seed in 0..16 {
            let board = Board::new(BoardConfig::new(8, 8), four_kinds(seed)).unwrap();
            assert_quiescent(&board);
            assert_eq!(board.grid().occupied_count(), 64);
            assert_eq!(board.pool().active_count(), 64);
        }
    }

    #[test]
    fn fill_avoids_triples_without_a_resolve() {
        // Enough kinds that the re-roll bound is never hit: no cascade on init.
        let mut board = Board::new(BoardConfig::new(7, 9), four_kinds(99)).unwrap();
        let events = board.take_events();
        assert_eq!(count(&events, |e| matches!(e, BoardEvent::Matched { .. })), 0);
        assert_eq!(
            count(&events, |e| matches!(e, BoardEvent::Spawned { .. })),
            63
        );
    }

    #[test]
    fn closed_columns_stay_empty() {
        let mut config = BoardConfig::new(5, 4);
        config.spawn_columns = vec![true, false, true];
        let board = Board::new(config, four_kinds(3)).unwrap();
        assert_eq!(board.spawn_columns(), &[true, false, true, true, true]);
        for r in 0..4 {
            assert_eq!(board.grid().get(Position::new(1, r)).unwrap(), None);
        }
        assert_eq!(board.grid().occupied_count(), 16);
        assert_quiescent(&board);
    }

    #[test]
    fn config_validation() {
        let mut config = BoardConfig::new(4, 4);
        config.pool_capacity = Some(15);
        assert!(matches!(
            Board::new(config, four_kinds(0)),
            Err(BoardError::InvalidConfig(_))
        ));

        let mut config = BoardConfig::new(4, 4);
        config.pool_capacity = Some(12);
        config.spawn_columns = vec![false];
        assert!(Board::new(config, four_kinds(0)).is_ok());

        assert!(BoardConfig::new(0, 3).validate().is_err());
        let mut config = BoardConfig::new(3, 3);
        config.max_cascade_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tap_does_nothing() {
        let mut board = Board::new(BoardConfig::new(4, 4), four_kinds(5)).unwrap();
        let before = board.grid().snapshot();
        let out = board.on_swipe(Position::new(1, 1), (0.4, -0.3)).unwrap();
        assert_eq!(out, SwipeOutcome::Tap);
        assert_eq!(board.state(), BoardState::Continue);
        assert_eq!(board.grid().snapshot(), before);
    }

    #[test]
    fn swipe_off_the_grid_is_ignored() {
        let mut board = Board::new(BoardConfig::new(4, 4), four_kinds(8)).unwrap();
        let before = board.grid().snapshot();
        let cases = [
            (Position::new(3, 2), (1.0, 0.0)),
            (Position::new(0, 2), (-1.0, 0.0)),
            (Position::new(2, 3), (0.0, 1.0)),
            (Position::new(2, 0), (0.2, -2.0)),
        ];
        for (source, vector) in cases {
            assert_eq!(board.on_swipe(source, vector).unwrap(), SwipeOutcome::Ignored);
            assert_eq!(board.state(), BoardState::Continue);
            assert_eq!(board.grid().snapshot(), before);
        }
    }

    #[test]
    fn swipe_from_outside_grid_is_an_error() {
        let mut board = Board::new(BoardConfig::new(3, 3), four_kinds(8)).unwrap();
        assert!(matches!(
            board.on_swipe(Position::new(3, 0), (1.0, 0.0)),
            Err(BoardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn swipe_into_closed_column_is_ignored() {
        let mut config = BoardConfig::new(3, 3);
        config.spawn_columns = vec![true, false, true];
        let mut board = Board::new(config, four_kinds(2)).unwrap();
        let out = board.on_swipe(Position::new(0, 1), (1.0, 0.0)).unwrap();
        assert_eq!(out, SwipeOutcome::Ignored);
        assert_eq!(board.state(), BoardState::Continue);
    }

    #[test]
    fn unmatched_swap_reverts_after_delays() {
        let mut board = board_from(
            &[
                &[Some(Red), Some(Green), Some(Blue)],
                &[Some(Green), Some(Blue), Some(Red)],
                &[Some(Blue), Some(Red), Some(Green)],
            ],
            vec![],
            Timings::default(),
            four_kinds(1),
        );
        let before = board.grid().snapshot();
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);

        let out = board.on_swipe(a, (1.0, 0.2)).unwrap();
        assert_eq!(out, SwipeOutcome::Started { source: a, target: b });
        assert_eq!(board.state(), BoardState::Waiting);
        assert_eq!(board.on_swipe(b, (0.0, 1.0)).unwrap(), SwipeOutcome::Busy);

        board.advance(Duration::from_millis(499)).unwrap();
        assert_eq!(board.grid().kind_at(a), Some(Red));
        assert!(board.grid().is_consistent());

        board.advance(Duration::from_millis(1)).unwrap();
        assert_eq!(board.grid().kind_at(a), Some(Blue));
        assert_eq!(board.state(), BoardState::Waiting);

        board.advance(Duration::from_millis(500)).unwrap();
        assert_eq!(board.state(), BoardState::Continue);
        assert_eq!(board.grid().snapshot(), before);
        assert_eq!(board.stats().reverts, 1);

        let events = board.take_events();
        assert_eq!(
            events,
            vec![
                BoardEvent::Swapped { a, b },
                BoardEvent::Reverted { a, b },
                BoardEvent::Settled { cascades: 0 },
            ]
        );
    }

    #[test]
    fn three_in_a_row_is_cleared_and_refilled() {
        // 3x1 board: the only row is a triple, nothing above it to fall.
        let mut board = board_from(
            &[&[Some(Red), Some(Red), Some(Red)]],
            vec![],
            Timings::default(),
            four_kinds(11),
        );
        assert!(board.resolve_matches().unwrap());
        assert_eq!(board.state(), BoardState::Waiting);
        for c in 0..3 {
            assert_eq!(board.grid().get(Position::new(c, 0)).unwrap(), None);
        }
        // Dying drops stay checked out until the destroy window ends.
        assert_eq!(board.dying.len(), 3);
        assert_eq!(board.pool().active_count(), 3);
        board.advance(Duration::from_millis(200)).unwrap();
        assert!(board.dying.is_empty());
        assert_eq!(board.pool().active_count(), 0);

        board.run_until_idle().unwrap();
        assert_quiescent(&board);
        let events = board.take_events();
        let matched: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                BoardEvent::Matched { positions } => Some(positions.len()),
                _ => None,
            })
            .collect();
        assert_eq!(matched[0], 3);
        assert_eq!(count(&events, |e| matches!(e, BoardEvent::Fell { .. })), 0);
        assert!(count(&events, |e| matches!(e, BoardEvent::Spawned { .. })) >= 3);
        assert_eq!(events.last(), Some(&BoardEvent::Settled { cascades: 1 }));
    }

    #[test]
    fn destroy_conserves_drops_without_spawning() {
        let mut board = board_from(
            &[
                &[Some(Blue), Some(Green), Some(Yellow)],
                &[Some(Green), Some(Yellow), Some(Blue)],
                &[Some(Red), Some(Red), Some(Red)],
            ],
            vec![false; 3],
            Timings::default(),
            four_kinds(4),
        );
        let before = board.grid().occupied_count();
        assert!(board.resolve_matches().unwrap());
        board.run_until_idle().unwrap();

        let stats = board.stats();
        assert_eq!(stats.destroyed as usize + board.grid().occupied_count(), before);
        assert_eq!(board.grid().occupied_count(), 6);
        assert_eq!(board.pool().active_count(), 6);
        assert_compacted(board.grid());
        assert_eq!(board.grid().kind_at(Position::new(0, 0)), Some(Green));
        assert_eq!(board.grid().kind_at(Position::new(0, 1)), Some(Blue));
        assert_eq!(board.state(), BoardState::Continue);
    }

    #[test]
    fn compaction_runs_before_refill() {
        let mut board = board_from(
            &[
                &[Some(Blue), Some(Green), Some(Yellow)],
                &[Some(Green), Some(Yellow), Some(Blue)],
                &[Some(Red), Some(Red), Some(Red)],
            ],
            vec![],
            Timings::default(),
            four_kinds(4),
        );
        board.resolve_matches().unwrap();
        // Destroy window ends: release + compact, refill still pending.
        board.advance(Duration::from_millis(200)).unwrap();
        assert_compacted(board.grid());
        assert_eq!(board.grid().occupied_count(), 6);
        assert!(board.grid().is_consistent());
        let events = board.take_events();
        assert_eq!(count(&events, |e| matches!(e, BoardEvent::Fell { .. })), 6);

        board.advance(Duration::from_millis(300)).unwrap();
        assert_eq!(board.grid().occupied_count(), 9);
        assert_eq!(board.state(), BoardState::Waiting);
        board.advance(Duration::from_millis(300)).unwrap();
        board.run_until_idle().unwrap();
        assert_quiescent(&board);
    }

    #[test]
    fn corner_swap_cascades_to_rest() {
        let mut board = board_from(
            &[
                &[Some(Green), Some(Yellow), Some(Blue), Some(Green)],
                &[Some(Yellow), Some(Blue), Some(Green), Some(Yellow)],
                &[Some(Blue), Some(Green), Some(Yellow), Some(Blue)],
                &[Some(Red), Some(Red), Some(Blue), Some(Red)],
            ],
            vec![],
            Timings::default(),
            four_kinds(21),
        );
        let out = board.on_swipe(Position::new(2, 0), (0.9, 0.1)).unwrap();
        assert!(matches!(out, SwipeOutcome::Started { .. }));

        let mut cycles = 0;
        while !board.is_idle() {
            board.advance(Duration::from_millis(100)).unwrap();
            cycles += 1;
            assert!(cycles < 10_000, "cascade never settled");
        }
        assert_quiescent(&board);
        assert!(board.stats().cascades >= 1);
        assert!(board.stats().destroyed >= 3);
        assert_eq!(board.stats().reverts, 0);
    }

    #[test]
    fn cascade_depth_is_bounded() {
        // One kind and no re-rolls: every refill is another triple.
        let mut config = BoardConfig::new(3, 1);
        config.max_cascade_depth = 3;
        config.max_rerolls = 0;
        let mut board = Board::new(config, Script(vec![Red], 0)).unwrap();
        assert_eq!(board.state(), BoardState::Continue);
        assert!(board.is_idle());
        // Marks are cleared but the last refill's triple is still on the board.
        assert!(!matcher::has_any_match(board.grid()));
        assert!(matcher::has_triple(board.grid()));
        assert_eq!(board.cascade_depth(), 0);
        let events = board.take_events();
        assert_eq!(count(&events, |e| matches!(e, BoardEvent::Matched { .. })), 3);
        assert_eq!(events.last(), Some(&BoardEvent::Settled { cascades: 3 }));
    }

    #[test]
    fn advance_is_independent_of_step_size() {
        let run = |step: Option<Duration>| {
            let mut board = Board::new(BoardConfig::new(6, 6), four_kinds(77)).unwrap();
            board.take_events();
            let mut events = Vec::new();
            for (c, r, v) in [(0, 0, (1.0, 0.0)), (2, 3, (0.0, 1.0)), (5, 5, (-1.0, 0.0))] {
                board.on_swipe(Position::new(c, r), v).unwrap();
                match step {
                    Some(dt) => {
                        while !board.is_idle() {
                            board.advance(dt).unwrap();
                        }
                    }
                    None => board.run_until_idle().unwrap(),
                }
                events.extend(board.take_events());
            }
            (board.grid().snapshot(), events)
        };
        let coarse = run(None);
        assert_eq!(run(Some(Duration::from_millis(7))), coarse);
        assert_eq!(run(Some(Duration::from_secs(5))), coarse);
    }

    #[test]
    fn instant_timings_settle_on_first_advance() {
        let mut config = BoardConfig::new(5, 5);
        config.timings = Timings::INSTANT;
        let mut board = Board::new(config, four_kinds(13)).unwrap();
        board.on_swipe(Position::new(2, 2), (0.0, -1.0)).unwrap();
        board.advance(Duration::ZERO).unwrap();
        assert_quiescent(&board);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn random_play_keeps_invariants(
            seed in any::<u64>(),
            swipes in prop::collection::vec((0usize..6, 0usize..6, -1.5f32..1.5, -1.5f32..1.5), 1..20),
        ) {
            let mut board = Board::new(BoardConfig::new(6, 6), four_kinds(seed)).unwrap();
            let total = board.grid().occupied_count();
            for (c, r, dx, dy) in swipes {
                board.on_swipe(Position::new(c, r), (dx, dy)).unwrap();
                board.run_until_idle().unwrap();
                prop_assert_eq!(board.state(), BoardState::Continue);
                prop_assert!(board.grid().is_consistent());
                prop_assert!(!matcher::has_any_match(board.grid()));
                prop_assert!(!matcher::has_triple(board.grid()));
                prop_assert_eq!(board.grid().occupied_count(), total);
                prop_assert_eq!(board.pool().active_count(), total);
            }
        }
    }
}
