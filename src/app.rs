//! App: terminal init, main loop, board clock and key/mouse handling.

use crate::GameConfig;
use crate::board::{Board, BoardConfig};
use crate::grid::Position;
use crate::input::{Action, key_to_action};
use crate::swipe::{SwipeDirection, SwipeOutcome};
use crate::theme::Theme;
use crate::token::{Catalog, TokenKind};
use crate::ui::{self, Effects, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct App {
    board_config: BoardConfig,
    config: GameConfig,
    theme: Theme,
    board: Board,
    cursor: Position,
    selected: Option<Position>,
    paused: bool,
    effects: Effects,
    /// Mouse press: board cell and terminal cell it started on.
    drag_start: Option<(Position, u16, u16)>,
    /// Board rect from the last draw, for mapping mouse coordinates.
    board_rect: Rect,
    last_frame: Instant,
}

impl App {
    pub fn new(board_config: BoardConfig, config: GameConfig, theme: Theme) -> Result<Self> {
        let board = new_board(&board_config, &config)?;
        Ok(Self {
            board_config,
            config,
            theme,
            board,
            cursor: Position::new(0, 0),
            selected: None,
            paused: false,
            effects: Effects::default(),
            drag_start: None,
            board_rect: Rect::default(),
            last_frame: Instant::now(),
        })
    }

    fn reset_game(&mut self) -> Result<()> {
        self.board = new_board(&self.board_config, &self.config)?;
        self.selected = None;
        self.paused = false;
        self.drag_start = None;
        self.effects.clear();
        self.last_frame = Instant::now();
        Ok(())
    }

    /// Swipe the drop at `source` and follow it with the cursor when the swap starts.
    fn swipe(&mut self, source: Position, vector: (f32, f32)) -> Result<()> {
        let outcome = self.board.on_swipe(source, vector)?;
        debug!(%source, ?vector, ?outcome, "swipe");
        match outcome {
            SwipeOutcome::Started { target, .. } => {
                self.cursor = target;
                self.selected = None;
            }
            SwipeOutcome::Tap => self.cursor = source,
            SwipeOutcome::Ignored => self.selected = None,
            SwipeOutcome::Busy => {}
        }
        Ok(())
    }

    fn move_cursor(&mut self, dir: SwipeDirection) {
        if let Some(next) = dir.target(self.cursor, self.board.grid()) {
            self.cursor = next;
        }
    }

    /// Returns false when the app should exit.
    fn apply_action(&mut self, action: Action) -> Result<bool> {
        if self.paused {
            match action {
                Action::Pause => self.paused = false,
                Action::Quit => return Ok(false),
                _ => {}
            }
            return Ok(true);
        }
        match action {
            Action::Quit => return Ok(false),
            Action::Pause => self.paused = true,
            Action::Restart => self.reset_game()?,
            Action::Select => {
                self.selected = match self.selected {
                    Some(_) => None,
                    None => Some(self.cursor),
                }
            }
            Action::MoveCursor(dir) => match self.selected {
                Some(source) => self.swipe(source, dir.vector())?,
                None => self.move_cursor(dir),
            },
            Action::Swipe(dir) => self.swipe(self.cursor, dir.vector())?,
            Action::None => {}
        }
        Ok(true)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        if self.paused {
            return Ok(());
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.drag_start =
                    ui::cell_at(self.board_rect, self.board.grid(), mouse.column, mouse.row)
                    .map(|pos| (pos, mouse.column, mouse.row));
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some((source, x0, y0)) = self.drag_start.take() {
                    self.swipe(source, drag_vector((x0, y0), (mouse.column, mouse.row)))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), DisableMouseCapture);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.config.frame_rate.max(1.0));
        self.last_frame = Instant::now();
        loop {
            let now = Instant::now();
            let dt = now.saturating_duration_since(self.last_frame);
            self.last_frame = now;
            if !self.paused {
                self.board.advance(dt)?;
            }
            let events = self.board.take_events();
            if !self.config.no_animation && !events.is_empty() {
                let timings = self.board.timings();
                self.effects.queue(&events, timings.destroy, timings.fall);
            }

            let mut board_rect = self.board_rect;
            terminal.draw(|f| {
                let view = View {
                    board: &self.board,
                    theme: &self.theme,
                    cursor: self.cursor,
                    selected: self.selected,
                    paused: self.paused,
                };
                let area = f.area();
                board_rect = ui::board_rect(area, self.board.grid());
                ui::draw(f, &view, &mut self.effects, area, now);
            })?;
            self.board_rect = board_rect;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if !self.apply_action(key_to_action(key))? {
                                info!(stats = ?self.board.stats(), "quit");
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse)?,
                        _ => {}
                    }
                }
            }
        }
    }
}

fn new_board(board_config: &BoardConfig, config: &GameConfig) -> Result<Board> {
    let seed = config.seed.unwrap_or_else(rand::random);
    let catalog = Catalog::new(TokenKind::catalog(config.high_color), seed);
    let board = Board::new(board_config.clone(), catalog)?;
    info!(seed, high_color = config.high_color, "new board");
    Ok(board)
}

/// Terminal drag to a swipe vector in board units (x right, y up).
fn drag_vector(from: (u16, u16), to: (u16, u16)) -> (f32, f32) {
    let dx = (to.0 as f32 - from.0 as f32) / 2.0;
    let dy = from.1 as f32 - to.1 as f32;
    (dx, dy)
}
