//! Layout and drawing: board, sidebar, pause overlay, destroy fades and falling drops.

use crate::board::{Board, BoardEvent, BoardState};
use crate::grid::{Grid, Position};
use crate::theme::Theme;
use crate::token::TokenKind;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position as ScreenPos, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each drop is two terminal cells wide so the board reads roughly square.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;
const SIDEBAR_HEIGHT: u16 = 22;

/// Everything `draw` needs for one frame.
pub struct View<'a> {
    pub board: &'a Board,
    pub theme: &'a Theme,
    pub cursor: Position,
    /// Drop picked up with Select; the next direction swipes it.
    pub selected: Option<Position>,
    pub paused: bool,
}

/// Playfield size in terminal cells (border + grid).
fn playfield_pixel_size(grid: &Grid) -> (u16, u16) {
    (
        (grid.width() as u16).saturating_mul(CELL_WIDTH).saturating_add(2),
        (grid.height() as u16).saturating_add(2),
    )
}

/// Playfield and sidebar rects, centred in `area`.
fn game_layout(area: Rect, grid: &Grid) -> (Rect, Rect) {
    let (pw, ph) = playfield_pixel_size(grid);
    let total_w = pw.saturating_add(SIDEBAR_WIDTH);
    let total_h = ph.max(SIDEBAR_HEIGHT);

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert_chunks[1]);
    let playfield = Rect {
        height: ph.min(inner[0].height),
        ..inner[0]
    };
    (playfield, inner[1])
}

/// Board inner rect (grid only, no border) for the given frame area.
pub fn board_rect(area: Rect, grid: &Grid) -> Rect {
    let (playfield, _) = game_layout(area, grid);
    Rect {
        x: playfield.x + 1,
        y: playfield.y + 1,
        width: (grid.width() as u16).saturating_mul(CELL_WIDTH).min(playfield.width.saturating_sub(2)),
        height: (grid.height() as u16).min(playfield.height.saturating_sub(2)),
    }
}

/// Board cell under terminal cell (x, y). Row 0 is the bottom screen row.
pub fn cell_at(board_rect: Rect, grid: &Grid, x: u16, y: u16) -> Option<Position> {
    if !board_rect.contains(ScreenPos::new(x, y)) {
        return None;
    }
    let column = ((x - board_rect.x) / CELL_WIDTH) as usize;
    let row = grid.height().checked_sub(1 + (y - board_rect.y) as usize)?;
    let pos = Position::new(column, row);
    grid.contains(pos).then_some(pos)
}

/// Screen rect of a board cell, if it is inside the visible board.
fn cell_rect(board_rect: Rect, grid: &Grid, pos: Position) -> Option<Rect> {
    let from_top = grid.height().checked_sub(pos.row + 1)? as u16;
    let r = Rect {
        x: board_rect.x + pos.column as u16 * CELL_WIDTH,
        y: board_rect.y + from_top,
        width: CELL_WIDTH,
        height: 1,
    };
    (r.right() <= board_rect.right() && r.bottom() <= board_rect.bottom()).then_some(r)
}

fn buffer_positions(board_rect: Rect, grid: &Grid, cells: &[Position]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &pos in cells {
        if let Some(r) = cell_rect(board_rect, grid, pos) {
            for x in r.left()..r.right() {
                set.insert((x, r.y));
            }
        }
    }
    set
}

/// A drop sliding down to `to`, starting `from_row` (which may be above the board).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fall {
    to: Position,
    from_row: usize,
    elapsed: Duration,
}

/// Row a falling drop is drawn on after `elapsed` of `duration`. Accelerates like gravity.
fn fall_row(from_row: usize, to_row: usize, elapsed: Duration, duration: Duration) -> usize {
    if duration.is_zero() || elapsed >= duration || from_row <= to_row {
        return to_row;
    }
    let t = elapsed.as_secs_f32() / duration.as_secs_f32();
    let distance = (from_row - to_row) as f32;
    to_row + (distance * (1.0 - t * t)).round() as usize
}

/// Animations driven by board events.
///
/// Destroyed drops are already off the grid, so they are kept here as ghosts
/// and faded to the background. Spawned drops fall in from their spawn row
/// above the board and compacted drops fall from their old row, both over the
/// board's fall time.
#[derive(Default)]
pub struct Effects {
    queued_destroyed: Vec<(Position, TokenKind)>,
    destroy_ms: u32,
    running: Vec<(Effect, Vec<(Position, TokenKind)>)>,
    falls: Vec<Fall>,
    fall_duration: Duration,
    last_process: Option<Instant>,
}

impl Effects {
    pub fn queue(&mut self, events: &[BoardEvent], destroy: Duration, fall: Duration) {
        self.destroy_ms = destroy.as_millis().min(u32::MAX as u128) as u32;
        self.fall_duration = fall;
        for event in events {
            match event {
                BoardEvent::Destroyed { position, kind } => {
                    self.queued_destroyed.push((*position, *kind));
                }
                BoardEvent::Spawned {
                    position, from_row, ..
                } => self.start_fall(*position, *from_row),
                BoardEvent::Fell { from, to } => self.start_fall(*to, from.row),
                _ => {}
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn start_fall(&mut self, to: Position, from_row: usize) {
        if self.fall_duration.is_zero() {
            return;
        }
        self.falls.retain(|f| f.to != to);
        self.falls.push(Fall {
            to,
            from_row,
            elapsed: Duration::ZERO,
        });
    }

    fn tick_falls(&mut self, dt: Duration) {
        for fall in &mut self.falls {
            fall.elapsed += dt;
        }
        let duration = self.fall_duration;
        self.falls.retain(|f| f.elapsed < duration);
    }

    /// Row the drop headed for `to` is drawn on, while it is still falling.
    fn falling_row(&self, to: Position) -> Option<usize> {
        self.falls
            .iter()
            .find(|f| f.to == to)
            .map(|f| fall_row(f.from_row, to.row, f.elapsed, self.fall_duration))
    }

    /// Build queued fades against the current board rect and drop the finished ones.
    fn start_queued(&mut self, board_rect: Rect, grid: &Grid, bg: Color) {
        if !self.queued_destroyed.is_empty() && self.destroy_ms > 0 {
            let ghosts = std::mem::take(&mut self.queued_destroyed);
            let cells: Vec<Position> = ghosts.iter().map(|&(p, _)| p).collect();
            let set = buffer_positions(board_rect, grid, &cells);
            let effect = fx::fade_to(bg, bg, (self.destroy_ms, Interpolation::Linear))
                .with_filter(CellFilter::PositionFn(ref_count(move |pos: ScreenPos| {
                    set.contains(&(pos.x, pos.y))
                })))
                .with_area(board_rect);
            self.running.push((effect, ghosts));
        }
        self.queued_destroyed.clear();
        self.running.retain(|(effect, _)| !effect.done());
    }
}

/// Draw the game screen, pause overlay and running effects.
pub fn draw(frame: &mut Frame, view: &View, effects: &mut Effects, area: Rect, now: Instant) {
    let grid = view.board.grid();
    let (playfield_area, sidebar_area) = game_layout(area, grid);
    let board_area = board_rect(area, grid);

    let delta = if view.paused {
        Duration::ZERO
    } else {
        effects
            .last_process
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO)
    };
    effects.last_process = Some(now);
    effects.tick_falls(delta);
    effects.start_queued(board_area, grid, view.theme.bg);

    draw_playfield(frame, view, playfield_area, board_area, effects);
    draw_sidebar(frame, view, sidebar_area);

    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u32::MAX as u128) as u32);
    for (effect, _) in &mut effects.running {
        frame.render_effect(effect, board_area, tfx_delta);
    }

    if view.paused {
        draw_pause_overlay(frame, view.theme, area);
    }
}

fn put_cell(buf: &mut Buffer, r: Rect, symbol: &str, style: Style) {
    for (i, ch) in symbol.chars().enumerate() {
        let x = r.x + i as u16;
        if x < r.right() {
            buf[(x, r.y)].set_symbol(&ch.to_string()).set_style(style);
        }
    }
}

fn draw_playfield(frame: &mut Frame, view: &View, area: Rect, board_area: Rect, effects: &Effects) {
    let theme = view.theme;
    let board = view.board;
    let grid = board.grid();
    let title = format!(" Dropswap  | Destroyed: {} ", board.stats().destroyed);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    block.render(area, frame.buffer_mut());

    let ghosts: Vec<(Position, TokenKind)> = effects
        .running
        .iter()
        .flat_map(|(_, g)| g.iter().copied())
        .collect();
    // Drops still in flight: drawn after the grid, on their current row.
    let mut in_flight: Vec<(Position, Style)> = Vec::new();
    let buf = frame.buffer_mut();
    for pos in grid.positions() {
        let Some(r) = cell_rect(board_area, grid, pos) else {
            continue;
        };
        let open = board.spawn_columns()[pos.column];
        let mut drop = grid.get(pos).ok().flatten();
        if let (Some(d), Some(row)) = (drop, effects.falling_row(pos)) {
            if row != pos.row {
                let c = theme.token_color(d.kind());
                in_flight.push((Position::new(pos.column, row), Style::default().fg(c).bg(c)));
                drop = None;
            }
        }
        let (symbol, mut style) = match drop {
            Some(d) if d.is_matched() => (
                "▓▓",
                Style::default()
                    .fg(theme.token_color(d.kind()))
                    .bg(Color::White),
            ),
            Some(d) => {
                let c = theme.token_color(d.kind());
                ("██", Style::default().fg(c).bg(c))
            }
            None => match ghosts.iter().find(|(p, _)| *p == pos) {
                Some(&(_, kind)) => {
                    let c = theme.token_color(kind);
                    ("██", Style::default().fg(c).bg(c))
                }
                None if open => ("  ", Style::default().bg(theme.bg)),
                None => ("··", Style::default().fg(theme.inactive_fg).bg(theme.bg)),
            },
        };
        let marker = if view.selected == Some(pos) {
            Some("[]")
        } else if view.cursor == pos {
            Some("<>")
        } else {
            None
        };
        let symbol = marker.unwrap_or(symbol);
        if marker.is_some() {
            style = style.fg(theme.title).add_modifier(Modifier::BOLD);
        }
        put_cell(buf, r, symbol, style);
    }
    // Rows above the board have no cell rect and stay hidden until the drop enters.
    for (pos, style) in in_flight {
        if let Some(r) = cell_rect(board_area, grid, pos) {
            put_cell(buf, r, "██", style);
        }
    }
}

fn sidebar_block_style(theme: &Theme) -> Style {
    Style::default().fg(theme.div_line).bg(theme.bg)
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let board = view.board;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = sidebar_block_style(theme);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Board (state, cascade, seed)
            Constraint::Length(1), // gap
            Constraint::Length(6), // Stats
            Constraint::Length(1), // gap
            Constraint::Length(4), // Pool gauge
            Constraint::Length(1), // gap
            Constraint::Length(4), // Colours
        ])
        .split(area);

    // --- Board ---
    let state_color = match board.state() {
        BoardState::Waiting => Color::Yellow,
        BoardState::Continue => Color::Green,
    };
    let state_lines = vec![
        Line::from(vec![
            Span::styled("State: ", title_style),
            Span::styled(board.state().to_string(), Style::default().fg(state_color)),
        ]),
        Line::from(vec![
            Span::styled("Cascade: ", title_style),
            Span::styled(board.cascade_depth().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Seed: ", title_style),
            Span::styled(board.source().seed().to_string(), fg_style),
        ]),
    ];
    section(frame, chunks[0], border_style, state_lines);

    // --- Stats ---
    let stats = board.stats();
    let stat = |label: &'static str, value: u32| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value.to_string(), fg_style),
        ])
    };
    section(
        frame,
        chunks[2],
        border_style,
        vec![
            stat("Swaps: ", stats.swaps),
            stat("Reverts: ", stats.reverts),
            stat("Cascades: ", stats.cascades),
            stat("Destroyed: ", stats.destroyed),
        ],
    );

    // --- Pool ---
    let pool = board.pool();
    let pool_inner = section(
        frame,
        chunks[4],
        border_style,
        vec![Line::from(Span::styled(
            format!("Pool {}/{}", pool.active_count(), pool.capacity()),
            title_style,
        ))],
    );
    let ratio = if pool.capacity() == 0 {
        0.0
    } else {
        (pool.active_count() as f64 / pool.capacity() as f64).clamp(0.0, 1.0)
    };
    let gauge_area = Rect {
        y: pool_inner.y + 1,
        height: pool_inner.height.saturating_sub(1).min(1),
        ..pool_inner
    };
    Gauge::default()
        .ratio(ratio)
        .label("")
        .gauge_style(Style::default().fg(theme.title).bg(theme.bg))
        .render(gauge_area, frame.buffer_mut());

    // --- Colours ---
    let colours_inner = section(
        frame,
        chunks[6],
        border_style,
        vec![Line::from(Span::styled("Colours", title_style))],
    );
    let strip = Rect {
        y: colours_inner.y + 1,
        height: colours_inner.height.saturating_sub(1).min(1),
        ..colours_inner
    };
    draw_colour_strip(frame, theme, board.source().kinds(), strip);
}

/// Bordered sidebar section; returns the inner rect.
fn section(frame: &mut Frame, area: Rect, border_style: Style, lines: Vec<Line>) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());
    Paragraph::new(lines).render(inner, frame.buffer_mut());
    inner
}

/// One coloured block per kind in play.
fn draw_colour_strip(frame: &mut Frame, theme: &Theme, kinds: &[TokenKind], area: Rect) {
    let block_w = (area.width / kinds.len().max(1) as u16).max(1);
    for (i, &kind) in kinds.iter().enumerate() {
        let r = Rect {
            x: area.x + i as u16 * block_w,
            y: area.y,
            width: block_w.min(area.right().saturating_sub(area.x + i as u16 * block_w)),
            height: area.height,
        };
        let c = theme.token_color(kind);
        Paragraph::new("█".repeat(block_w as usize))
            .style(Style::default().fg(c).bg(c))
            .render(r, frame.buffer_mut());
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}
