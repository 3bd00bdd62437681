//! Dropswap: match-3 drop-swapping puzzle in the terminal.

mod app;
mod board;
mod error;
mod grid;
mod input;
mod matcher;
mod pool;
mod swipe;
mod theme;
mod token;
mod ui;

use anyhow::{Context, Result};
use app::App;
use board::{BoardConfig, Timings};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Largest board side the terminal front end draws.
const MAX_BOARD_SIDE: i64 = 256;

/// Front-end options (drawing and pacing); board rules live in BoardConfig.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub high_color: bool,
    pub no_animation: bool,
    pub frame_rate: f64,
    /// Fixed seed, or None for a fresh random board every restart.
    pub seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_ref(), &args.log_level)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let board_config = args.board_config();
    board_config.validate()?;
    let config = GameConfig {
        high_color: args.high_color,
        no_animation: args.no_animation,
        frame_rate: args.frame_rate,
        seed: args.seed,
    };
    let mut app = App::new(board_config, config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal owns stdout, so logs only go to a file.
fn init_tracing(path: Option<&PathBuf>, level: &str) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dropswap starting");
    Ok(())
}

/// Match-3 puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "dropswap",
    version,
    about = "Match-3 puzzle in the terminal. Swap neighbouring drops to line up three of a kind.",
    long_about = "Dropswap is a terminal match-3 board.\n\n\
        Swap two neighbouring drops to line up three or more of the same colour. Matched \
        drops are destroyed, the drops above fall, new drops fall in from the top, and \
        any new lines resolve as cascades. A swap that makes no line is undone.\n\n\
        CONTROLS:\n  Arrows / hjkl      Move cursor\n  Shift+Arrows / HJKL  Swipe the drop under the cursor\n  \
        Space / Enter      Select; the next direction swipes\n  Mouse drag         Swipe a drop\n  \
        P  Pause    R  New board    Q / Esc  Quit"
)]
pub struct Args {
    /// Board width in columns (1-256).
    #[arg(long, default_value = "8", value_name = "COLS", value_parser = clap::value_parser!(u16).range(1..=MAX_BOARD_SIDE))]
    pub width: u16,

    /// Board height in rows (1-256).
    #[arg(long, default_value = "8", value_name = "ROWS", value_parser = clap::value_parser!(u16).range(1..=MAX_BOARD_SIDE))]
    pub height: u16,

    /// Use 6 drop colours (adds magenta, cyan) instead of 4 (green, yellow, red, blue).
    #[arg(long)]
    pub high_color: bool,

    /// Seed for the drop dealer; the same seed deals the same board.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Comma-separated column indices that never spawn drops (they start and stay empty).
    #[arg(long, value_delimiter = ',', value_name = "COLS")]
    pub closed_columns: Vec<usize>,

    /// Rows above the board new drops fall in from.
    #[arg(long, default_value = "2", value_name = "ROWS")]
    pub spawn_offset: usize,

    /// Drop pool capacity. Defaults to width * height.
    #[arg(long, value_name = "N")]
    pub pool_capacity: Option<usize>,

    /// Swap animation time in ms (the swap is judged after this).
    #[arg(long, default_value = "500", value_name = "MS")]
    pub swap_ms: u64,

    /// Destroy animation time in ms.
    #[arg(long, default_value = "200", value_name = "MS")]
    pub destroy_ms: u64,

    /// Fall time in ms after compaction and after refill.
    #[arg(long, default_value = "300", value_name = "MS")]
    pub fall_ms: u64,

    /// Destroy cycles one swap may trigger before the board is forced to settle.
    #[arg(long, default_value_t = board::DEFAULT_MAX_CASCADE_DEPTH, value_name = "N")]
    pub max_cascade_depth: u32,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Skip destroy/spawn effects and all animation waits.
    #[arg(long)]
    pub no_animation: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Write engine logs to this file (stdout belongs to the board).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, dropswap=trace).
    #[arg(long, default_value = "debug", value_name = "FILTER")]
    pub log_level: String,
}

impl Args {
    pub fn board_config(&self) -> BoardConfig {
        let width = self.width as usize;
        let mut config = BoardConfig::new(width, self.height as usize);
        config.spawn_columns = (0..width)
            .map(|c| !self.closed_columns.contains(&c))
            .collect();
        config.spawn_offset = self.spawn_offset;
        config.pool_capacity = self.pool_capacity;
        config.max_cascade_depth = self.max_cascade_depth;
        config.timings = if self.no_animation {
            Timings::INSTANT
        } else {
            Timings {
                swap: Duration::from_millis(self.swap_ms),
                destroy: Duration::from_millis(self.destroy_ms),
                fall: Duration::from_millis(self.fall_ms),
            }
        };
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
