//! Swipe classification: vector -> direction -> neighbouring cell.

use crate::grid::{Grid, Position};

/// Minimum travel along one axis (board units) before a touch counts as a swipe.
pub const DEFAULT_SWIPE_RESIST: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Right,
    Up,
    Left,
    Down,
}

impl SwipeDirection {
    /// Unit swipe vector for keyboard-driven swipes.
    pub fn vector(self) -> (f32, f32) {
        match self {
            Self::Right => (1.0, 0.0),
            Self::Up => (0.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Down => (0.0, -1.0),
        }
    }

    /// Neighbour of `from` in this direction, if it is on the grid.
    pub fn target(self, from: Position, grid: &Grid) -> Option<Position> {
        let Position { column, row } = from;
        let to = match self {
            Self::Right => Position::new(column + 1, row),
            Self::Up => Position::new(column, row + 1),
            Self::Left => Position::new(column.checked_sub(1)?, row),
            Self::Down => Position::new(column, row.checked_sub(1)?),
        };
        grid.contains(to).then_some(to)
    }
}

/// Swipe angle in degrees, (-180, 180].
pub fn angle_degrees(dx: f32, dy: f32) -> f32 {
    dy.atan2(dx).to_degrees()
}

/// True once the vector leaves the tap dead zone on either axis.
pub fn exceeds_resist(dx: f32, dy: f32, resist: f32) -> bool {
    dx.abs() > resist || dy.abs() > resist
}

/// 90° sectors centred on each axis; boundaries at ±45° and ±135°.
pub fn classify(dx: f32, dy: f32) -> SwipeDirection {
    let angle = angle_degrees(dx, dy);
    if angle > -45.0 && angle <= 45.0 {
        SwipeDirection::Right
    } else if angle > 45.0 && angle <= 135.0 {
        SwipeDirection::Up
    } else if angle > 135.0 || angle <= -135.0 {
        SwipeDirection::Left
    } else {
        SwipeDirection::Down
    }
}

/// What `Board::on_swipe` did with a swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeOutcome {
    /// Swap started; the board is `Waiting` until it resolves.
    Started { source: Position, target: Position },
    /// Too short to be a swipe.
    Tap,
    /// Direction leaves the grid or points at an empty cell.
    Ignored,
    /// Another swap or cascade is still in flight.
    Busy,
}
