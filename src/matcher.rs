//! Match detection: local three-in-a-row test around every interior cell.

use crate::grid::{Grid, Position};
use crate::token::TokenKind;

/// Every cell that belongs to a horizontal or vertical triple of equal kind.
///
/// Only interior cells are tested as centres; edge cells are reported as
/// members of a neighbouring centre's triple. Longer straight runs come out
/// complete because each interior member passes the test on its own.
/// Positions may repeat.
fn triple_members(grid: &Grid) -> Vec<Position> {
    let (w, h) = (grid.width(), grid.height());
    let mut hits: Vec<Position> = Vec::new();

    for pos in grid.positions() {
        let Some(kind) = grid.kind_at(pos) else {
            continue;
        };
        let (c, r) = (pos.column, pos.row);
        if c > 0 && c + 1 < w {
            let left = Position::new(c - 1, r);
            let right = Position::new(c + 1, r);
            if grid.kind_at(left) == Some(kind) && grid.kind_at(right) == Some(kind) {
                hits.extend([left, pos, right]);
            }
        }
        if r > 0 && r + 1 < h {
            let down = Position::new(c, r - 1);
            let up = Position::new(c, r + 1);
            if grid.kind_at(down) == Some(kind) && grid.kind_at(up) == Some(kind) {
                hits.extend([down, pos, up]);
            }
        }
    }
    hits
}

/// Mark every drop in a triple. Marks are never cleared here.
/// Returns the number of marked drops on the grid.
pub fn scan(grid: &mut Grid) -> usize {
    for pos in triple_members(grid) {
        if let Ok(Some(d)) = grid.get_mut(pos) {
            d.mark_matched();
        }
    }
    grid.iter().filter(|d| d.is_matched()).count()
}

/// A triple is on the grid, whether or not it has been marked.
#[cfg(test)]
pub fn has_triple(grid: &Grid) -> bool {
    !triple_members(grid).is_empty()
}

pub fn has_any_match(grid: &Grid) -> bool {
    grid.iter().any(|d| d.is_matched())
}

pub fn matched_positions(grid: &Grid) -> Vec<Position> {
    grid.iter()
        .filter(|d| d.is_matched())
        .map(|d| d.position())
        .collect()
}

pub fn clear_marks(grid: &mut Grid) {
    for d in grid.iter_mut() {
        d.clear_matched();
    }
}

/// Would placing `kind` at `pos` finish a triple with the two cells to the left or the two below?
///
/// Only predecessors in fill order (column-major, row ascending) are consulted.
pub fn would_match(grid: &Grid, pos: Position, kind: TokenKind) -> bool {
    let (c, r) = (pos.column, pos.row);
    let same = |col: usize, row: usize| grid.kind_at(Position::new(col, row)) == Some(kind);
    (c > 1 && same(c - 1, r) && same(c - 2, r)) || (r > 1 && same(c, r - 1) && same(c, r - 2))
}
