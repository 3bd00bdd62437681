//! Grid model: the authoritative column-major array of drops.
//!
//! Row 0 is the bottom row; gravity pulls towards it. A drop stores its own
//! (column, row) and every method that moves a drop rewrites both sides.

use crate::error::BoardError;
use crate::token::TokenKind;
use std::fmt;

/// Grid coordinate. Column grows to the right, row grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub column: usize,
    pub row: usize,
}

impl Position {
    pub const fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Identity of a drop: the pool that owns it and its slot there. Stable across recycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DropId {
    pub pool: u32,
    pub slot: u32,
}

impl DropId {
    pub const fn new(pool: u32, slot: u32) -> Self {
        Self { pool, slot }
    }
}

impl fmt::Display for DropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.pool, self.slot)
    }
}

/// A grid-resident token. Not `Clone`: a drop lives in one cell or in the pool, never both.
#[derive(Debug, PartialEq, Eq)]
pub struct Drop {
    id: DropId,
    column: usize,
    row: usize,
    kind: TokenKind,
    matched: bool,
}

impl Drop {
    pub(crate) fn new(id: DropId, kind: TokenKind, position: Position) -> Self {
        Self {
            id,
            column: position.column,
            row: position.row,
            kind,
            matched: false,
        }
    }

    pub fn id(&self) -> DropId {
        self.id
    }

    pub fn position(&self) -> Position {
        Position::new(self.column, self.row)
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    pub(crate) fn mark_matched(&mut self) {
        self.matched = true;
    }

    pub(crate) fn clear_matched(&mut self) {
        self.matched = false;
    }

    /// Re-deal a recycled drop.
    pub(crate) fn reset(&mut self, kind: TokenKind, position: Position) {
        self.kind = kind;
        self.matched = false;
        self.place(position);
    }

    fn place(&mut self, position: Position) {
        self.column = position.column;
        self.row = position.row;
    }

    pub fn snapshot(&self) -> DropSnapshot {
        DropSnapshot {
            id: self.id,
            position: self.position(),
            kind: self.kind,
            matched: self.matched,
        }
    }
}

/// Copyable view of a drop, for comparing whole grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropSnapshot {
    pub id: DropId,
    pub position: Position,
    pub kind: TokenKind,
    pub matched: bool,
}

#[derive(Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    /// cells[column * height + row]
    cells: Vec<Option<Drop>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        let cells = (0..width * height).map(|_| None).collect();
        Self {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.column < self.width && pos.row < self.height
    }

    fn index(&self, pos: Position) -> Result<usize, BoardError> {
        if !self.contains(pos) {
            return Err(BoardError::OutOfBounds {
                column: pos.column,
                row: pos.row,
                width: self.width,
                height: self.height,
            });
        }
        Ok(pos.column * self.height + pos.row)
    }

    pub fn get(&self, pos: Position) -> Result<Option<&Drop>, BoardError> {
        let i = self.index(pos)?;
        Ok(self.cells[i].as_ref())
    }

    pub fn get_mut(&mut self, pos: Position) -> Result<Option<&mut Drop>, BoardError> {
        let i = self.index(pos)?;
        Ok(self.cells[i].as_mut())
    }

    /// Kind at `pos`, or None when empty or outside the grid.
    #[inline]
    pub fn kind_at(&self, pos: Position) -> Option<TokenKind> {
        self.get(pos).ok().flatten().map(Drop::kind)
    }

    /// Store `drop` (or empty) at `pos` and return the previous occupant.
    pub fn set(&mut self, pos: Position, drop: Option<Drop>) -> Result<Option<Drop>, BoardError> {
        let i = self.index(pos)?;
        let drop = drop.map(|mut d| {
            d.place(pos);
            d
        });
        Ok(std::mem::replace(&mut self.cells[i], drop))
    }

    pub fn take(&mut self, pos: Position) -> Result<Option<Drop>, BoardError> {
        self.set(pos, None)
    }

    /// Exchange two cells (either may be empty) and rewrite the moved drops' coordinates.
    pub fn swap(&mut self, a: Position, b: Position) -> Result<(), BoardError> {
        let ia = self.index(a)?;
        let ib = self.index(b)?;
        self.cells.swap(ia, ib);
        if let Some(d) = self.cells[ia].as_mut() {
            d.place(a);
        }
        if let Some(d) = self.cells[ib].as_mut() {
            d.place(b);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Drop> {
        self.cells.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Drop> {
        self.cells.iter_mut().flatten()
    }

    /// All cell positions, column-major, row ascending.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let (w, h) = (self.width, self.height);
        (0..w).flat_map(move |c| (0..h).map(move |r| Position::new(c, r)))
    }

    pub fn occupied_count(&self) -> usize {
        self.iter().count()
    }

    /// Every drop's stored coordinates match the cell holding it.
    pub fn is_consistent(&self) -> bool {
        self.positions()
            .zip(self.cells.iter())
            .all(|(pos, cell)| cell.as_ref().is_none_or(|d| d.position() == pos))
    }

    pub fn snapshot(&self) -> Vec<Option<DropSnapshot>> {
        self.cells.iter().map(|c| c.as_ref().map(Drop::snapshot)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_at(id: u32, kind: TokenKind, c: usize, r: usize) -> Drop {
        Drop::new(DropId::new(0, id), kind, Position::new(c, r))
    }

    #[test]
    fn new_grid_is_empty() {
        let grid = Grid::new(3, 4);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.occupied_count(), 0);
        for pos in grid.positions() {
            assert_eq!(grid.get(pos), Ok(None));
        }
    }

    #[test]
    fn get_and_set_out_of_bounds_report_error() {
        let mut grid = Grid::new(3, 4);
        let err = BoardError::OutOfBounds {
            column: 3,
            row: 0,
            width: 3,
            height: 4,
        };
        assert_eq!(grid.get(Position::new(3, 0)).unwrap_err(), err);
        assert!(grid.get(Position::new(0, 4)).is_err());
        let res = grid.set(Position::new(3, 0), Some(drop_at(0, TokenKind::Red, 0, 0)));
        assert_eq!(res.unwrap_err(), err);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn set_rewrites_coordinates_and_returns_previous() {
        let mut grid = Grid::new(3, 3);
        let prev = grid
            .set(Position::new(2, 1), Some(drop_at(0, TokenKind::Red, 0, 0)))
            .unwrap();
        assert!(prev.is_none());
        let d = grid.get(Position::new(2, 1)).unwrap().unwrap();
        assert_eq!(d.position(), Position::new(2, 1));

        let prev = grid
            .set(Position::new(2, 1), Some(drop_at(1, TokenKind::Blue, 0, 0)))
            .unwrap();
        assert_eq!(prev.map(|d| d.id()), Some(DropId::new(0, 0)));
        assert!(grid.is_consistent());
    }

    #[test]
    fn swap_updates_both_drops() {
        let mut grid = Grid::new(2, 2);
        let a = Position::new(0, 0);
        let b = Position::new(1, 0);
        grid.set(a, Some(drop_at(0, TokenKind::Red, 0, 0))).unwrap();
        grid.set(b, Some(drop_at(1, TokenKind::Blue, 0, 0))).unwrap();

        grid.swap(a, b).unwrap();
        assert_eq!(grid.kind_at(a), Some(TokenKind::Blue));
        assert_eq!(grid.kind_at(b), Some(TokenKind::Red));
        assert_eq!(grid.get(a).unwrap().unwrap().position(), a);
        assert_eq!(grid.get(b).unwrap().unwrap().position(), b);
        assert!(grid.is_consistent());
    }

    #[test]
    fn swap_with_empty_cell_moves_drop() {
        let mut grid = Grid::new(1, 3);
        let top = Position::new(0, 2);
        let bottom = Position::new(0, 0);
        grid.set(top, Some(drop_at(0, TokenKind::Green, 0, 0))).unwrap();
        grid.swap(top, bottom).unwrap();
        assert_eq!(grid.get(top), Ok(None));
        assert_eq!(grid.get(bottom).unwrap().unwrap().position(), bottom);
    }

    #[test]
    fn swap_out_of_bounds_leaves_grid_untouched() {
        let mut grid = Grid::new(2, 2);
        grid.set(Position::new(1, 1), Some(drop_at(0, TokenKind::Green, 0, 0)))
            .unwrap();
        let before = grid.snapshot();
        assert!(grid.swap(Position::new(1, 1), Position::new(2, 1)).is_err());
        assert_eq!(grid.snapshot(), before);
    }
}
