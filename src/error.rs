//! Board engine errors. All of them mean a misconfigured board or a coordinate bug.

use crate::grid::DropId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("cell ({column}, {row}) is outside the {width}x{height} grid")]
    OutOfBounds {
        column: usize,
        row: usize,
        width: usize,
        height: usize,
    },
    #[error("drop pool exhausted: all {capacity} drops are active")]
    PoolExhausted { capacity: usize },
    #[error("drop {id} is not active in this pool")]
    InvalidRelease { id: DropId },
    #[error("invalid board config: {0}")]
    InvalidConfig(String),
}
