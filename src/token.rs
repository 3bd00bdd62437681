//! Token catalog: drop kinds and the random source that deals them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Drop kinds. The default catalog uses the first four; high colour mode uses all six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Green,
    Yellow,
    Red,
    Blue,
    Magenta,
    Cyan,
}

impl TokenKind {
    pub const ALL: [Self; 6] = [
        Self::Green,
        Self::Yellow,
        Self::Red,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
    ];

    /// Colour index 0..6 for theme.token_color().
    pub fn color_index(&self) -> u8 {
        match self {
            Self::Green => 0,
            Self::Yellow => 1,
            Self::Red => 2,
            Self::Blue => 3,
            Self::Magenta => 4,
            Self::Cyan => 5,
        }
    }

    /// Kinds in play: 4 (green, yellow, red, blue) or 6 with high colour.
    pub fn catalog(high_color: bool) -> &'static [Self] {
        if high_color { &Self::ALL } else { &Self::ALL[..4] }
    }
}

/// Anything that can deal a token kind for a new drop.
pub trait TokenSource {
    fn random_kind(&mut self) -> TokenKind;
}

/// Seeded catalog: uniform over its configured kinds.
#[derive(Debug, Clone)]
pub struct Catalog {
    kinds: Vec<TokenKind>,
    rng: StdRng,
    seed: u64,
}

impl Catalog {
    pub fn new(kinds: &[TokenKind], seed: u64) -> Self {
        let kinds = if kinds.is_empty() {
            TokenKind::catalog(false).to_vec()
        } else {
            kinds.to_vec()
        };
        Self {
            kinds,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn kinds(&self) -> &[TokenKind] {
        &self.kinds
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl TokenSource for Catalog {
    fn random_kind(&mut self) -> TokenKind {
        self.kinds[self.rng.gen_range(0..self.kinds.len())]
    }
}
