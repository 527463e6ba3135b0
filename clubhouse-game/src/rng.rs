//! Deterministic RNG streams segregated by engine domain.
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;
use std::cell::{RefCell, RefMut};

use crate::constants::{RNG_DOMAIN_BOARD, RNG_DOMAIN_CARDS, RNG_DOMAIN_EVENTS};

/// Deterministic bundle of RNG streams segregated by simulation domain.
///
/// Streams are derived from the save seed plus the school year and turn, so
/// a save reloaded mid-season draws exactly what an uninterrupted session
/// would have drawn.
#[derive(Debug, Clone)]
pub struct RngBundle {
    cards: RefCell<CountingRng<SmallRng>>,
    board: RefCell<CountingRng<SmallRng>>,
    events: RefCell<CountingRng<SmallRng>>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            cards: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_CARDS))),
            board: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_BOARD))),
            events: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_EVENTS))),
        }
    }

    /// Streams used while setting up the season of `year`.
    #[must_use]
    pub fn for_season(seed: u64, year: u32) -> Self {
        Self::from_user_seed(mix_seed(seed, year, u32::MAX))
    }

    /// Streams used by a single turn of the season of `year`.
    #[must_use]
    pub fn for_turn(seed: u64, year: u32, turn: u32) -> Self {
        Self::from_user_seed(mix_seed(seed, year, turn))
    }

    /// Access the card draw stream.
    #[must_use]
    pub fn cards(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.cards.borrow_mut()
    }

    /// Access the board generation stream.
    #[must_use]
    pub fn board(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.board.borrow_mut()
    }

    /// Access the event resolution stream.
    #[must_use]
    pub fn events(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.events.borrow_mut()
    }

    /// Total draws across every stream.
    #[must_use]
    pub fn total_draws(&self) -> u64 {
        self.cards.borrow().draws() + self.board.borrow().draws() + self.events.borrow().draws()
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn mix_seed(seed: u64, year: u32, turn: u32) -> u64 {
    let mut tag = [0u8; 8];
    tag[..4].copy_from_slice(&year.to_le_bytes());
    tag[4..].copy_from_slice(&turn.to_le_bytes());
    derive_stream_seed(seed, &tag)
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}
