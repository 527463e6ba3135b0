//! Movement cards, hand sizing and the per-season draw pile.
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::config::CardConfig;
use crate::numbers::usize_to_u32;

/// Save-wide card serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability a card carries in addition to its movement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTag {
    /// Grants a permanent bonus hand slot and draws into it.
    DrawExtra,
    /// Skips the generic event of the landed panel.
    SkipEvent,
}

pub type CardTags = SmallVec<[CardTag; 2]>;

/// A single movement card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub value: u8,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub tags: CardTags,
}

impl Card {
    #[must_use]
    pub fn plain(id: u32, value: u8) -> Self {
        Self {
            id: CardId(id),
            value,
            tags: CardTags::new(),
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: CardTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Hand size for `year` including earned bonus slots, capped by `max_hand`.
#[must_use]
pub fn hand_capacity(year: u32, bonus_slots: u32, cfg: &CardConfig) -> usize {
    let growth = usize::try_from(year.saturating_sub(1))
        .unwrap_or(usize::MAX)
        .saturating_mul(cfg.hand_growth_per_year);
    let bonus = usize::try_from(bonus_slots).unwrap_or(usize::MAX);
    cfg.start_hand
        .saturating_add(growth)
        .saturating_add(bonus)
        .min(cfg.max_hand)
}

/// Draw one card with the given serial number.
pub fn draw_card<R: Rng>(serial: u32, cfg: &CardConfig, rng: &mut R) -> Card {
    let value = roll_value(cfg, rng);
    let mut tags = CardTags::new();
    if roll_chance(cfg.draw_extra_chance, rng) {
        tags.push(CardTag::DrawExtra);
    }
    if roll_chance(cfg.skip_event_chance, rng) {
        tags.push(CardTag::SkipEvent);
    }
    Card {
        id: CardId(serial),
        value,
        tags,
    }
}

/// Deal a full hand for a new season.
///
/// `used_count` is the number of cards already dealt in this save; ids of
/// the new hand continue from `used_count + 1`.
pub fn generate_hand<R: Rng>(
    used_count: u32,
    current_year: u32,
    bonus_slots: u32,
    cfg: &CardConfig,
    rng: &mut R,
) -> Vec<Card> {
    let size = hand_capacity(current_year, bonus_slots, cfg);
    (1..=usize_to_u32(size))
        .map(|offset| draw_card(used_count.saturating_add(offset), cfg, rng))
        .collect()
}

fn roll_value<R: Rng>(cfg: &CardConfig, rng: &mut R) -> u8 {
    let weighted: Vec<(u8, u32)> = cfg
        .value_weights
        .iter()
        .filter(|entry| entry.weight > 0 && cfg.accepts_value(entry.value))
        .map(|entry| (entry.value, entry.weight))
        .collect();
    let total: u32 = weighted.iter().map(|(_, weight)| *weight).sum();
    if total == 0 {
        return rng.gen_range(cfg.min_value..=cfg.max_value.max(cfg.min_value));
    }
    let roll = rng.gen_range(0..total);
    let mut current = 0;
    for (value, weight) in &weighted {
        current += *weight;
        if roll < current {
            return *value;
        }
    }
    weighted.first().map_or(cfg.min_value, |(value, _)| *value)
}

fn roll_chance<R: Rng>(chance: f32, rng: &mut R) -> bool {
    chance > 0.0 && rng.gen_bool(f64::from(chance.min(1.0)))
}

/// Cards in hand plus the remaining draw pile for the current season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    pub cards: Vec<Card>,
    pub max_cards: usize,
    pub draw_pile_size: u32,
    /// Serial assigned to the next drawn card.
    pub next_serial: u32,
}

impl Hand {
    /// Deal the opening hand of a season and set aside the draw pile.
    pub fn new_season<R: Rng>(
        used_count: u32,
        current_year: u32,
        bonus_slots: u32,
        cfg: &CardConfig,
        rng: &mut R,
    ) -> Self {
        let cards = generate_hand(used_count, current_year, bonus_slots, cfg, rng);
        let dealt = usize_to_u32(cards.len());
        Self {
            max_cards: hand_capacity(current_year, bonus_slots, cfg),
            draw_pile_size: cfg.deck_size.saturating_sub(dealt),
            next_serial: used_count.saturating_add(dealt).saturating_add(1),
            cards,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// No card in hand and nothing left to draw.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cards.is_empty() && self.draw_pile_size == 0
    }

    /// Cards dealt so far in this save.
    #[must_use]
    pub const fn dealt_count(&self) -> u32 {
        self.next_serial.saturating_sub(1)
    }

    /// Remove and return the card at `index`.
    pub fn take(&mut self, index: usize) -> Option<Card> {
        (index < self.cards.len()).then(|| self.cards.remove(index))
    }

    /// Draw until the hand is full or the pile runs out. Returns the number
    /// of cards drawn.
    pub fn refill<R: Rng>(&mut self, cfg: &CardConfig, rng: &mut R) -> usize {
        let mut drawn = 0;
        while self.draw_pile_size > 0 && self.cards.len() < self.max_cards {
            self.cards.push(draw_card(self.next_serial, cfg, rng));
            self.next_serial = self.next_serial.saturating_add(1);
            self.draw_pile_size -= 1;
            drawn += 1;
        }
        drawn
    }

    /// Widen the hand by one slot, never beyond `limit`. Returns whether the
    /// hand grew.
    pub fn grow(&mut self, limit: usize) -> bool {
        if self.max_cards >= limit {
            return false;
        }
        self.max_cards += 1;
        true
    }
}
