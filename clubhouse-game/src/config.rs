//! Season configuration: card tables, board layout and campaign length.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::{
    CARD_VALUE_CEILING, DEFAULT_BASE_DAYS, DEFAULT_DAYS_GROWTH_PER_YEAR, DEFAULT_DECK_SIZE,
    DEFAULT_DRAW_EXTRA_CHANCE, DEFAULT_HAND_GROWTH_PER_YEAR, DEFAULT_MAX_CARD_VALUE,
    DEFAULT_MAX_HAND, DEFAULT_MIN_CARD_VALUE, DEFAULT_REPUTATION_MATCH_CAP,
    DEFAULT_SKIP_EVENT_CHANCE, DEFAULT_START_HAND, DEFAULT_TOTAL_YEARS, MAX_TOTAL_YEARS,
};
use crate::map::{PanelWeights, ScriptedEvent};

/// Errors raised when season configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    ChanceViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("starting hand {start} exceeds maximum hand {max}")]
    HandBounds { start: usize, max: usize },
    #[error("card value bounds invalid (min {min} > max {max})")]
    CardValueBounds { min: u8, max: u8 },
    #[error("card value {value} in the weight table is outside {min}..={max}")]
    CardWeightOutOfBounds { value: u8, min: u8, max: u8 },
    #[error("weight table `{table}` has no positive weight")]
    ZeroWeights { table: &'static str },
    #[error("season of year {year} would have {days} days")]
    NonPositiveDays { year: u32, days: i64 },
    #[error("fixed event `{id}` resolves to panel {index}, outside a {total_days}-day board")]
    FixedEventOutOfRange {
        id: String,
        index: i64,
        total_days: u32,
    },
    #[error("fixed events `{first}` and `{second}` both claim panel {index}")]
    FixedEventCollision {
        index: u32,
        first: String,
        second: String,
    },
}

/// Top-level configuration for a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonConfig {
    #[serde(default = "SeasonConfig::default_total_years")]
    pub total_years: u32,
    #[serde(default)]
    pub cards: CardConfig,
    #[serde(default)]
    pub map: MapConfig,
}

impl SeasonConfig {
    #[must_use]
    pub const fn default_total_years() -> u32 {
        DEFAULT_TOTAL_YEARS
    }

    /// Validate configuration invariants for every year of the campaign.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds or
    /// a year's board cannot be laid out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOTAL_YEARS).contains(&self.total_years) {
            return Err(ConfigError::RangeViolation {
                field: "total_years",
                min: 1,
                max: i64::from(MAX_TOTAL_YEARS),
                value: i64::from(self.total_years),
            });
        }
        self.cards.validate()?;
        self.map.validate(self.total_years)
    }
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            total_years: Self::default_total_years(),
            cards: CardConfig::default(),
            map: MapConfig::default(),
        }
    }
}

/// Relative weight of one card value in the draw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueWeight {
    pub value: u8,
    pub weight: u32,
}

/// Movement card tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default = "CardConfig::default_start_hand")]
    pub start_hand: usize,
    #[serde(default = "CardConfig::default_max_hand")]
    pub max_hand: usize,
    #[serde(default = "CardConfig::default_hand_growth")]
    pub hand_growth_per_year: usize,
    #[serde(default = "CardConfig::default_deck_size")]
    pub deck_size: u32,
    #[serde(default = "CardConfig::default_min_value")]
    pub min_value: u8,
    #[serde(default = "CardConfig::default_max_value")]
    pub max_value: u8,
    #[serde(default = "CardConfig::default_value_weights")]
    pub value_weights: Vec<ValueWeight>,
    #[serde(default = "CardConfig::default_draw_extra_chance")]
    pub draw_extra_chance: f32,
    #[serde(default = "CardConfig::default_skip_event_chance")]
    pub skip_event_chance: f32,
}

impl CardConfig {
    const fn default_start_hand() -> usize {
        DEFAULT_START_HAND
    }

    const fn default_max_hand() -> usize {
        DEFAULT_MAX_HAND
    }

    const fn default_hand_growth() -> usize {
        DEFAULT_HAND_GROWTH_PER_YEAR
    }

    const fn default_deck_size() -> u32 {
        DEFAULT_DECK_SIZE
    }

    const fn default_min_value() -> u8 {
        DEFAULT_MIN_CARD_VALUE
    }

    const fn default_max_value() -> u8 {
        DEFAULT_MAX_CARD_VALUE
    }

    fn default_value_weights() -> Vec<ValueWeight> {
        [(1, 14), (2, 22), (3, 24), (4, 18), (5, 12), (6, 10)]
            .into_iter()
            .map(|(value, weight)| ValueWeight { value, weight })
            .collect()
    }

    const fn default_draw_extra_chance() -> f32 {
        DEFAULT_DRAW_EXTRA_CHANCE
    }

    const fn default_skip_event_chance() -> f32 {
        DEFAULT_SKIP_EVENT_CHANCE
    }

    /// Whether `value` lies inside the configured card bounds.
    #[must_use]
    pub fn accepts_value(&self, value: u8) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hand == 0 || self.start_hand > self.max_hand {
            return Err(ConfigError::HandBounds {
                start: self.start_hand,
                max: self.max_hand,
            });
        }
        if self.min_value == 0 || self.min_value > self.max_value {
            return Err(ConfigError::CardValueBounds {
                min: self.min_value,
                max: self.max_value,
            });
        }
        if self.max_value > CARD_VALUE_CEILING {
            return Err(ConfigError::RangeViolation {
                field: "cards.max_value",
                min: 1,
                max: i64::from(CARD_VALUE_CEILING),
                value: i64::from(self.max_value),
            });
        }
        if let Some(bad) = self
            .value_weights
            .iter()
            .find(|entry| !self.accepts_value(entry.value))
        {
            return Err(ConfigError::CardWeightOutOfBounds {
                value: bad.value,
                min: self.min_value,
                max: self.max_value,
            });
        }
        if self.value_weights.iter().all(|entry| entry.weight == 0) {
            return Err(ConfigError::ZeroWeights {
                table: "cards.value_weights",
            });
        }
        for (field, value) in [
            ("cards.draw_extra_chance", self.draw_extra_chance),
            ("cards.skip_event_chance", self.skip_event_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ChanceViolation {
                    field,
                    min: 0.0,
                    max: 1.0,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            start_hand: Self::default_start_hand(),
            max_hand: Self::default_max_hand(),
            hand_growth_per_year: Self::default_hand_growth(),
            deck_size: Self::default_deck_size(),
            min_value: Self::default_min_value(),
            max_value: Self::default_max_value(),
            value_weights: Self::default_value_weights(),
            draw_extra_chance: Self::default_draw_extra_chance(),
            skip_event_chance: Self::default_skip_event_chance(),
        }
    }
}

/// Where a scripted event sits on a season board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Absolute zero-based panel index.
    Day(u32),
    /// Panels counted back from the last one (`0` is the last panel).
    FromEnd(u32),
    /// Percentage through the board, rounded down.
    AtPercent(u8),
}

impl Placement {
    /// Resolve the placement on a board of `total_days` panels.
    #[must_use]
    pub fn resolve(self, total_days: u32) -> i64 {
        let last = i64::from(total_days) - 1;
        match self {
            Self::Day(day) => i64::from(day),
            Self::FromEnd(back) => last - i64::from(back),
            Self::AtPercent(pct) => last * i64::from(pct) / 100,
        }
    }
}

/// A scripted story beat bound to a board position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEventDef {
    /// Restrict the beat to one school year; `None` repeats it every year.
    #[serde(default)]
    pub year: Option<u32>,
    pub placement: Placement,
    pub event: ScriptedEvent,
}

impl FixedEventDef {
    #[must_use]
    pub fn applies_to(&self, year: u32) -> bool {
        self.year.is_none_or(|only| only == year)
    }
}

/// Board layout tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "MapConfig::default_base_days")]
    pub base_days: i32,
    #[serde(default = "MapConfig::default_days_growth")]
    pub days_growth_per_year: i32,
    #[serde(default)]
    pub distribution: PanelWeights,
    #[serde(default = "MapConfig::default_reputation_match_cap")]
    pub reputation_match_cap: u32,
    #[serde(default)]
    pub fixed_events: Vec<FixedEventDef>,
}

impl MapConfig {
    const fn default_base_days() -> i32 {
        DEFAULT_BASE_DAYS
    }

    const fn default_days_growth() -> i32 {
        DEFAULT_DAYS_GROWTH_PER_YEAR
    }

    const fn default_reputation_match_cap() -> u32 {
        DEFAULT_REPUTATION_MATCH_CAP
    }

    /// Board length for `year`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NonPositiveDays` when the computed length is not
    /// positive.
    pub fn total_days_for(&self, year: u32) -> Result<u32, ConfigError> {
        let growth = i64::from(self.days_growth_per_year) * i64::from(year.saturating_sub(1));
        let days = i64::from(self.base_days) + growth;
        u32::try_from(days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or(ConfigError::NonPositiveDays { year, days })
    }

    /// Resolve every scripted event for `year` to its panel index.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a placement falls outside the board or two
    /// scripted events claim the same panel.
    pub fn placements_for(
        &self,
        year: u32,
        total_days: u32,
    ) -> Result<BTreeMap<u32, &ScriptedEvent>, ConfigError> {
        let mut placed: BTreeMap<u32, &ScriptedEvent> = BTreeMap::new();
        for def in self.fixed_events.iter().filter(|def| def.applies_to(year)) {
            let raw = def.placement.resolve(total_days);
            let index = u32::try_from(raw)
                .ok()
                .filter(|index| *index < total_days)
                .ok_or_else(|| ConfigError::FixedEventOutOfRange {
                    id: def.event.id.clone(),
                    index: raw,
                    total_days,
                })?;
            if let Some(existing) = placed.get(&index) {
                return Err(ConfigError::FixedEventCollision {
                    index,
                    first: existing.id.clone(),
                    second: def.event.id.clone(),
                });
            }
            placed.insert(index, &def.event);
        }
        Ok(placed)
    }

    fn validate(&self, total_years: u32) -> Result<(), ConfigError> {
        self.distribution.normalized()?;
        for year in 1..=total_years {
            let total_days = self.total_days_for(year)?;
            self.placements_for(year, total_days)?;
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            base_days: Self::default_base_days(),
            days_growth_per_year: Self::default_days_growth(),
            distribution: PanelWeights::default(),
            reputation_match_cap: Self::default_reputation_match_cap(),
            fixed_events: Vec::new(),
        }
    }
}
