//! Season board generation.
//!
//! A season board is a linear run of panels, one per in-game day. Scripted
//! story beats are pinned first; every other panel samples a category from
//! the normalized distribution independently.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::config::{ConfigError, MapConfig};
use crate::constants::{DISTRIBUTION_TOTAL, REPUTATION_PER_MATCH_POINT};
use crate::events::EventTemplate;
use crate::numbers::largest_remainder_shares;

/// Generic panel categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum PanelCategory {
    Training,
    Rest,
    Event,
    Match,
    Special,
}

impl PanelCategory {
    pub const ALL: [Self; 5] = [
        Self::Training,
        Self::Rest,
        Self::Event,
        Self::Match,
        Self::Special,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Rest => "rest",
            Self::Event => "event",
            Self::Match => "match",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for PanelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a panel type name is not one of the known categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown panel type `{0}`")]
pub struct UnknownPanelType(pub String);

impl FromStr for PanelCategory {
    type Err = UnknownPanelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownPanelType(s.to_string()))
    }
}

impl TryFrom<String> for PanelCategory {
    type Error = UnknownPanelType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configured relative weights per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelWeights {
    #[serde(default)]
    pub training: u32,
    #[serde(default)]
    pub rest: u32,
    #[serde(default)]
    pub event: u32,
    #[serde(default, rename = "match")]
    pub matches: u32,
    #[serde(default)]
    pub special: u32,
}

impl PanelWeights {
    /// Weights in [`PanelCategory::ALL`] order.
    #[must_use]
    pub const fn as_array(&self) -> [u32; 5] {
        [
            self.training,
            self.rest,
            self.event,
            self.matches,
            self.special,
        ]
    }

    /// Shift weight from rest to match panels as the club's reputation grows.
    #[must_use]
    pub fn with_reputation(mut self, reputation: u32, cap: u32) -> Self {
        let shift = (reputation / REPUTATION_PER_MATCH_POINT)
            .min(cap)
            .min(self.rest);
        self.rest -= shift;
        self.matches += shift;
        self
    }

    /// Normalize to percentages summing to exactly 100.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroWeights` when every weight is zero.
    pub fn normalized(&self) -> Result<PanelDistribution, ConfigError> {
        let shares = largest_remainder_shares(&self.as_array(), DISTRIBUTION_TOTAL).ok_or(
            ConfigError::ZeroWeights {
                table: "map.distribution",
            },
        )?;
        Ok(PanelDistribution {
            shares: PanelCategory::ALL.into_iter().zip(shares).collect(),
        })
    }
}

impl Default for PanelWeights {
    fn default() -> Self {
        Self {
            training: 35,
            rest: 15,
            event: 25,
            matches: 15,
            special: 10,
        }
    }
}

/// Normalized percentage distribution used to sample random panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelDistribution {
    shares: BTreeMap<PanelCategory, u32>,
}

impl PanelDistribution {
    #[must_use]
    pub fn share(&self, category: PanelCategory) -> u32 {
        self.shares.get(&category).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.shares.values().sum()
    }

    /// Draw one category proportionally to its share.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> PanelCategory {
        let total = self.total().max(1);
        let roll = rng.gen_range(0..total);
        let mut current = 0;
        for category in PanelCategory::ALL {
            current += self.share(category);
            if roll < current {
                return category;
            }
        }
        PanelCategory::ALL
            .into_iter()
            .find(|category| self.share(*category) > 0)
            .unwrap_or(PanelCategory::Training)
    }
}

/// Scripted story beat payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    pub id: String,
    /// Whether movement must stop on this panel instead of passing it.
    #[serde(default)]
    pub mandatory_stop: bool,
    pub template: EventTemplate,
}

/// What a panel holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Random(PanelCategory),
    Scripted(ScriptedEvent),
}

impl PanelKind {
    #[must_use]
    pub const fn category(&self) -> PanelCategory {
        match self {
            Self::Random(category) => *category,
            Self::Scripted(script) => script.template.category,
        }
    }

    #[must_use]
    pub const fn script(&self) -> Option<&ScriptedEvent> {
        match self {
            Self::Random(_) => None,
            Self::Scripted(script) => Some(script),
        }
    }
}

/// One addressable position on a season board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub index: u32,
    pub kind: PanelKind,
}

/// The board for one school year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonMap {
    pub year: u32,
    pub total_days: u32,
    pub panels: Vec<Panel>,
    /// Scripted event ids keyed by panel index.
    #[serde(default)]
    pub fixed_events: BTreeMap<u32, String>,
    pub random_panel_distribution: PanelDistribution,
}

impl SeasonMap {
    #[must_use]
    pub fn panel(&self, index: u32) -> Option<&Panel> {
        self.panels.get(usize::try_from(index).ok()?)
    }

    /// Index of the final panel.
    #[must_use]
    pub const fn last_index(&self) -> u32 {
        self.total_days.saturating_sub(1)
    }

    /// First scripted panel strictly after `position` that demands a stop.
    #[must_use]
    pub fn next_mandatory_stop_after(&self, position: u32) -> Option<u32> {
        self.fixed_events
            .range(position.saturating_add(1)..)
            .map(|(index, _)| *index)
            .find(|index| {
                self.panel(*index)
                    .and_then(|panel| panel.kind.script())
                    .is_some_and(|script| script.mandatory_stop)
            })
    }

    /// Panel count per generic category (scripted panels count under their
    /// template category).
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<PanelCategory, u32> {
        let mut counts = BTreeMap::new();
        for panel in &self.panels {
            *counts.entry(panel.kind.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Stable digest of the board layout.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&self.year.to_le_bytes());
        hasher.write(&self.total_days.to_le_bytes());
        for panel in &self.panels {
            hasher.write(&panel.index.to_le_bytes());
            hasher.write(panel.kind.category().as_str().as_bytes());
            if let Some(script) = panel.kind.script() {
                hasher.write(script.id.as_bytes());
            }
        }
        hasher.finish()
    }

    /// Check the structural invariants of a board, typically after loading.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.total_days == 0 {
            return Err(String::from("board has no panels"));
        }
        if self.panels.len() != usize::try_from(self.total_days).unwrap_or(usize::MAX) {
            return Err(format!(
                "board lists {} panels for {} days",
                self.panels.len(),
                self.total_days
            ));
        }
        if let Some(panel) = self
            .panels
            .iter()
            .zip(0u32..)
            .find_map(|(panel, expected)| (panel.index != expected).then_some(panel))
        {
            return Err(format!("panel {} is out of order", panel.index));
        }
        for (index, id) in &self.fixed_events {
            let matches = self
                .panel(*index)
                .and_then(|panel| panel.kind.script())
                .is_some_and(|script| &script.id == id);
            if !matches {
                return Err(format!("fixed event `{id}` is missing from panel {index}"));
            }
        }
        Ok(())
    }
}

/// Generate the board for `year`.
///
/// # Errors
///
/// Returns `ConfigError` when the year's board length is not positive, every
/// distribution weight is zero, or scripted placements are invalid.
pub fn generate_season_map<R: Rng>(
    year: u32,
    reputation: u32,
    cfg: &MapConfig,
    rng: &mut R,
) -> Result<SeasonMap, ConfigError> {
    let total_days = cfg.total_days_for(year)?;
    let distribution = cfg
        .distribution
        .with_reputation(reputation, cfg.reputation_match_cap)
        .normalized()?;
    let placements = cfg.placements_for(year, total_days)?;

    let panels = (0..total_days)
        .map(|index| {
            let kind = match placements.get(&index) {
                Some(script) => PanelKind::Scripted((*script).clone()),
                None => PanelKind::Random(distribution.sample(rng)),
            };
            Panel { index, kind }
        })
        .collect();
    let fixed_events = placements
        .iter()
        .map(|(index, script)| (*index, script.id.clone()))
        .collect();

    let map = SeasonMap {
        year,
        total_days,
        panels,
        fixed_events,
        random_panel_distribution: distribution,
    };
    log::debug!(
        "Generated season map | year {year} days {total_days} scripted {} fingerprint {:016x} panels {:?}",
        map.fixed_events.len(),
        map.fingerprint(),
        map.category_counts()
    );
    Ok(map)
}
