//! Event templates and outcome resolution.
//!
//! The resolver never touches the roster: it returns an [`EventOutcome`]
//! describing the intended changes and leaves applying them to the caller.
use rand::Rng;
use rand::seq::{SliceRandom, index};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{
    DEFAULT_MAX_PARTICIPANTS, DEFAULT_MIN_PARTICIPANTS, QUIET_DAY_DESC, QUIET_DAY_TEMPLATE_ID,
    QUIET_DAY_TITLE,
};
use crate::map::{PanelCategory, ScriptedEvent};

/// Roster member identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-member stat changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatDeltas {
    #[serde(default)]
    pub power: i32,
    #[serde(default)]
    pub speed: i32,
    #[serde(default)]
    pub technique: i32,
    #[serde(default)]
    pub stamina: i32,
    #[serde(default)]
    pub mental: i32,
}

impl StatDeltas {
    #[must_use]
    pub const fn combined(self, other: Self) -> Self {
        Self {
            power: self.power + other.power,
            speed: self.speed + other.speed,
            technique: self.technique + other.technique,
            stamina: self.stamina + other.stamina,
            mental: self.mental + other.mental,
        }
    }

    /// Sum of all deltas, used for coarse reporting.
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.power + self.speed + self.technique + self.stamina + self.mental
    }
}

/// Side effects consumed by systems outside the season loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecialEffect {
    /// A new recruit becomes available for scouting.
    UnlockRecruit { archetype: String },
    /// A shop item becomes purchasable.
    UnlockShopItem { item_id: String },
    /// Club funds change by `amount` (may be negative).
    Funds { amount: i64 },
    /// Club reputation changes; feeds next season's board.
    Reputation { delta: i32 },
    /// Affected members sit out for `days` days.
    Injury { days: u8 },
    /// One more permanent hand slot (capped by the configured maximum).
    BonusCardSlot,
}

impl SpecialEffect {
    /// Effects the season engine applies itself; the rest go to the caller.
    #[must_use]
    pub const fn is_engine_owned(&self) -> bool {
        matches!(self, Self::Reputation { .. } | Self::BonusCardSlot)
    }
}

/// Who an outcome applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Participants {
    WholeTeam,
    Random {
        #[serde(default = "default_min_participants")]
        min: usize,
        #[serde(default = "default_max_participants")]
        max: usize,
    },
}

const fn default_min_participants() -> usize {
    DEFAULT_MIN_PARTICIPANTS
}

const fn default_max_participants() -> usize {
    DEFAULT_MAX_PARTICIPANTS
}

impl Default for Participants {
    fn default() -> Self {
        Self::Random {
            min: DEFAULT_MIN_PARTICIPANTS,
            max: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

/// Optional interactive branch of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    pub label: String,
    #[serde(default)]
    pub stats: StatDeltas,
    #[serde(default)]
    pub fatigue: i32,
    #[serde(default)]
    pub motivation: i32,
    #[serde(default)]
    pub effects: Vec<SpecialEffect>,
}

/// Hand-authored outcome template for one panel category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    pub category: PanelCategory,
    pub title: String,
    pub desc: String,
    #[serde(default)]
    pub stats: StatDeltas,
    #[serde(default)]
    pub fatigue: i32,
    #[serde(default)]
    pub motivation: i32,
    #[serde(default)]
    pub participants: Participants,
    #[serde(default)]
    pub effects: Vec<SpecialEffect>,
    #[serde(default)]
    pub choices: Vec<EventChoice>,
}

impl EventTemplate {
    /// Template with a title only and no effects.
    #[must_use]
    pub fn bare(id: &str, category: PanelCategory) -> Self {
        Self {
            id: id.to_string(),
            category,
            title: id.replace('_', " "),
            desc: String::new(),
            stats: StatDeltas::default(),
            fatigue: 0,
            motivation: 0,
            participants: Participants::default(),
            effects: Vec::new(),
            choices: Vec::new(),
        }
    }
}

/// Container for all generic event templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventCatalog {
    pub templates: Vec<EventTemplate>,
}

impl EventCatalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    /// Load a catalog from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a valid catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn from_templates(templates: Vec<EventTemplate>) -> Self {
        Self { templates }
    }

    /// Catalog shipped with the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded asset fails to parse.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(include_str!("../assets/events.json"))
    }

    /// Templates registered for `category`.
    pub fn for_category(&self, category: PanelCategory) -> impl Iterator<Item = &EventTemplate> {
        self.templates
            .iter()
            .filter(move |template| template.category == category)
    }

    /// Categories that have no template at all.
    #[must_use]
    pub fn missing_categories(&self) -> Vec<PanelCategory> {
        PanelCategory::ALL
            .into_iter()
            .filter(|category| self.for_category(*category).next().is_none())
            .collect()
    }
}

/// Concrete result of landing on a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub template_id: String,
    pub category: PanelCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub stats: StatDeltas,
    #[serde(default)]
    pub fatigue_delta: i32,
    #[serde(default)]
    pub motivation_delta: i32,
    #[serde(default)]
    pub affected: Vec<MemberId>,
    #[serde(default)]
    pub effects: Vec<SpecialEffect>,
    #[serde(default)]
    pub choices: Vec<EventChoice>,
    /// Set when a card skipped the panel's event.
    #[serde(default)]
    pub skipped: bool,
}

impl EventOutcome {
    /// Empty outcome recorded when a card skips a generic panel.
    #[must_use]
    pub fn quiet_day(category: PanelCategory) -> Self {
        Self {
            template_id: QUIET_DAY_TEMPLATE_ID.to_string(),
            category,
            script_id: None,
            title: QUIET_DAY_TITLE.to_string(),
            description: QUIET_DAY_DESC.to_string(),
            stats: StatDeltas::default(),
            fatigue_delta: 0,
            motivation_delta: 0,
            affected: Vec::new(),
            effects: Vec::new(),
            choices: Vec::new(),
            skipped: true,
        }
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Fold the chosen option's deltas into the outcome.
    ///
    /// Returns `None` when `choice` does not name an offered option.
    #[must_use]
    pub fn with_choice(&self, choice: usize) -> Option<Self> {
        let option = self.choices.get(choice)?;
        let mut merged = self.clone();
        merged.stats = merged.stats.combined(option.stats);
        merged.fatigue_delta += option.fatigue;
        merged.motivation_delta += option.motivation;
        merged.effects.extend(option.effects.iter().cloned());
        Some(merged)
    }

    fn from_template(
        template: &EventTemplate,
        script_id: Option<String>,
        affected: Vec<MemberId>,
    ) -> Self {
        Self {
            template_id: template.id.clone(),
            category: template.category,
            script_id,
            title: template.title.clone(),
            description: template.desc.clone(),
            stats: template.stats,
            fatigue_delta: template.fatigue,
            motivation_delta: template.motivation,
            affected,
            effects: template.effects.clone(),
            choices: template.choices.clone(),
            skipped: false,
        }
    }
}

/// Errors raised while resolving an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no event templates registered for {0} panels")]
    NoTemplates(PanelCategory),
}

/// Pick one template for `category` uniformly and build its outcome.
///
/// # Errors
///
/// Returns `ResolveError::NoTemplates` when the catalog has nothing for the
/// category.
pub fn resolve_event<R: Rng>(
    category: PanelCategory,
    participants: &[MemberId],
    catalog: &EventCatalog,
    rng: &mut R,
) -> Result<EventOutcome, ResolveError> {
    let candidates: Vec<&EventTemplate> = catalog.for_category(category).collect();
    let template = candidates
        .choose(rng)
        .copied()
        .ok_or(ResolveError::NoTemplates(category))?;
    let affected = pick_participants(template.participants, participants, rng);
    log::trace!(
        "Event resolved | category {category} template {} candidates {} affected {}",
        template.id,
        candidates.len(),
        affected.len()
    );
    Ok(EventOutcome::from_template(template, None, affected))
}

/// Build the outcome of a scripted panel.
pub fn resolve_scripted<R: Rng>(
    script: &ScriptedEvent,
    participants: &[MemberId],
    rng: &mut R,
) -> EventOutcome {
    let affected = pick_participants(script.template.participants, participants, rng);
    EventOutcome::from_template(&script.template, Some(script.id.clone()), affected)
}

fn pick_participants<R: Rng>(
    policy: Participants,
    pool: &[MemberId],
    rng: &mut R,
) -> Vec<MemberId> {
    if pool.is_empty() {
        return Vec::new();
    }
    match policy {
        Participants::WholeTeam => pool.to_vec(),
        Participants::Random { min, max } => {
            let low = min.clamp(1, pool.len());
            let high = max.clamp(low, pool.len());
            let count = rng.gen_range(low..=high);
            let mut picked = index::sample(rng, pool.len(), count).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|idx| pool[idx].clone()).collect()
        }
    }
}
