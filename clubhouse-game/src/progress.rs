//! Persisted season state.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::calendar::CalendarDate;
use crate::cards::{Card, Hand};
use crate::constants::{DEFAULT_TOTAL_YEARS, SEASON_START_DAY, SEASON_START_MONTH};
use crate::events::{EventOutcome, MemberId};
use crate::map::{PanelCategory, SeasonMap};

/// Outcome waiting for the player in the Event phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Sequence number of the history entry this event finalizes.
    pub seq: u32,
    pub position: u32,
    pub outcome: EventOutcome,
}

/// Turn phase. Data that only exists in one phase travels with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    CardSelection,
    Movement {
        card: Card,
    },
    Event {
        pending: PendingEvent,
    },
    GameEnd,
}

impl Phase {
    #[must_use]
    pub const fn label(&self) -> PhaseLabel {
        match self {
            Self::Uninitialized => PhaseLabel::Uninitialized,
            Self::CardSelection => PhaseLabel::CardSelection,
            Self::Movement { .. } => PhaseLabel::Movement,
            Self::Event { .. } => PhaseLabel::Event,
            Self::GameEnd => PhaseLabel::GameEnd,
        }
    }
}

/// Payload-free view of [`Phase`] for errors and read models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseLabel {
    Uninitialized,
    CardSelection,
    Movement,
    Event,
    GameEnd,
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::CardSelection => "card selection",
            Self::Movement => "movement",
            Self::Event => "event",
            Self::GameEnd => "game end",
        };
        f.write_str(label)
    }
}

/// Append-only record of one resolved panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHistoryEntry {
    pub seq: u32,
    pub year: u32,
    pub month: u8,
    pub day: u8,
    pub position: u32,
    pub category: PanelCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    pub template_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub chosen_option: Option<usize>,
    #[serde(default)]
    pub affected: Vec<MemberId>,
    #[serde(default)]
    pub skipped: bool,
}

impl EventHistoryEntry {
    #[must_use]
    pub fn from_outcome(
        seq: u32,
        year: u32,
        date: CalendarDate,
        position: u32,
        outcome: &EventOutcome,
    ) -> Self {
        Self {
            seq,
            year,
            month: date.month,
            day: date.day,
            position,
            category: outcome.category,
            script_id: outcome.script_id.clone(),
            template_id: outcome.template_id.clone(),
            title: outcome.title.clone(),
            description: outcome.description.clone(),
            chosen_option: None,
            affected: outcome.affected.clone(),
            skipped: outcome.skipped,
        }
    }
}

/// Totals for one finished school year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: u32,
    pub total_days: u32,
    pub map_fingerprint: u64,
    pub turns: u32,
    pub cards_used: u32,
    pub final_position: u32,
    pub elapsed_days: u32,
    pub reputation: u32,
    #[serde(default)]
    pub events_by_category: BTreeMap<PanelCategory, u32>,
    #[serde(default)]
    pub scripted_events: Vec<String>,
    #[serde(default)]
    pub skipped_events: u32,
    /// Whether the token reached the final panel before the calendar wrapped.
    pub reached_finale: bool,
}

/// Whole-snapshot save state for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProgress {
    pub seed: u64,
    #[serde(default = "GameProgress::default_total_years")]
    pub total_years: u32,
    #[serde(default)]
    pub reputation: u32,
    #[serde(default)]
    pub bonus_slots: u32,
    pub current_year: u32,
    pub current_month: u8,
    pub current_day: u8,
    /// Days since this season's 4/1.
    #[serde(default)]
    pub elapsed_days: u32,
    #[serde(default)]
    pub current_position: u32,
    pub hand: Hand,
    #[serde(default)]
    pub used_cards: Vec<Card>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub forced_stop: Option<u32>,
    /// Turns completed this season.
    #[serde(default)]
    pub turn: u32,
    #[serde(default)]
    pub total_turns: u32,
    #[serde(default)]
    pub next_event_seq: u32,
    /// Resolved panels of the current season, oldest first.
    #[serde(default)]
    pub season_history: Vec<EventHistoryEntry>,
    #[serde(default)]
    pub year_summaries: Vec<YearSummary>,
}

impl GameProgress {
    #[must_use]
    pub const fn default_total_years() -> u32 {
        DEFAULT_TOTAL_YEARS
    }

    /// Progress for a save whose first season has not been dealt yet.
    #[must_use]
    pub fn unstarted(seed: u64, total_years: u32) -> Self {
        Self {
            seed,
            total_years,
            reputation: 0,
            bonus_slots: 0,
            current_year: 1,
            current_month: SEASON_START_MONTH,
            current_day: SEASON_START_DAY,
            elapsed_days: 0,
            current_position: 0,
            hand: Hand {
                cards: Vec::new(),
                max_cards: 0,
                draw_pile_size: 0,
                next_serial: 1,
            },
            used_cards: Vec::new(),
            phase: Phase::Uninitialized,
            forced_stop: None,
            turn: 0,
            total_turns: 0,
            next_event_seq: 1,
            season_history: Vec::new(),
            year_summaries: Vec::new(),
        }
    }

    /// Current in-game date. The school year doubles as the calendar year
    /// label.
    #[must_use]
    pub const fn date(&self) -> CalendarDate {
        CalendarDate::new(self.current_year, self.current_month, self.current_day)
    }

    pub(crate) const fn set_date(&mut self, date: CalendarDate) {
        self.current_month = date.month;
        self.current_day = date.day;
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::GameEnd)
    }

    #[must_use]
    pub const fn pending_event(&self) -> Option<&PendingEvent> {
        match &self.phase {
            Phase::Event { pending } => Some(pending),
            _ => None,
        }
    }

    /// Check a loaded save against the board it claims to be on.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistency found.
    pub fn validate_against(&self, map: &SeasonMap) -> Result<(), String> {
        if self.total_years == 0 {
            return Err(String::from("save has zero campaign years"));
        }
        if !self.date().is_valid() {
            return Err(format!("invalid calendar date {}", self.date()));
        }
        if self.hand.len() > self.hand.max_cards {
            return Err(format!(
                "hand holds {} cards but only has {} slots",
                self.hand.len(),
                self.hand.max_cards
            ));
        }
        if matches!(self.phase, Phase::Uninitialized | Phase::GameEnd) {
            return Ok(());
        }
        if self.current_year > self.total_years {
            return Err(format!(
                "year {} is past the last year {} but the game is still running",
                self.current_year, self.total_years
            ));
        }
        if map.year != self.current_year {
            return Err(format!(
                "board belongs to year {} but save is in year {}",
                map.year, self.current_year
            ));
        }
        map.check_invariants()?;
        if self.current_position > map.last_index() {
            return Err(format!(
                "position {} is beyond the last panel {}",
                self.current_position,
                map.last_index()
            ));
        }
        let expected = CalendarDate::season_start(self.current_year)
            .advance_days(self.elapsed_days)
            .date;
        if (expected.month, expected.day) != (self.current_month, self.current_day) {
            return Err(format!(
                "date {:02}/{:02} does not match {} elapsed days",
                self.current_month, self.current_day, self.elapsed_days
            ));
        }
        if let Some(stop) = self.forced_stop
            && (stop <= self.current_position || stop > map.last_index())
        {
            return Err(format!(
                "forced stop {stop} is not ahead of position {}",
                self.current_position
            ));
        }
        if let Some(pending) = self.pending_event()
            && self
                .season_history
                .last()
                .is_none_or(|entry| entry.seq != pending.seq)
        {
            return Err(format!(
                "pending event {} has no history entry",
                pending.seq
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::map::generate_season_map;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn running(map: &SeasonMap) -> GameProgress {
        let mut progress = GameProgress::unstarted(5, 3);
        progress.phase = Phase::CardSelection;
        progress.current_year = map.year;
        progress.hand.max_cards = 4;
        progress
    }

    #[test]
    fn phase_serializes_with_its_payload() {
        let phase = Phase::Movement {
            card: Card::plain(3, 5),
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["phase"], "movement");
        assert_eq!(json["card"]["value"], 5);
        assert_eq!(phase.label(), PhaseLabel::Movement);
        let back: Phase = serde_json::from_value(json).unwrap();
        assert_eq!(back, phase);
    }

    #[test]
    fn validation_accepts_a_consistent_save() {
        let map = generate_season_map(1, 0, &MapConfig::default(), &mut SmallRng::seed_from_u64(1))
            .unwrap();
        let mut progress = running(&map);
        progress.elapsed_days = 31;
        progress.current_month = 5;
        progress.current_day = 2;
        progress.current_position = 31;
        assert_eq!(progress.validate_against(&map), Ok(()));
    }

    #[test]
    fn validation_rejects_mismatched_boards_and_dates() {
        let map = generate_season_map(2, 0, &MapConfig::default(), &mut SmallRng::seed_from_u64(1))
            .unwrap();
        let mut progress = running(&map);
        progress.current_year = 1;
        assert!(progress.validate_against(&map).is_err());

        progress.current_year = 2;
        progress.elapsed_days = 3;
        assert!(
            progress
                .validate_against(&map)
                .unwrap_err()
                .contains("elapsed days")
        );

        progress.elapsed_days = 0;
        progress.current_position = map.total_days;
        assert!(progress.validate_against(&map).is_err());
    }

    #[test]
    fn unstarted_progress_defaults_missing_fields() {
        let progress = GameProgress::unstarted(9, 3);
        let mut json = serde_json::to_value(&progress).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("phase");
        object.remove("year_summaries");
        object.remove("total_years");
        let back: GameProgress = serde_json::from_value(json).unwrap();
        assert_eq!(back, progress);
    }
}
