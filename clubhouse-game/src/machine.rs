//! Season progression state machine.
//!
//! A turn runs CardSelection -> Movement -> Event -> CardSelection. Every
//! action checks the phase first and validates its inputs before touching
//! state, so a rejected action leaves the save exactly as it was.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::calendar::CalendarDate;
use crate::cards::{Card, CardTag, Hand, hand_capacity};
use crate::config::{ConfigError, SeasonConfig};
use crate::constants::{DAYS_PER_SCHOOL_YEAR, IDLE_DAY_ADVANCE};
use crate::events::{
    EventCatalog, EventOutcome, MemberId, ResolveError, SpecialEffect, resolve_event,
    resolve_scripted,
};
use crate::map::{PanelCategory, SeasonMap, generate_season_map};
use crate::numbers::usize_to_u32;
use crate::progress::{
    EventHistoryEntry, GameProgress, PendingEvent, Phase, PhaseLabel, YearSummary,
};
use crate::result::CampaignSummary;
use crate::rng::RngBundle;

/// Errors returned by player actions and save loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeasonError {
    #[error("`{action}` is not allowed during {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: PhaseLabel,
    },
    #[error("the campaign has ended")]
    GameCompleted,
    #[error("the season has not been initialized")]
    Uninitialized,
    #[error("card {index} cannot be played: {reason}")]
    OutOfRangeCard { index: usize, reason: String },
    #[error("invalid event choice {choice:?} ({options} options offered)")]
    InvalidChoice {
        choice: Option<usize>,
        options: usize,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid save: {0}")]
    InvalidSave(String),
}

/// How the token got to where the turn's event happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnKind {
    Moved {
        card: Card,
        from: u32,
        /// The move was cut short by a mandatory scripted panel.
        forced_stop: bool,
    },
    /// Zero-move policy: nothing to play, one idle day passes.
    Idle,
    /// The team rested until the first of the next month.
    RestedMonth,
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved {
                card,
                from,
                forced_stop,
            } => {
                write!(f, "card {} (value {}) from {from}", card.id, card.value)?;
                if *forced_stop {
                    f.write_str(" stopped early")?;
                }
                Ok(())
            }
            Self::Idle => f.write_str("idle day"),
            Self::RestedMonth => f.write_str("rested for the month"),
        }
    }
}

/// Result of the movement half of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub kind: TurnKind,
    pub position: u32,
    pub days_passed: u32,
    pub date: CalendarDate,
    pub pending: PendingEvent,
}

/// What happened at the end of a school year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum YearTransition {
    NextYear { summary: YearSummary },
    GameEnd { summary: CampaignSummary },
}

/// Result of executing the pending event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResolution {
    /// Finalized history entry, ready for the append-only log.
    pub entry: EventHistoryEntry,
    /// Outcome with the chosen option folded in. Stat, fatigue and
    /// motivation deltas are for the caller to apply to its roster.
    pub outcome: EventOutcome,
    /// Effects the engine does not own.
    pub external_effects: Vec<SpecialEffect>,
    pub transition: Option<YearTransition>,
}

/// Drives one save through its campaign.
#[derive(Debug, Clone)]
pub struct SeasonMachine {
    config: SeasonConfig,
    catalog: EventCatalog,
    progress: GameProgress,
    map: Option<SeasonMap>,
}

impl SeasonMachine {
    /// Machine for a brand-new save. Call [`Self::initialize`] to deal the
    /// first season.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the catalog
    /// lacks templates for a panel category.
    pub fn new(seed: u64, config: SeasonConfig, catalog: EventCatalog) -> Result<Self, SeasonError> {
        Self::check_inputs(&config, &catalog)?;
        let progress = GameProgress::unstarted(seed, config.total_years);
        Ok(Self {
            config,
            catalog,
            progress,
            map: None,
        })
    }

    /// Fresh save with the first season already dealt.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn new_campaign(
        seed: u64,
        config: SeasonConfig,
        catalog: EventCatalog,
    ) -> Result<Self, SeasonError> {
        let mut machine = Self::new(seed, config, catalog)?;
        machine.initialize()?;
        Ok(machine)
    }

    /// Continue a loaded save.
    ///
    /// # Errors
    ///
    /// Returns `SeasonError::InvalidSave` when the progress does not fit its
    /// board, plus the errors of [`Self::new`].
    pub fn resume(
        progress: GameProgress,
        map: Option<SeasonMap>,
        config: SeasonConfig,
        catalog: EventCatalog,
    ) -> Result<Self, SeasonError> {
        Self::check_inputs(&config, &catalog)?;
        match (&progress.phase, &map) {
            (Phase::Uninitialized | Phase::GameEnd, _) => {}
            (_, None) => {
                return Err(SeasonError::InvalidSave(String::from(
                    "running save has no board",
                )));
            }
            (_, Some(board)) => progress
                .validate_against(board)
                .map_err(SeasonError::InvalidSave)?,
        }
        log::debug!(
            "Resumed save | year {} day {} phase {}",
            progress.current_year,
            progress.elapsed_days,
            progress.phase.label()
        );
        Ok(Self {
            config,
            catalog,
            progress,
            map,
        })
    }

    fn check_inputs(config: &SeasonConfig, catalog: &EventCatalog) -> Result<(), SeasonError> {
        config.validate()?;
        if let Some(category) = catalog.missing_categories().first() {
            return Err(ResolveError::NoTemplates(*category).into());
        }
        Ok(())
    }

    #[must_use]
    pub const fn progress(&self) -> &GameProgress {
        &self.progress
    }

    #[must_use]
    pub const fn map(&self) -> Option<&SeasonMap> {
        self.map.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &SeasonConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase(&self) -> PhaseLabel {
        self.progress.phase.label()
    }

    /// Hand size the current year allows.
    #[must_use]
    pub fn hand_capacity(&self) -> usize {
        hand_capacity(
            self.progress.current_year,
            self.progress.bonus_slots,
            &self.config.cards,
        )
    }

    /// Mutate progress directly. Intended for tooling and tests.
    pub fn with_progress_mut<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut GameProgress) -> R,
    {
        f(&mut self.progress)
    }

    #[must_use]
    pub fn into_parts(self) -> (GameProgress, Option<SeasonMap>) {
        (self.progress, self.map)
    }

    /// Deal the first season of an unstarted save.
    ///
    /// # Errors
    ///
    /// Fails unless the save is uninitialized.
    pub fn initialize(&mut self) -> Result<(), SeasonError> {
        if !matches!(self.progress.phase, Phase::Uninitialized) {
            return Err(self.phase_error("initialize"));
        }
        let year = self.progress.current_year;
        let (map, hand) = self.deal_season(
            year,
            self.progress.reputation,
            self.progress.bonus_slots,
            self.progress.hand.dealt_count(),
        )?;
        self.progress.hand = hand;
        self.progress.set_date(CalendarDate::season_start(year));
        self.progress.elapsed_days = 0;
        self.progress.current_position = 0;
        self.progress.forced_stop = map.next_mandatory_stop_after(0);
        self.progress.phase = Phase::CardSelection;
        log::info!(
            "Season started | seed {} year {year} days {} hand {}",
            self.progress.seed,
            map.total_days,
            self.progress.hand.len()
        );
        self.map = Some(map);
        Ok(())
    }

    /// Play the card at `index` and move the token.
    ///
    /// With an empty hand and an empty draw pile the turn resolves through
    /// [`Self::pass_turn`] instead.
    ///
    /// # Errors
    ///
    /// Fails outside CardSelection, or with `OutOfRangeCard` when `index`
    /// does not name a playable card.
    pub fn select_card(
        &mut self,
        index: usize,
        roster: &[MemberId],
    ) -> Result<TurnReport, SeasonError> {
        if !matches!(self.progress.phase, Phase::CardSelection) {
            return Err(self.phase_error("select_card"));
        }
        if self.progress.hand.is_exhausted() {
            log::debug!(
                "Hand and draw pile exhausted | year {} turn {}",
                self.progress.current_year,
                self.progress.turn
            );
            return self.pass_turn(roster);
        }

        let rng = self.turn_rng();
        let cards_cfg = &self.config.cards;
        let mut hand = self.progress.hand.clone();
        if hand.is_empty() {
            hand.refill(cards_cfg, &mut *rng.cards());
        }
        let card = hand
            .take(index)
            .ok_or_else(|| SeasonError::OutOfRangeCard {
                index,
                reason: format!("hand holds {} cards", hand.len()),
            })?;
        if !cards_cfg.accepts_value(card.value) {
            return Err(SeasonError::OutOfRangeCard {
                index,
                reason: format!(
                    "value {} is outside {}..={}",
                    card.value, cards_cfg.min_value, cards_cfg.max_value
                ),
            });
        }

        if card.has_tag(CardTag::DrawExtra) && hand.grow(cards_cfg.max_hand) {
            self.progress.bonus_slots += 1;
        }
        hand.refill(cards_cfg, &mut *rng.cards());
        self.progress.hand = hand;
        self.progress.used_cards.push(card.clone());
        self.progress.phase = Phase::Movement { card };
        self.move_token(roster, &rng)
    }

    /// Resolve a Movement phase left pending by a loaded save.
    ///
    /// # Errors
    ///
    /// Fails outside Movement.
    pub fn resolve_movement(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        if !matches!(self.progress.phase, Phase::Movement { .. }) {
            return Err(self.phase_error("resolve_movement"));
        }
        let rng = self.turn_rng();
        self.move_token(roster, &rng)
    }

    /// Zero-move turn: the token stays, one idle day passes and the team
    /// rests.
    ///
    /// # Errors
    ///
    /// Fails outside CardSelection.
    pub fn pass_turn(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        if !matches!(self.progress.phase, Phase::CardSelection) {
            return Err(self.phase_error("pass_turn"));
        }
        let rng = self.turn_rng();
        let outcome = resolve_event(
            PanelCategory::Rest,
            roster,
            &self.catalog,
            &mut *rng.events(),
        )?;
        Ok(self.land(IDLE_DAY_ADVANCE, outcome, TurnKind::Idle))
    }

    /// Rest until day 1 of the next month without moving the token.
    ///
    /// # Errors
    ///
    /// Fails outside CardSelection.
    pub fn advance_month(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        if !matches!(self.progress.phase, Phase::CardSelection) {
            return Err(self.phase_error("advance_month"));
        }
        let rng = self.turn_rng();
        let outcome = resolve_event(
            PanelCategory::Rest,
            roster,
            &self.catalog,
            &mut *rng.events(),
        )?;
        let days = self.progress.date().days_until_next_month();
        Ok(self.land(days, outcome, TurnKind::RestedMonth))
    }

    /// Execute the pending event, optionally picking one of its choices.
    ///
    /// # Errors
    ///
    /// Fails outside Event, or with `InvalidChoice` when `choice` does not
    /// match the offered options (an interactive event needs one).
    pub fn execute_event(&mut self, choice: Option<usize>) -> Result<EventResolution, SeasonError> {
        let pending = match &self.progress.phase {
            Phase::Event { pending } => pending.clone(),
            _ => return Err(self.phase_error("execute_event")),
        };
        let options = pending.outcome.choices.len();
        let outcome = match choice {
            Some(option) => pending
                .outcome
                .with_choice(option)
                .ok_or(SeasonError::InvalidChoice { choice, options })?,
            None if !pending.outcome.is_interactive() => pending.outcome.clone(),
            None => return Err(SeasonError::InvalidChoice { choice, options }),
        };
        if self
            .progress
            .season_history
            .last()
            .is_none_or(|tail| tail.seq != pending.seq)
        {
            return Err(SeasonError::InvalidSave(format!(
                "history entry {} is missing",
                pending.seq
            )));
        }

        let mut reputation = self.progress.reputation;
        let mut hand = self.progress.hand.clone();
        let mut bonus_slots = self.progress.bonus_slots;
        let (engine_effects, external_effects): (Vec<SpecialEffect>, Vec<SpecialEffect>) = outcome
            .effects
            .iter()
            .cloned()
            .partition(SpecialEffect::is_engine_owned);
        for effect in &engine_effects {
            match effect {
                SpecialEffect::Reputation { delta } => {
                    reputation = reputation.saturating_add_signed(*delta);
                }
                SpecialEffect::BonusCardSlot => {
                    if hand.grow(self.config.cards.max_hand) {
                        bonus_slots += 1;
                    }
                }
                _ => {}
            }
        }

        let year_over = self.year_end_due();
        let next_year = self.progress.current_year + 1;
        let next_season = if year_over && next_year <= self.progress.total_years {
            Some(self.deal_season(next_year, reputation, bonus_slots, hand.dealt_count())?)
        } else {
            None
        };

        // Validation is done; commit the turn.
        let mut entry = None;
        if let Some(tail) = self.progress.season_history.last_mut() {
            tail.chosen_option = choice;
            entry = Some(tail.clone());
        }
        let entry = entry.ok_or(SeasonError::Uninitialized)?;
        self.progress.reputation = reputation;
        self.progress.hand = hand;
        self.progress.bonus_slots = bonus_slots;
        self.progress.turn += 1;
        self.progress.total_turns += 1;
        if self.progress.forced_stop.is_none() {
            self.progress.forced_stop = self
                .map
                .as_ref()
                .and_then(|map| map.next_mandatory_stop_after(self.progress.current_position));
        }

        let transition = if year_over {
            Some(self.close_year(next_season))
        } else {
            self.progress.phase = Phase::CardSelection;
            None
        };
        log::debug!(
            "Event executed | seq {} template {} choice {choice:?} reputation {}",
            entry.seq,
            entry.template_id,
            self.progress.reputation
        );
        Ok(EventResolution {
            entry,
            outcome,
            external_effects,
            transition,
        })
    }

    fn move_token(
        &mut self,
        roster: &[MemberId],
        rng: &RngBundle,
    ) -> Result<TurnReport, SeasonError> {
        let Phase::Movement { card } = &self.progress.phase else {
            return Err(self.phase_error("resolve_movement"));
        };
        let card = card.clone();
        let map = self.map.as_ref().ok_or(SeasonError::Uninitialized)?;
        let from = self.progress.current_position;
        let target = from
            .saturating_add(u32::from(card.value))
            .min(map.last_index());
        let (to, stop_reached) = match self.progress.forced_stop {
            Some(stop) if stop > from && stop <= target => (stop, true),
            _ => (target, false),
        };
        let panel = map
            .panel(to)
            .ok_or_else(|| SeasonError::InvalidSave(format!("board has no panel {to}")))?;
        let outcome = match panel.kind.script() {
            Some(script) => resolve_scripted(script, roster, &mut *rng.events()),
            None if card.has_tag(CardTag::SkipEvent) => {
                EventOutcome::quiet_day(panel.kind.category())
            }
            None => resolve_event(
                panel.kind.category(),
                roster,
                &self.catalog,
                &mut *rng.events(),
            )?,
        };

        self.progress.current_position = to;
        if stop_reached {
            self.progress.forced_stop = None;
        }
        let kind = TurnKind::Moved {
            card,
            from,
            forced_stop: to < target,
        };
        Ok(self.land(to - from, outcome, kind))
    }

    /// Advance the calendar, record the landing and enter the Event phase.
    fn land(&mut self, days: u32, outcome: EventOutcome, kind: TurnKind) -> TurnReport {
        let advance = self.progress.date().advance_days(days);
        self.progress.set_date(advance.date);
        self.progress.elapsed_days += days;

        let seq = self.progress.next_event_seq;
        self.progress.next_event_seq += 1;
        let position = self.progress.current_position;
        let date = self.progress.date();
        self.progress
            .season_history
            .push(EventHistoryEntry::from_outcome(
                seq,
                self.progress.current_year,
                date,
                position,
                &outcome,
            ));
        let pending = PendingEvent {
            seq,
            position,
            outcome,
        };
        self.progress.phase = Phase::Event {
            pending: pending.clone(),
        };
        log::debug!(
            "Turn {} | {kind} -> panel {position} ({}) on {date}",
            self.progress.turn,
            pending.outcome.template_id
        );
        TurnReport {
            kind,
            position,
            days_passed: days,
            date,
            pending,
        }
    }

    fn year_end_due(&self) -> bool {
        let at_finale = self
            .map
            .as_ref()
            .is_some_and(|map| self.progress.current_position >= map.last_index());
        at_finale || self.progress.elapsed_days >= DAYS_PER_SCHOOL_YEAR
    }

    fn close_year(&mut self, next_season: Option<(SeasonMap, Hand)>) -> YearTransition {
        let summary = self.year_summary();
        self.progress.year_summaries.push(summary.clone());
        self.progress.current_year += 1;
        let Some((map, hand)) = next_season else {
            self.progress.phase = Phase::GameEnd;
            let campaign = CampaignSummary::from_progress(&self.progress);
            log::info!(
                "Campaign complete | seed {} years {} turns {} reputation {}",
                campaign.seed,
                campaign.years_completed,
                campaign.total_turns,
                campaign.final_reputation
            );
            return YearTransition::GameEnd { summary: campaign };
        };

        let year = self.progress.current_year;
        self.progress.set_date(CalendarDate::season_start(year));
        self.progress.elapsed_days = 0;
        self.progress.current_position = 0;
        self.progress.used_cards.clear();
        self.progress.season_history.clear();
        self.progress.turn = 0;
        self.progress.hand = hand;
        self.progress.forced_stop = map.next_mandatory_stop_after(0);
        self.progress.phase = Phase::CardSelection;
        log::info!(
            "Season reseeded | year {year} days {} reputation {} fingerprint {:016x}",
            map.total_days,
            self.progress.reputation,
            map.fingerprint()
        );
        self.map = Some(map);
        YearTransition::NextYear { summary }
    }

    fn year_summary(&self) -> YearSummary {
        let progress = &self.progress;
        let mut events_by_category = BTreeMap::new();
        for entry in &progress.season_history {
            *events_by_category.entry(entry.category).or_insert(0) += 1;
        }
        let (total_days, map_fingerprint, last_index) = self
            .map
            .as_ref()
            .map_or((0, 0, 0), |map| (map.total_days, map.fingerprint(), map.last_index()));
        YearSummary {
            year: progress.current_year,
            total_days,
            map_fingerprint,
            turns: progress.turn,
            cards_used: usize_to_u32(progress.used_cards.len()),
            final_position: progress.current_position,
            elapsed_days: progress.elapsed_days,
            reputation: progress.reputation,
            events_by_category,
            scripted_events: progress
                .season_history
                .iter()
                .filter_map(|entry| entry.script_id.clone())
                .collect(),
            skipped_events: usize_to_u32(
                progress
                    .season_history
                    .iter()
                    .filter(|entry| entry.skipped)
                    .count(),
            ),
            reached_finale: total_days > 0 && progress.current_position >= last_index,
        }
    }

    fn deal_season(
        &self,
        year: u32,
        reputation: u32,
        bonus_slots: u32,
        dealt: u32,
    ) -> Result<(SeasonMap, Hand), SeasonError> {
        let rng = RngBundle::for_season(self.progress.seed, year);
        let map = generate_season_map(year, reputation, &self.config.map, &mut *rng.board())?;
        let hand = Hand::new_season(dealt, year, bonus_slots, &self.config.cards, &mut *rng.cards());
        log::trace!("Season dealt | year {year} rng draws {}", rng.total_draws());
        Ok((map, hand))
    }

    fn turn_rng(&self) -> RngBundle {
        RngBundle::for_turn(
            self.progress.seed,
            self.progress.current_year,
            self.progress.turn,
        )
    }

    fn phase_error(&self, action: &'static str) -> SeasonError {
        match self.progress.phase.label() {
            PhaseLabel::GameEnd => SeasonError::GameCompleted,
            PhaseLabel::Uninitialized => SeasonError::Uninitialized,
            phase => SeasonError::InvalidTransition { action, phase },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedEventDef, Placement};
    use crate::events::EventTemplate;
    use crate::map::ScriptedEvent;

    fn roster() -> Vec<MemberId> {
        ["aoi", "ren", "sora"].into_iter().map(MemberId::new).collect()
    }

    fn machine_with(config: SeasonConfig) -> SeasonMachine {
        SeasonMachine::new_campaign(17, config, EventCatalog::builtin().unwrap()).unwrap()
    }

    fn single_card_hand(machine: &mut SeasonMachine, card: Card) {
        machine.with_progress_mut(|progress| {
            progress.hand.cards = vec![card];
            progress.hand.draw_pile_size = 0;
        });
    }

    fn mandatory_at(day: u32) -> SeasonConfig {
        let mut config = SeasonConfig::default();
        config.map.fixed_events.push(FixedEventDef {
            year: None,
            placement: Placement::Day(day),
            event: ScriptedEvent {
                id: String::from("qualifier"),
                mandatory_stop: true,
                template: EventTemplate::bare("qualifier", PanelCategory::Match),
            },
        });
        config
    }

    #[test]
    fn uninitialized_and_wrong_phase_actions_are_rejected() {
        let mut machine =
            SeasonMachine::new(1, SeasonConfig::default(), EventCatalog::builtin().unwrap())
                .unwrap();
        assert_eq!(
            machine.select_card(0, &roster()).unwrap_err(),
            SeasonError::Uninitialized
        );
        machine.initialize().unwrap();
        assert_eq!(
            machine.execute_event(None).unwrap_err(),
            SeasonError::InvalidTransition {
                action: "execute_event",
                phase: PhaseLabel::CardSelection
            }
        );
        assert!(matches!(
            machine.initialize(),
            Err(SeasonError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn out_of_range_card_leaves_state_untouched() {
        let mut machine = machine_with(SeasonConfig::default());
        let before = machine.progress().clone();
        let err = machine.select_card(7, &roster()).unwrap_err();
        assert!(matches!(err, SeasonError::OutOfRangeCard { index: 7, .. }));
        assert_eq!(machine.progress(), &before);

        single_card_hand(&mut machine, Card::plain(500, 9));
        let before = machine.progress().clone();
        assert!(matches!(
            machine.select_card(0, &roster()),
            Err(SeasonError::OutOfRangeCard { index: 0, .. })
        ));
        assert_eq!(machine.progress(), &before);
    }

    #[test]
    fn forced_stop_cuts_movement_short_and_rearms() {
        let mut config = mandatory_at(3);
        config.map.fixed_events.push(FixedEventDef {
            year: None,
            placement: Placement::Day(10),
            event: ScriptedEvent {
                id: String::from("derby"),
                mandatory_stop: true,
                template: EventTemplate::bare("derby", PanelCategory::Match),
            },
        });
        let mut machine = machine_with(config);
        assert_eq!(machine.progress().forced_stop, Some(3));
        single_card_hand(&mut machine, Card::plain(500, 6));

        let report = machine.select_card(0, &roster()).unwrap();
        assert_eq!(report.position, 3);
        assert!(matches!(report.kind, TurnKind::Moved { forced_stop: true, .. }));
        assert_eq!(report.pending.outcome.script_id.as_deref(), Some("qualifier"));
        assert_eq!(machine.progress().forced_stop, None);

        machine.execute_event(None).unwrap();
        assert_eq!(machine.progress().forced_stop, Some(10));
        assert_eq!(machine.phase(), PhaseLabel::CardSelection);
    }

    #[test]
    fn skip_event_card_turns_generic_panels_quiet() {
        let mut machine = machine_with(SeasonConfig::default());
        let mut card = Card::plain(500, 2);
        card.tags.push(CardTag::SkipEvent);
        single_card_hand(&mut machine, card);
        let report = machine.select_card(0, &roster()).unwrap();
        assert!(report.pending.outcome.skipped);
        assert!(report.pending.outcome.affected.is_empty());
        let resolution = machine.execute_event(None).unwrap();
        assert!(resolution.entry.skipped);
    }

    #[test]
    fn skip_event_never_skips_scripted_panels() {
        let mut machine = machine_with(mandatory_at(2));
        let mut card = Card::plain(500, 2);
        card.tags.push(CardTag::SkipEvent);
        single_card_hand(&mut machine, card);
        let report = machine.select_card(0, &roster()).unwrap();
        assert!(!report.pending.outcome.skipped);
        assert_eq!(report.pending.outcome.script_id.as_deref(), Some("qualifier"));
    }

    #[test]
    fn draw_extra_grants_a_permanent_slot() {
        let mut machine = machine_with(SeasonConfig::default());
        let mut card = Card::plain(500, 1);
        card.tags.push(CardTag::DrawExtra);
        machine.with_progress_mut(|progress| {
            progress.hand.cards[0] = card;
        });
        let capacity = machine.hand_capacity();
        machine.select_card(0, &roster()).unwrap();
        let progress = machine.progress();
        assert_eq!(progress.bonus_slots, 1);
        assert_eq!(progress.hand.max_cards, capacity + 1);
        assert_eq!(progress.hand.len(), capacity + 1);
        assert_eq!(machine.hand_capacity(), capacity + 1);
    }

    #[test]
    fn interactive_events_require_a_valid_choice() {
        let mut machine = machine_with(SeasonConfig::default());
        machine.select_card(0, &roster()).unwrap();
        let mut template = EventTemplate::bare("crossroads", PanelCategory::Event);
        template.choices = vec![crate::events::EventChoice {
            label: String::from("left"),
            stats: crate::events::StatDeltas::default(),
            fatigue: 0,
            motivation: 2,
            effects: vec![SpecialEffect::Reputation { delta: 7 }],
        }];
        machine.with_progress_mut(|progress| {
            if let Phase::Event { pending } = &mut progress.phase {
                pending.outcome.choices = template.choices.clone();
                pending.outcome.effects.clear();
            }
        });
        let before = machine.progress().clone();
        assert_eq!(
            machine.execute_event(None).unwrap_err(),
            SeasonError::InvalidChoice {
                choice: None,
                options: 1
            }
        );
        assert!(matches!(
            machine.execute_event(Some(3)),
            Err(SeasonError::InvalidChoice { .. })
        ));
        assert_eq!(machine.progress(), &before);

        let resolution = machine.execute_event(Some(0)).unwrap();
        assert_eq!(resolution.entry.chosen_option, Some(0));
        assert_eq!(resolution.outcome.motivation_delta, before.pending_event().unwrap().outcome.motivation_delta + 2);
        assert_eq!(machine.progress().reputation, before.reputation + 7);
    }

    #[test]
    fn resting_out_the_calendar_ends_the_year_once() {
        let mut machine = machine_with(SeasonConfig::default());
        let mut transitions = 0;
        for _ in 0..12 {
            machine.advance_month(&roster()).unwrap();
            let resolution = machine.execute_event(None).unwrap();
            if resolution.transition.is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        let progress = machine.progress();
        assert_eq!(progress.current_year, 2);
        assert_eq!(progress.date(), CalendarDate::season_start(2));
        assert_eq!(progress.elapsed_days, 0);
        assert_eq!(progress.current_position, 0);
        assert_eq!(progress.year_summaries.len(), 1);
        assert!(!progress.year_summaries[0].reached_finale);
        assert_eq!(machine.map().map(|map| map.total_days), Some(330));
    }
}
