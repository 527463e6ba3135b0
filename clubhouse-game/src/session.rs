//! Owner-bound wrapper around [`SeasonMachine`] that tracks unsaved work.
use serde::{Deserialize, Serialize};

use crate::SeasonStorage;
use crate::cards::Card;
use crate::events::MemberId;
use crate::machine::{EventResolution, SeasonError, SeasonMachine, TurnReport, YearTransition};
use crate::map::SeasonMap;
use crate::progress::{EventHistoryEntry, GameProgress, PendingEvent, PhaseLabel};
use crate::storage::{OwnerId, PersistenceError, SavedSeason};

/// Read model handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonView {
    pub year: u32,
    pub total_years: u32,
    pub month: u8,
    pub day: u8,
    pub elapsed_days: u32,
    pub position: u32,
    pub total_days: u32,
    pub phase: PhaseLabel,
    pub hand: Vec<Card>,
    pub hand_capacity: usize,
    pub draw_pile_size: u32,
    pub pending_events: Vec<PendingEvent>,
    pub forced_stop: Option<u32>,
    pub reputation: u32,
    pub completed: bool,
}

/// One owner's running save plus the writes it still owes storage.
#[derive(Debug, Clone)]
pub struct SeasonSession {
    owner: OwnerId,
    machine: SeasonMachine,
    state_dirty: bool,
    map_dirty: bool,
    queued_events: Vec<EventHistoryEntry>,
}

impl SeasonSession {
    /// Wrap a machine. A `fresh` session owes storage its full snapshot.
    #[must_use]
    pub fn new(owner: OwnerId, machine: SeasonMachine, fresh: bool) -> Self {
        Self {
            owner,
            machine,
            state_dirty: fresh,
            map_dirty: fresh,
            queued_events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    #[must_use]
    pub const fn machine(&self) -> &SeasonMachine {
        &self.machine
    }

    #[must_use]
    pub const fn progress(&self) -> &GameProgress {
        self.machine.progress()
    }

    #[must_use]
    pub const fn map(&self) -> Option<&SeasonMap> {
        self.machine.map()
    }

    #[must_use]
    pub fn into_machine(self) -> SeasonMachine {
        self.machine
    }

    /// Whether anything still has to reach storage.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state_dirty || self.map_dirty || !self.queued_events.is_empty()
    }

    /// History entries finalized but not yet recorded.
    #[must_use]
    pub fn queued_events(&self) -> &[EventHistoryEntry] {
        &self.queued_events
    }

    /// # Errors
    ///
    /// See [`SeasonMachine::select_card`].
    pub fn select_card(
        &mut self,
        index: usize,
        roster: &[MemberId],
    ) -> Result<TurnReport, SeasonError> {
        let report = self.machine.select_card(index, roster)?;
        self.state_dirty = true;
        Ok(report)
    }

    /// # Errors
    ///
    /// See [`SeasonMachine::pass_turn`].
    pub fn pass_turn(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        let report = self.machine.pass_turn(roster)?;
        self.state_dirty = true;
        Ok(report)
    }

    /// # Errors
    ///
    /// See [`SeasonMachine::advance_month`].
    pub fn advance_month(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        let report = self.machine.advance_month(roster)?;
        self.state_dirty = true;
        Ok(report)
    }

    /// # Errors
    ///
    /// See [`SeasonMachine::resolve_movement`].
    pub fn resolve_movement(&mut self, roster: &[MemberId]) -> Result<TurnReport, SeasonError> {
        let report = self.machine.resolve_movement(roster)?;
        self.state_dirty = true;
        Ok(report)
    }

    /// Execute the pending event and queue its history entry.
    ///
    /// # Errors
    ///
    /// See [`SeasonMachine::execute_event`].
    pub fn execute_event(&mut self, choice: Option<usize>) -> Result<EventResolution, SeasonError> {
        let resolution = self.machine.execute_event(choice)?;
        self.queued_events.push(resolution.entry.clone());
        self.state_dirty = true;
        if matches!(resolution.transition, Some(YearTransition::NextYear { .. })) {
            self.map_dirty = true;
        }
        Ok(resolution)
    }

    /// Mutate progress directly and mark the snapshot dirty.
    pub fn with_progress_mut<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut GameProgress) -> R,
    {
        self.state_dirty = true;
        self.machine.with_progress_mut(f)
    }

    #[must_use]
    pub fn view(&self) -> SeasonView {
        let progress = self.machine.progress();
        SeasonView {
            year: progress.current_year,
            total_years: progress.total_years,
            month: progress.current_month,
            day: progress.current_day,
            elapsed_days: progress.elapsed_days,
            position: progress.current_position,
            total_days: self.machine.map().map_or(0, |map| map.total_days),
            phase: progress.phase.label(),
            hand: progress.hand.cards.clone(),
            hand_capacity: progress.hand.max_cards,
            draw_pile_size: progress.hand.draw_pile_size,
            pending_events: progress.pending_event().cloned().into_iter().collect(),
            forced_stop: progress.forced_stop,
            reputation: progress.reputation,
            completed: progress.is_complete(),
        }
    }

    /// Whole snapshot of the running save.
    #[must_use]
    pub fn snapshot(&self) -> SavedSeason {
        SavedSeason::new(self.machine.progress().clone(), self.machine.map().cloned())
    }

    /// Push owed writes to `storage`: log entries, then the whole snapshot,
    /// then the published board. Work that fails stays queued.
    pub(crate) fn flush<S: SeasonStorage>(&mut self, storage: &S) -> Result<(), PersistenceError> {
        while let Some(entry) = self.queued_events.first() {
            storage
                .record_event(&self.owner, entry)
                .map_err(|err| PersistenceError::new("record_event", err))?;
            self.queued_events.remove(0);
        }
        if self.state_dirty {
            storage
                .save_state(&self.owner, &self.snapshot())
                .map_err(|err| PersistenceError::new("save_state", err))?;
            self.state_dirty = false;
        }
        if self.map_dirty {
            if let Some(map) = self.machine.map() {
                storage
                    .save_map(&self.owner, map)
                    .map_err(|err| PersistenceError::new("save_map", err))?;
            }
            self.map_dirty = false;
        }
        Ok(())
    }
}
