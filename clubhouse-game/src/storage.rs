//! Storage records and the bundled adapters.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::SeasonStorage;
use crate::map::SeasonMap;
use crate::progress::{EventHistoryEntry, GameProgress};

/// Identifies the player that owns a save.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole save: progress plus the board it is being played on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSeason {
    pub progress: GameProgress,
    #[serde(default)]
    pub map: Option<SeasonMap>,
}

impl SavedSeason {
    #[must_use]
    pub const fn new(progress: GameProgress, map: Option<SeasonMap>) -> Self {
        Self { progress, map }
    }

    /// Save that has not been dealt yet.
    #[must_use]
    pub fn unstarted(seed: u64, total_years: u32) -> Self {
        Self::new(GameProgress::unstarted(seed, total_years), None)
    }
}

/// Recoverable storage failure. In-memory state stays authoritative and the
/// write can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {reason}")]
pub struct PersistenceError {
    pub operation: &'static str,
    pub reason: String,
}

impl PersistenceError {
    #[must_use]
    pub fn new(operation: &'static str, reason: impl fmt::Display) -> Self {
        Self {
            operation,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    season: Option<SavedSeason>,
    published_map: Option<SeasonMap>,
    history: Vec<EventHistoryEntry>,
}

/// Process-local store. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<OwnerId, Slot>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(
        &self,
        operation: &'static str,
    ) -> Result<MutexGuard<'_, HashMap<OwnerId, Slot>>, PersistenceError> {
        self.slots
            .lock()
            .map_err(|_| PersistenceError::new(operation, "storage lock poisoned"))
    }

    /// Drop everything stored for `owner`.
    ///
    /// # Errors
    ///
    /// Fails only when the lock is poisoned.
    pub fn delete(&self, owner: &OwnerId) -> Result<(), PersistenceError> {
        self.slots("delete")?.remove(owner);
        Ok(())
    }
}

impl SeasonStorage for MemoryStorage {
    type Error = PersistenceError;

    fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error> {
        let slots = self.slots("load_state")?;
        Ok(slots.get(owner).and_then(|slot| slot.season.clone()))
    }

    fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error> {
        self.slots("save_state")?
            .entry(owner.clone())
            .or_default()
            .season = Some(season.clone());
        Ok(())
    }

    fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error> {
        self.slots("save_map")?
            .entry(owner.clone())
            .or_default()
            .published_map = Some(map.clone());
        Ok(())
    }

    fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error> {
        let slots = self.slots("load_map")?;
        Ok(slots.get(owner).and_then(|slot| slot.published_map.clone()))
    }

    fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error> {
        self.slots("record_event")?
            .entry(owner.clone())
            .or_default()
            .history
            .push(entry.clone());
        Ok(())
    }

    fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error> {
        Ok(self
            .slots("load_history")?
            .get(owner)
            .map(|slot| slot.history.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Fallback,
}

/// Writes to both stores and reads from the primary, falling back to the
/// secondary when the primary fails.
///
/// When only one store takes a write, the other is marked as behind for
/// that owner. A store that is behind is neither read nor written until
/// its missing history, published board and snapshot have been copied
/// over from the up-to-date store; every later call retries that copy
/// first. The marks live in process memory.
#[derive(Debug, Clone)]
pub struct FallbackStorage<P, F> {
    primary: P,
    fallback: F,
    behind: Arc<Mutex<HashMap<OwnerId, Side>>>,
}

impl<P, F> FallbackStorage<P, F>
where
    P: SeasonStorage,
    F: SeasonStorage,
{
    #[must_use]
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            behind: Arc::default(),
        }
    }

    pub const fn primary(&self) -> &P {
        &self.primary
    }

    pub const fn fallback(&self) -> &F {
        &self.fallback
    }

    fn marks(&self) -> Result<MutexGuard<'_, HashMap<OwnerId, Side>>, PersistenceError> {
        self.behind
            .lock()
            .map_err(|_| PersistenceError::new("sync", "storage lock poisoned"))
    }

    fn side_behind(&self, owner: &OwnerId) -> Result<Option<Side>, PersistenceError> {
        Ok(self.marks()?.get(owner).copied())
    }

    fn mark_behind(&self, owner: &OwnerId, side: Side) -> Result<(), PersistenceError> {
        self.marks()?.insert(owner.clone(), side);
        Ok(())
    }

    /// Copy what the lagging store missed. Failures leave the mark in
    /// place for the next call.
    fn catch_up(&self, owner: &OwnerId) -> Result<Option<Side>, PersistenceError> {
        let Some(side) = self.side_behind(owner)? else {
            return Ok(None);
        };
        let copied = match side {
            Side::Primary => copy_season(owner, &self.fallback, &self.primary),
            Side::Fallback => copy_season(owner, &self.primary, &self.fallback),
        };
        match copied {
            Ok(()) => {
                log::info!("{side:?} storage caught up for {owner}");
                self.marks()?.remove(owner);
                Ok(None)
            }
            Err(reason) => {
                log::debug!("{side:?} storage still behind for {owner}: {reason}");
                Ok(Some(side))
            }
        }
    }

    fn read<T>(
        &self,
        owner: &OwnerId,
        operation: &'static str,
        primary: impl FnOnce(&P) -> Result<T, P::Error>,
        fallback: impl FnOnce(&F) -> Result<T, F::Error>,
    ) -> Result<T, PersistenceError> {
        match self.catch_up(owner)? {
            Some(Side::Primary) => fallback(&self.fallback).map_err(|err| {
                PersistenceError::new(operation, format!("primary is behind; fallback: {err}"))
            }),
            Some(Side::Fallback) => primary(&self.primary).map_err(|err| {
                PersistenceError::new(operation, format!("fallback is behind; primary: {err}"))
            }),
            None => match primary(&self.primary) {
                Ok(value) => Ok(value),
                Err(primary_err) => {
                    log::warn!(
                        "Primary storage failed during {operation}: {primary_err}; using fallback"
                    );
                    fallback(&self.fallback).map_err(|fallback_err| {
                        PersistenceError::new(
                            operation,
                            format!("primary: {primary_err}; fallback: {fallback_err}"),
                        )
                    })
                }
            },
        }
    }

    fn write(
        &self,
        owner: &OwnerId,
        operation: &'static str,
        primary: impl FnOnce(&P) -> Result<(), P::Error>,
        fallback: impl FnOnce(&F) -> Result<(), F::Error>,
    ) -> Result<(), PersistenceError> {
        match self.catch_up(owner)? {
            Some(Side::Primary) => fallback(&self.fallback).map_err(|err| {
                PersistenceError::new(operation, format!("primary is behind; fallback: {err}"))
            }),
            Some(Side::Fallback) => primary(&self.primary).map_err(|err| {
                PersistenceError::new(operation, format!("fallback is behind; primary: {err}"))
            }),
            None => match (primary(&self.primary), fallback(&self.fallback)) {
                (Ok(()), Ok(())) => Ok(()),
                (Err(err), Ok(())) => {
                    log::warn!(
                        "Primary storage failed during {operation}: {err}; kept fallback copy"
                    );
                    self.mark_behind(owner, Side::Primary)
                }
                (Ok(()), Err(err)) => {
                    log::warn!("Fallback storage failed during {operation}: {err}");
                    self.mark_behind(owner, Side::Fallback)
                }
                (Err(primary_err), Err(fallback_err)) => Err(PersistenceError::new(
                    operation,
                    format!("primary: {primary_err}; fallback: {fallback_err}"),
                )),
            },
        }
    }
}

/// Bring `to` level with `from`. The lagging store only ever holds a prefix
/// of the log, so the missing entries are the tail past its length.
fn copy_season<A, B>(owner: &OwnerId, from: &A, to: &B) -> Result<(), String>
where
    A: SeasonStorage,
    B: SeasonStorage,
{
    let history = from.load_history(owner).map_err(|err| err.to_string())?;
    let present = to.load_history(owner).map_err(|err| err.to_string())?.len();
    for entry in history.iter().skip(present) {
        to.record_event(owner, entry).map_err(|err| err.to_string())?;
    }
    if let Some(map) = from.load_map(owner).map_err(|err| err.to_string())? {
        to.save_map(owner, &map).map_err(|err| err.to_string())?;
    }
    if let Some(season) = from.load_state(owner).map_err(|err| err.to_string())? {
        to.save_state(owner, &season).map_err(|err| err.to_string())?;
    }
    Ok(())
}

impl<P, F> SeasonStorage for FallbackStorage<P, F>
where
    P: SeasonStorage,
    F: SeasonStorage,
{
    type Error = PersistenceError;

    fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error> {
        self.read(
            owner,
            "load_state",
            |store| store.load_state(owner),
            |store| store.load_state(owner),
        )
    }

    fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error> {
        self.write(
            owner,
            "save_state",
            |store| store.save_state(owner, season),
            |store| store.save_state(owner, season),
        )
    }

    fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error> {
        self.write(
            owner,
            "save_map",
            |store| store.save_map(owner, map),
            |store| store.save_map(owner, map),
        )
    }

    fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error> {
        self.read(
            owner,
            "load_map",
            |store| store.load_map(owner),
            |store| store.load_map(owner),
        )
    }

    fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error> {
        self.write(
            owner,
            "record_event",
            |store| store.record_event(owner, entry),
            |store| store.record_event(owner, entry),
        )
    }

    fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error> {
        self.read(
            owner,
            "load_history",
            |store| store.load_history(owner),
            |store| store.load_history(owner),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarDate;
    use crate::events::EventOutcome;
    use crate::map::PanelCategory;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Store that rejects every call while `down` is set.
    #[derive(Clone, Default)]
    struct Outage {
        inner: MemoryStorage,
        down: Rc<Cell<bool>>,
    }

    impl Outage {
        fn check(&self, operation: &'static str) -> Result<(), PersistenceError> {
            if self.down.get() {
                Err(PersistenceError::new(operation, "connection refused"))
            } else {
                Ok(())
            }
        }
    }

    impl SeasonStorage for Outage {
        type Error = PersistenceError;

        fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error> {
            self.check("load_state")?;
            self.inner.load_state(owner)
        }

        fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error> {
            self.check("save_state")?;
            self.inner.save_state(owner, season)
        }

        fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error> {
            self.check("save_map")?;
            self.inner.save_map(owner, map)
        }

        fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error> {
            self.check("load_map")?;
            self.inner.load_map(owner)
        }

        fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error> {
            self.check("record_event")?;
            self.inner.record_event(owner, entry)
        }

        fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error> {
            self.check("load_history")?;
            self.inner.load_history(owner)
        }
    }

    fn season_at_turn(turns: u32) -> SavedSeason {
        let mut season = SavedSeason::unstarted(8, 3);
        season.progress.total_turns = turns;
        season
    }

    fn entry(seq: u32) -> EventHistoryEntry {
        EventHistoryEntry::from_outcome(
            seq,
            1,
            CalendarDate::season_start(1),
            seq,
            &EventOutcome::quiet_day(PanelCategory::Rest),
        )
    }

    #[test]
    fn memory_storage_reports_missing_saves_as_none() {
        let store = MemoryStorage::new();
        let owner = OwnerId::new("nobody");
        assert_eq!(store.load_state(&owner), Ok(None));
        assert_eq!(store.load_map(&owner), Ok(None));
        assert!(store.load_history(&owner).unwrap().is_empty());
    }

    #[test]
    fn memory_storage_last_write_wins_and_clones_share_slots() {
        let store = MemoryStorage::new();
        let shared = store.clone();
        let owner = OwnerId::new("captain");
        let mut season = SavedSeason::unstarted(1, 3);
        store.save_state(&owner, &season).unwrap();
        season.progress.reputation = 44;
        shared.save_state(&owner, &season).unwrap();
        let loaded = store.load_state(&owner).unwrap().expect("save exists");
        assert_eq!(loaded.progress.reputation, 44);
        assert!(loaded.map.is_none());
        store.delete(&owner).unwrap();
        assert_eq!(shared.load_state(&owner), Ok(None));
    }

    #[test]
    fn fallback_serves_reads_while_primary_is_down() {
        let primary = Outage::default();
        let fallback = MemoryStorage::new();
        let store = FallbackStorage::new(primary.clone(), fallback.clone());
        let owner = OwnerId::new("manager");
        let season = SavedSeason::unstarted(8, 3);

        primary.down.set(true);
        store.save_state(&owner, &season).unwrap();
        assert_eq!(primary.inner.load_state(&owner), Ok(None));
        let loaded = store.load_state(&owner).unwrap().expect("fallback copy");
        assert_eq!(loaded, season);

        primary.down.set(false);
        store.save_state(&owner, &season).unwrap();
        assert_eq!(primary.inner.load_state(&owner), Ok(Some(season)));
    }

    #[test]
    fn recovered_primary_is_caught_up_before_it_is_read() {
        let primary = Outage::default();
        let fallback = MemoryStorage::new();
        let store = FallbackStorage::new(primary.clone(), fallback.clone());
        let owner = OwnerId::new("returning");
        store.save_state(&owner, &season_at_turn(0)).unwrap();

        primary.down.set(true);
        for seq in 1..=4 {
            store.record_event(&owner, &entry(seq)).unwrap();
        }
        store.save_state(&owner, &season_at_turn(4)).unwrap();
        primary.down.set(false);

        let loaded = store.load_state(&owner).unwrap().expect("save exists");
        assert_eq!(loaded.progress.total_turns, 4);
        let primary_copy = primary.inner.load_state(&owner).unwrap().expect("resynced");
        assert_eq!(primary_copy.progress.total_turns, 4);
        let seqs: Vec<u32> = primary
            .inner
            .load_history(&owner)
            .unwrap()
            .iter()
            .map(|entry| entry.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn a_store_that_is_behind_is_never_served() {
        let primary = Outage::default();
        let fallback = Outage::default();
        let store = FallbackStorage::new(primary.clone(), fallback.clone());
        let owner = OwnerId::new("stranded");
        store.save_state(&owner, &season_at_turn(0)).unwrap();

        primary.down.set(true);
        store.save_state(&owner, &season_at_turn(6)).unwrap();
        primary.down.set(false);
        fallback.down.set(true);

        let err = store.load_state(&owner).unwrap_err();
        assert!(err.reason.contains("primary is behind"));
        let err = store.save_state(&owner, &season_at_turn(7)).unwrap_err();
        assert_eq!(err.operation, "save_state");
        assert_eq!(
            primary.inner.load_state(&owner).unwrap().map(|s| s.progress.total_turns),
            Some(0)
        );

        fallback.down.set(false);
        let loaded = store.load_state(&owner).unwrap().expect("save exists");
        assert_eq!(loaded.progress.total_turns, 6);
    }

    #[test]
    fn fallback_fails_only_when_both_stores_fail() {
        let primary = Outage::default();
        let fallback = Outage::default();
        let store = FallbackStorage::new(primary.clone(), fallback.clone());
        primary.down.set(true);
        fallback.down.set(true);
        let err = store
            .save_state(&OwnerId::new("x"), &SavedSeason::unstarted(0, 3))
            .unwrap_err();
        assert_eq!(err.operation, "save_state");
        assert!(err.reason.contains("connection refused"));
    }
}
