use std::cell::Cell;
use std::rc::Rc;

use clubhouse_game::{
    BuiltinDataLoader, EventHistoryEntry, FallbackStorage, MemberId, MemoryStorage, OwnerId,
    PersistenceError, SavedSeason, SeasonEngine, SeasonMap, SeasonSession, SeasonStorage,
    YearTransition,
};

/// Memory store whose next `failures` calls fail, optionally only for one
/// operation.
#[derive(Clone, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    failures: Rc<Cell<u32>>,
    only: Rc<Cell<Option<&'static str>>>,
}

impl FlakyStorage {
    fn fail_next(&self, count: u32) {
        self.failures.set(count);
        self.only.set(None);
    }

    fn fail_next_of(&self, operation: &'static str, count: u32) {
        self.failures.set(count);
        self.only.set(Some(operation));
    }

    fn gate(&self, operation: &'static str) -> Result<(), PersistenceError> {
        let left = self.failures.get();
        let targeted = self.only.get().is_none_or(|only| only == operation);
        if left > 0 && targeted {
            self.failures.set(left - 1);
            return Err(PersistenceError::new(operation, "remote database unavailable"));
        }
        Ok(())
    }
}

impl SeasonStorage for FlakyStorage {
    type Error = PersistenceError;

    fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error> {
        self.gate("load_state")?;
        self.inner.load_state(owner)
    }

    fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error> {
        self.gate("save_state")?;
        self.inner.save_state(owner, season)
    }

    fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error> {
        self.gate("save_map")?;
        self.inner.save_map(owner, map)
    }

    fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error> {
        self.gate("load_map")?;
        self.inner.load_map(owner)
    }

    fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error> {
        self.gate("record_event")?;
        self.inner.record_event(owner, entry)
    }

    fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error> {
        self.gate("load_history")?;
        self.inner.load_history(owner)
    }
}

fn roster() -> Vec<MemberId> {
    vec![MemberId::new("yuki"), MemberId::new("taro"), MemberId::new("mio")]
}

fn play_turns(session: &mut SeasonSession, turns: usize) {
    for _ in 0..turns {
        let report = session.select_card(0, &roster()).unwrap();
        let choice = (!report.pending.outcome.choices.is_empty()).then_some(0);
        session.execute_event(choice).unwrap();
    }
}

/// Rest month by month until the school year rolls over.
fn rest_until_next_year(session: &mut SeasonSession) {
    let year = session.progress().current_year;
    for _ in 0..24 {
        let report = session.advance_month(&roster()).unwrap();
        let choice = (!report.pending.outcome.choices.is_empty()).then_some(0);
        let resolution = session.execute_event(choice).unwrap();
        if matches!(resolution.transition, Some(YearTransition::NextYear { .. })) {
            assert_eq!(session.progress().current_year, year + 1);
            return;
        }
    }
    panic!("year {year} never ended");
}

#[test]
fn failed_commits_keep_work_queued_until_a_retry_succeeds() {
    let storage = FlakyStorage::default();
    let engine = SeasonEngine::new(BuiltinDataLoader, storage.clone());
    let owner = OwnerId::new("flaky");
    let mut session = engine.open(owner.clone(), 11).unwrap();
    play_turns(&mut session, 3);
    assert_eq!(session.queued_events().len(), 3);

    storage.fail_next(1);
    let err = engine.commit(&mut session).unwrap_err();
    assert_eq!(err.operation, "record_event");
    assert!(session.is_dirty());
    assert_eq!(session.queued_events().len(), 3);

    storage.fail_next_of("save_state", 1);
    let err = engine.commit(&mut session).unwrap_err();
    assert_eq!(err.operation, "save_state");
    assert!(session.queued_events().is_empty());
    assert!(session.is_dirty());

    engine.commit(&mut session).unwrap();
    assert!(!session.is_dirty());
    let history = engine.load_history(&owner).unwrap();
    let seqs: Vec<u32> = history.iter().map(|entry| entry.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3], "no entry lost or duplicated");

    let reloaded = engine.open(owner, 0).unwrap();
    assert_eq!(reloaded.progress(), session.progress());
}

#[test]
fn in_memory_state_stays_authoritative_while_storage_is_down() {
    let storage = FlakyStorage::default();
    let engine = SeasonEngine::new(BuiltinDataLoader, storage.clone());
    let mut session = engine.open(OwnerId::new("offline"), 3).unwrap();
    storage.fail_next(u32::MAX);
    play_turns(&mut session, 2);
    assert!(engine.commit(&mut session).is_err());
    play_turns(&mut session, 2);
    assert_eq!(session.queued_events().len(), 4);
    assert_eq!(session.progress().total_turns, 4);

    storage.fail_next(0);
    engine.commit(&mut session).unwrap();
    assert_eq!(engine.load_history(session.owner()).unwrap().len(), 4);
}

#[test]
fn saves_round_trip_through_json() {
    let engine = SeasonEngine::new(BuiltinDataLoader, MemoryStorage::new());
    let owner = OwnerId::new("json");
    let mut session = engine.open(owner.clone(), 0x5EED).unwrap();
    play_turns(&mut session, 5);
    session.select_card(0, &roster()).unwrap();

    let progress = session.progress().clone();
    let map = session.map().cloned().unwrap();
    let saved = SavedSeason {
        progress: progress.clone(),
        map: Some(map.clone()),
    };
    let back: SavedSeason = serde_json::from_str(&serde_json::to_string(&saved).unwrap()).unwrap();
    assert_eq!(back, saved);
    assert_eq!(back.map.as_ref().map(SeasonMap::fingerprint), Some(map.fingerprint()));
    assert!(back.progress.pending_event().is_some());
    back.progress.validate_against(&map).unwrap();

    let entry = progress.season_history.last().cloned().unwrap();
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["category"], entry.category.as_str());
    let entry_back: EventHistoryEntry = serde_json::from_value(json).unwrap();
    assert_eq!(entry_back, entry);
}

#[test]
fn engine_works_through_a_fallback_store() {
    let remote = FlakyStorage::default();
    let local = MemoryStorage::new();
    let engine = SeasonEngine::new(
        BuiltinDataLoader,
        FallbackStorage::new(remote.clone(), local.clone()),
    );
    let owner = OwnerId::new("commuter");
    let mut session = engine.open(owner.clone(), 21).unwrap();
    remote.fail_next(u32::MAX);
    play_turns(&mut session, 4);
    engine.commit(&mut session).unwrap();

    assert!(remote.inner.load_state(&owner).unwrap().is_none());
    assert_eq!(local.load_history(&owner).unwrap().len(), 4);
    let reloaded = engine.open(owner, 0).unwrap();
    assert_eq!(reloaded.progress(), session.progress());
}

#[test]
fn a_failed_commit_at_year_end_leaves_the_previous_year_loadable() {
    let storage = FlakyStorage::default();
    let engine = SeasonEngine::new(BuiltinDataLoader, storage.clone());
    let owner = OwnerId::new("graduation");
    let mut session = engine.open(owner.clone(), 404).unwrap();
    engine.commit(&mut session).unwrap();
    let year_one = session.snapshot();

    rest_until_next_year(&mut session);
    storage.fail_next_of("save_state", 1);
    let err = engine.commit(&mut session).unwrap_err();
    assert_eq!(err.operation, "save_state");

    let before_retry = engine.open(owner.clone(), 0).unwrap();
    assert_eq!(before_retry.snapshot(), year_one);
    assert_eq!(before_retry.progress().current_year, 1);

    engine.commit(&mut session).unwrap();
    let reloaded = engine.open(owner.clone(), 0).unwrap();
    assert_eq!(reloaded.progress().current_year, 2);
    assert_eq!(reloaded.snapshot(), session.snapshot());
    let published = storage.load_map(&owner).unwrap().expect("board published");
    assert_eq!(published.year, 2);
}

#[test]
fn a_failed_board_publish_does_not_block_loading() {
    let storage = FlakyStorage::default();
    let engine = SeasonEngine::new(BuiltinDataLoader, storage.clone());
    let owner = OwnerId::new("noticeboard");
    let mut session = engine.open(owner.clone(), 405).unwrap();
    engine.commit(&mut session).unwrap();

    rest_until_next_year(&mut session);
    storage.fail_next_of("save_map", 1);
    let err = engine.commit(&mut session).unwrap_err();
    assert_eq!(err.operation, "save_map");
    assert_eq!(storage.load_map(&owner).unwrap().map(|map| map.year), Some(1));

    let reloaded = engine.open(owner, 0).unwrap();
    assert_eq!(reloaded.snapshot(), session.snapshot());
    assert_eq!(reloaded.map().map(|map| map.year), Some(2));
}

#[test]
fn a_snapshot_written_on_its_own_is_a_complete_save() {
    let storage = MemoryStorage::new();
    let engine = SeasonEngine::new(BuiltinDataLoader, storage.clone());
    let owner = OwnerId::new("quicksave");
    let mut session = engine.open(owner.clone(), 406).unwrap();
    engine.commit(&mut session).unwrap();

    rest_until_next_year(&mut session);
    storage.save_state(&owner, &session.snapshot()).unwrap();

    let reloaded = engine.open(owner, 0).unwrap();
    assert_eq!(reloaded.progress(), session.progress());
    assert_eq!(reloaded.map(), session.map());
}

#[test]
fn turns_played_during_a_remote_outage_survive_its_recovery() {
    let remote = FlakyStorage::default();
    let local = MemoryStorage::new();
    let engine = SeasonEngine::new(
        BuiltinDataLoader,
        FallbackStorage::new(remote.clone(), local.clone()),
    );
    let owner = OwnerId::new("flaky-wifi");
    let mut session = engine.open(owner.clone(), 31).unwrap();
    engine.commit(&mut session).unwrap();

    remote.fail_next(u32::MAX);
    play_turns(&mut session, 4);
    engine.commit(&mut session).unwrap();
    remote.fail_next(0);

    let reloaded = engine.open(owner.clone(), 0).unwrap();
    assert_eq!(reloaded.progress().total_turns, 4);
    assert_eq!(reloaded.progress(), session.progress());
    assert_eq!(engine.load_history(&owner).unwrap().len(), 4);

    let remote_copy = remote.inner.load_state(&owner).unwrap().expect("remote resynced");
    assert_eq!(&remote_copy.progress, session.progress());
    assert_eq!(remote.inner.load_history(&owner).unwrap().len(), 4);
}
