//! Clubhouse Season Engine
//!
//! Platform-agnostic season loop for the Clubhouse school-club life-sim:
//! movement cards, procedurally generated season boards, panel events, the
//! turn/calendar state machine and the persistence seams around it. Nothing
//! here renders, authenticates, or computes roster stats.

pub mod calendar;
pub mod cards;
pub mod config;
pub mod constants;
pub mod events;
pub mod machine;
pub mod map;
pub mod numbers;
pub mod progress;
pub mod result;
pub mod rng;
pub mod session;
pub mod storage;
#[cfg(feature = "async")]
pub mod timed;

use anyhow::Context;
use serde::de::DeserializeOwned;

// Re-export commonly used types
pub use calendar::{CalendarAdvance, CalendarDate, days_in_month};
pub use cards::{Card, CardId, CardTag, CardTags, Hand, draw_card, generate_hand, hand_capacity};
pub use config::{
    CardConfig, ConfigError, FixedEventDef, MapConfig, Placement, SeasonConfig, ValueWeight,
};
pub use events::{
    EventCatalog, EventChoice, EventOutcome, EventTemplate, MemberId, Participants, ResolveError,
    SpecialEffect, StatDeltas, resolve_event, resolve_scripted,
};
pub use machine::{
    EventResolution, SeasonError, SeasonMachine, TurnKind, TurnReport, YearTransition,
};
pub use map::{
    Panel, PanelCategory, PanelDistribution, PanelKind, PanelWeights, ScriptedEvent, SeasonMap,
    UnknownPanelType, generate_season_map,
};
pub use progress::{EventHistoryEntry, GameProgress, PendingEvent, Phase, PhaseLabel, YearSummary};
pub use result::CampaignSummary;
pub use rng::RngBundle;
pub use session::{SeasonSession, SeasonView};
pub use storage::{FallbackStorage, MemoryStorage, OwnerId, PersistenceError, SavedSeason};
#[cfg(feature = "async")]
pub use timed::persist_with_timeout;

/// Name of the season configuration served by [`DataLoader::load_config`].
pub const SEASON_CONFIG_NAME: &str = "season";

/// Trait for abstracting data loading operations
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the generic event templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    fn load_event_catalog(&self) -> Result<EventCatalog, Self::Error>;

    /// Load configuration data for a specific system
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

/// Errors raised by [`BuiltinDataLoader`].
#[derive(Debug, thiserror::Error)]
pub enum BuiltinDataError {
    #[error("unknown config: {0}")]
    UnknownConfig(String),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serves the JSON assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDataLoader;

impl DataLoader for BuiltinDataLoader {
    type Error = BuiltinDataError;

    fn load_event_catalog(&self) -> Result<EventCatalog, Self::Error> {
        EventCatalog::builtin().map_err(BuiltinDataError::Json)
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        let json = match config_name {
            SEASON_CONFIG_NAME => include_str!("../assets/season.json"),
            other => return Err(BuiltinDataError::UnknownConfig(other.to_string())),
        };
        serde_json::from_str(json).map_err(BuiltinDataError::Json)
    }
}

/// Persistence adapter contract.
///
/// A snapshot is the progress together with the board it was played on,
/// written as one whole value with last-write-wins. The event log is
/// append-only. A missing save is `Ok(None)`, never an error.
pub trait SeasonStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the latest snapshot for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error>;

    /// Replace the whole snapshot for `owner`. Must not leave a mix of the
    /// old and new snapshot behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error>;

    /// Publish the active board for board-only readers. Loading a save
    /// never reads it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the board cannot be written.
    fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error>;

    /// The last board published with [`Self::save_map`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error>;

    /// Append one finalized history entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error>;

    /// Every recorded history entry for `owner`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error>;
}

/// Main engine for opening and persisting saves
pub struct SeasonEngine<L, S>
where
    L: DataLoader,
    S: SeasonStorage,
{
    data_loader: L,
    storage: S,
}

impl<L, S> SeasonEngine<L, S>
where
    L: DataLoader,
    S: SeasonStorage,
{
    /// Create a new engine with the provided data loader and storage
    pub const fn new(data_loader: L, storage: S) -> Self {
        Self {
            data_loader,
            storage,
        }
    }

    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the season configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn load_config(&self) -> Result<SeasonConfig, L::Error> {
        self.data_loader.load_config(SEASON_CONFIG_NAME)
    }

    /// Start a brand-new save, ignoring whatever storage holds. The returned
    /// session owes storage its full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if data cannot be loaded or the season cannot be
    /// dealt.
    pub fn new_session(&self, owner: OwnerId, seed: u64) -> anyhow::Result<SeasonSession>
    where
        L::Error: Into<anyhow::Error>,
    {
        let config = self.load_config().map_err(Into::into)?;
        let catalog = self.data_loader.load_event_catalog().map_err(Into::into)?;
        let machine = SeasonMachine::new_campaign(seed, config, catalog)
            .with_context(|| format!("failed to start a season for {owner}"))?;
        Ok(SeasonSession::new(owner, machine, true))
    }

    /// Load the save of `owner`, or start one from `seed` when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or data cannot be read, or the stored
    /// save is inconsistent.
    pub fn open(&self, owner: OwnerId, seed: u64) -> anyhow::Result<SeasonSession>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(saved) = self.storage.load_state(&owner).map_err(Into::into)? else {
            log::info!("No save for {owner}; starting a new campaign from seed {seed}");
            return self.new_session(owner, seed);
        };
        let config = self.load_config().map_err(Into::into)?;
        let catalog = self.data_loader.load_event_catalog().map_err(Into::into)?;
        let mut machine = SeasonMachine::resume(saved.progress, saved.map, config, catalog)
            .with_context(|| format!("stored save for {owner} is unusable"))?;
        let fresh = machine.phase() == PhaseLabel::Uninitialized;
        if fresh {
            machine.initialize()?;
        }
        Ok(SeasonSession::new(owner, machine, fresh))
    }

    /// Write everything `session` still owes storage.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` on the first failed write; unwritten work
    /// stays queued in the session for the next attempt.
    pub fn commit(&self, session: &mut SeasonSession) -> Result<(), PersistenceError> {
        session.flush(&self.storage).inspect_err(|err| {
            log::warn!("Commit for {} failed: {err}", session.owner());
        })
    }

    /// Recorded history for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, S::Error> {
        self.storage.load_history(owner)
    }
}
