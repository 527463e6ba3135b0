use clubhouse_game::{EventHistoryEntry, OwnerId, SavedSeason, SeasonMap, SeasonStorage};
use serde::Serialize;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const STATE_FILE: &str = "state.json";
const MAP_FILE: &str = "map.json";
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Error)]
pub enum JsonStoreError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One directory per owner: the whole snapshot (progress and its board) and
/// the published board as JSON, history as JSON lines. Both JSON files are
/// replaced through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct JsonDirStorage {
    root: PathBuf,
}

impl JsonDirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn owner_dir(&self, owner: &OwnerId) -> PathBuf {
        let safe: String = owner
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(safe)
    }

    fn ensure_dir(&self, owner: &OwnerId) -> Result<PathBuf, JsonStoreError> {
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir).map_err(|source| JsonStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> JsonStoreError + '_ {
    move |source| JsonStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_err(path: &Path) -> impl FnOnce(serde_json::Error) -> JsonStoreError + '_ {
    move |source| JsonStoreError::Json {
        path: path.to_path_buf(),
        source,
    }
}

fn replace_file<T: Serialize>(path: &Path, value: &T) -> Result<(), JsonStoreError> {
    let payload = serde_json::to_vec_pretty(value).map_err(json_err(path))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}

fn read_optional(path: &Path) -> Result<Option<String>, JsonStoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path)(err)),
    }
}

impl SeasonStorage for JsonDirStorage {
    type Error = JsonStoreError;

    fn load_state(&self, owner: &OwnerId) -> Result<Option<SavedSeason>, Self::Error> {
        let path = self.owner_dir(owner).join(STATE_FILE);
        read_optional(&path)?
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(json_err(&path))
    }

    fn save_state(&self, owner: &OwnerId, season: &SavedSeason) -> Result<(), Self::Error> {
        let dir = self.ensure_dir(owner)?;
        replace_file(&dir.join(STATE_FILE), season)
    }

    fn save_map(&self, owner: &OwnerId, map: &SeasonMap) -> Result<(), Self::Error> {
        let dir = self.ensure_dir(owner)?;
        replace_file(&dir.join(MAP_FILE), map)
    }

    fn load_map(&self, owner: &OwnerId) -> Result<Option<SeasonMap>, Self::Error> {
        let path = self.owner_dir(owner).join(MAP_FILE);
        read_optional(&path)?
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(json_err(&path))
    }

    fn record_event(&self, owner: &OwnerId, entry: &EventHistoryEntry) -> Result<(), Self::Error> {
        let path = self.ensure_dir(owner)?.join(HISTORY_FILE);
        let mut line = serde_json::to_string(entry).map_err(json_err(&path))?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        file.write_all(line.as_bytes()).map_err(io_err(&path))
    }

    fn load_history(&self, owner: &OwnerId) -> Result<Vec<EventHistoryEntry>, Self::Error> {
        let path = self.owner_dir(owner).join(HISTORY_FILE);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&path)(err)),
        };
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_err(&path))?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line).map_err(json_err(&path))?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubhouse_game::{BuiltinDataLoader, MemberId, SeasonEngine};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!(
            "clubhouse-store-{tag}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn missing_saves_are_none_not_errors() {
        let store = JsonDirStorage::new(scratch_dir("missing"));
        let owner = OwnerId::new("nobody");
        assert!(store.load_state(&owner).unwrap().is_none());
        assert!(store.load_map(&owner).unwrap().is_none());
        assert!(store.load_history(&owner).unwrap().is_empty());
    }

    #[test]
    fn engine_round_trips_through_the_directory() {
        let root = scratch_dir("engine");
        let engine = SeasonEngine::new(BuiltinDataLoader, JsonDirStorage::new(&root));
        let owner = OwnerId::new("club/room 3");
        let roster = vec![MemberId::new("rin"), MemberId::new("sota")];
        let mut session = engine.open(owner.clone(), 808).unwrap();
        for _ in 0..4 {
            let report = session.select_card(0, &roster).unwrap();
            let choice = (!report.pending.outcome.choices.is_empty()).then_some(0);
            session.execute_event(choice).unwrap();
        }
        engine.commit(&mut session).unwrap();

        let dir = root.join("club_room_3");
        assert!(dir.join(STATE_FILE).exists());
        fs::remove_file(dir.join(MAP_FILE)).unwrap();
        let reloaded = engine.open(owner.clone(), 0).unwrap();
        assert_eq!(reloaded.progress(), session.progress());
        assert_eq!(reloaded.map(), session.map());
        let seqs: Vec<u32> = engine
            .load_history(&owner)
            .unwrap()
            .iter()
            .map(|entry| entry.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn corrupt_snapshots_surface_as_json_errors() {
        let root = scratch_dir("corrupt");
        let store = JsonDirStorage::new(&root);
        let owner = OwnerId::new("broken");
        let dir = store.ensure_dir(&owner).unwrap();
        fs::write(dir.join(STATE_FILE), "{ not json").unwrap();
        assert!(matches!(
            store.load_state(&owner),
            Err(JsonStoreError::Json { .. })
        ));
        let _ = fs::remove_dir_all(root);
    }
}
