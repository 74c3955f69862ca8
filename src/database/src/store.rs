use core::{GameSession, GameTimer};
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// The independently persisted records of a live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    /// The timer record.
    Timer,
    /// The pitch/session record.
    Pitch,
    /// Whether the interactive editor view is currently open.
    EditorOpen,
}

impl StoreKey {
    fn file_name(&self) -> &'static str {
        match self {
            StoreKey::Timer => "timer.json",
            StoreKey::Pitch => "pitch.json",
            StoreKey::EditorOpen => "editor_open.json",
        }
    }
}

/// Keyed JSON records on disk, shared by every part of the application.
///
/// This is the single source of truth for the live game: the monitor and
/// synchronizer loops read it at their own cadence, the executor and the
/// external editor write it. Consumers re-read before mutating; the store
/// itself takes no locks.
///
/// Every successful write publishes its key on a broadcast channel so
/// observers can react to changes made by other writers without polling
/// faster.
pub struct LocalStore {
    root: PathBuf,
    changes: broadcast::Sender<StoreKey>,
}

impl LocalStore {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let (changes, _) = broadcast::channel(64);

        Ok(LocalStore { root, changes })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreKey> {
        self.changes.subscribe()
    }

    pub fn load_timer(&self) -> Option<GameTimer> {
        self.load(StoreKey::Timer)
    }

    pub fn save_timer(&self, timer: &GameTimer) -> io::Result<()> {
        self.save(StoreKey::Timer, timer)
    }

    pub fn load_session(&self) -> Option<GameSession> {
        self.load(StoreKey::Pitch)
    }

    pub fn save_session(&self, session: &GameSession) -> io::Result<()> {
        self.save(StoreKey::Pitch, session)
    }

    pub fn editor_open(&self) -> bool {
        self.load(StoreKey::EditorOpen).unwrap_or(false)
    }

    pub fn set_editor_open(&self, open: bool) -> io::Result<()> {
        self.save(StoreKey::EditorOpen, &open)
    }

    /// Removes every record. Used when the game is closed or a new session
    /// replaces it.
    pub fn clear(&self) -> io::Result<()> {
        for key in [StoreKey::Timer, StoreKey::Pitch, StoreKey::EditorOpen] {
            let path = self.root.join(key.file_name());

            match fs::remove_file(&path) {
                Ok(()) => {
                    let _ = self.changes.send(key);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// A malformed record is treated as "no session", never as a fatal
    /// error: the game must keep moving even if a record was corrupted.
    fn load<T: DeserializeOwned>(&self, key: StoreKey) -> Option<T> {
        let path = self.root.join(key.file_name());
        let contents = fs::read_to_string(&path).ok()?;

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("discarding malformed record {}: {}", key.file_name(), err);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: StoreKey, value: &T) -> io::Result<()> {
        let path = self.root.join(key.file_name());
        let data = serde_json::to_vec(value).map_err(io::Error::other)?;

        fs::write(&path, data)?;

        // Nobody listening is fine
        let _ = self.changes.send(key);

        Ok(())
    }
}
