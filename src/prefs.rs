use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid preferences file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Preferences lock poisoned")]
    Poisoned,
}

/// Durable user flags. Both switches default to off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub location_enabled: bool,
    #[serde(default)]
    pub last_alerted_id: Option<String>,
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences, PrefsError>;
    fn update(&self, f: &dyn Fn(&mut Preferences)) -> Result<Preferences, PrefsError>;

    fn notifications_enabled(&self) -> Result<bool, PrefsError> {
        Ok(self.load()?.notifications_enabled)
    }

    fn set_notifications_enabled(&self, enabled: bool) -> Result<(), PrefsError> {
        self.update(&|p| p.notifications_enabled = enabled).map(|_| ())
    }

    fn location_enabled(&self) -> Result<bool, PrefsError> {
        Ok(self.load()?.location_enabled)
    }

    fn set_location_enabled(&self, enabled: bool) -> Result<(), PrefsError> {
        self.update(&|p| p.location_enabled = enabled).map(|_| ())
    }

    fn last_alerted_id(&self) -> Result<Option<String>, PrefsError> {
        Ok(self.load()?.last_alerted_id)
    }

    fn set_last_alerted_id(&self, id: &str) -> Result<(), PrefsError> {
        self.update(&|p| p.last_alerted_id = Some(id.to_string())).map(|_| ())
    }
}

/// In-process store, used by tests and when no data directory is writable.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    inner: Mutex<Preferences>,
}

impl MemoryPreferences {
    pub fn new(initial: Preferences) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<Preferences, PrefsError> {
        Ok(self.inner.lock().map_err(|_| PrefsError::Poisoned)?.clone())
    }

    fn update(&self, f: &dyn Fn(&mut Preferences)) -> Result<Preferences, PrefsError> {
        let mut prefs = self.inner.lock().map_err(|_| PrefsError::Poisoned)?;
        f(&mut prefs);
        Ok(prefs.clone())
    }
}

/// JSON file store. Every read goes to disk, so a change made by another
/// process (the CLI toggles) is seen by a running monitor on its next check.
/// Writes go to a sibling temp file which is then renamed over the target.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferences {
    pub const FILE_NAME: &'static str = "preferences.json";

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        // Surface a corrupt file at startup rather than on the first check
        store.read()?;
        Ok(store)
    }

    /// Open `preferences.json` inside `data_dir`, creating the directory if needed.
    pub fn in_dir(data_dir: &Path) -> Result<Self, PrefsError> {
        std::fs::create_dir_all(data_dir)?;
        Self::open(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Preferences, PrefsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preferences at {:?}, using defaults", self.path);
                return Ok(Preferences::default());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Preferences::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!("Failed to replace {:?}: {}", self.path, e);
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self) -> Result<Preferences, PrefsError> {
        self.read()
    }

    fn update(&self, f: &dyn Fn(&mut Preferences)) -> Result<Preferences, PrefsError> {
        let _guard = self.write_lock.lock().map_err(|_| PrefsError::Poisoned)?;
        let current = self.read()?;
        let mut next = current.clone();
        f(&mut next);
        if next != current {
            self.persist(&next)?;
        }
        Ok(next)
    }
}
