//! Local persistence of the joined player so a restarted client can resume.

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;
use tracing::debug;

use crate::state::game::Player;

/// Failure reading or writing the local identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to access identity file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("identity file {path} does not hold a player record")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where a client keeps the identity of its own player between restarts.
pub trait IdentitySlot: Send + Sync {
    /// The saved player, or `None` when nobody joined from this client.
    fn load(&self) -> Result<Option<Player>, IdentityError>;
    fn save(&self, player: &Player) -> Result<(), IdentityError>;
    fn clear(&self) -> Result<(), IdentityError>;
}

/// Identity stored as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileIdentitySlot {
    path: PathBuf,
}

impl FileIdentitySlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> IdentityError {
        IdentityError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl IdentitySlot for FileIdentitySlot {
    fn load(&self) -> Result<Option<Player>, IdentityError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| IdentityError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, player: &Player) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let contents = serde_json::to_vec_pretty(player).map_err(|source| IdentityError::Decode {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, contents).map_err(|err| self.io_error(err))?;
        debug!(path = %self.path.display(), player_id = %player.id, "saved identity");
        Ok(())
    }

    fn clear(&self) -> Result<(), IdentityError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Identity kept in process memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentitySlot {
    slot: Arc<Mutex<Option<Player>>>,
}

impl MemoryIdentitySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentitySlot for MemoryIdentitySlot {
    fn load(&self) -> Result<Option<Player>, IdentityError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, player: &Player) -> Result<(), IdentityError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(player.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), IdentityError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn ada() -> Player {
        Player {
            id: "p1".into(),
            name: "Ada".into(),
            secrets: vec!["likes tea".into(), "hates snow".into()],
            score: 30,
            joined_at: 7,
            gift_suitability: BTreeMap::new(),
        }
    }

    #[test]
    fn file_slot_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileIdentitySlot::new(dir.path().join("nested/identity.json"));

        assert!(slot.load().unwrap().is_none());
        slot.save(&ada()).unwrap();
        assert_eq!(slot.load().unwrap(), Some(ada()));

        slot.clear().unwrap();
        assert!(slot.load().unwrap().is_none());
        slot.clear().unwrap();
    }

    #[test]
    fn file_slot_reports_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, b"not json").unwrap();

        let err = FileIdentitySlot::new(&path).load().unwrap_err();
        assert!(matches!(err, IdentityError::Decode { .. }));
    }

    #[test]
    fn memory_slot_clones_share_state() {
        let slot = MemoryIdentitySlot::new();
        let other = slot.clone();
        slot.save(&ada()).unwrap();
        assert_eq!(other.load().unwrap().unwrap().id, "p1");
        other.clear().unwrap();
        assert!(slot.load().unwrap().is_none());
    }
}
