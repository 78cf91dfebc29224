//! On-disk copy of the active session pointer, read back by the next process.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::{fs, path::PathBuf};

use crate::models::TimerSession;

pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("focus-timer").join("active_session.json"))
}

#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// A missing or unreadable file means there is no cached session.
    pub fn load(&self) -> Option<TimerSession> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!("Discarding corrupt session cache {}: {}", self.path.display(), err);
                None
            }
        }
    }

    pub fn save(&self, session: &TimerSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write session cache {}", self.path.display()))?;
        debug!("Cached session {}", session.id);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Saves the pointer when there is one, clears the file otherwise.
    pub fn store(&self, session: Option<&TimerSession>) -> Result<()> {
        match session {
            Some(session) => self.save(session),
            None => self.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn session() -> TimerSession {
        TimerSession {
            id: "abc".into(),
            user_id: None,
            selected_duration: 25.0,
            start_time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            end_time: None,
            status: SessionStatus::Paused,
            elapsed_time: 600.0,
            pause_start_time: None,
            total_paused_time: 0.0,
            name: Some("Focus".into()),
            note: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn save_load_clear() {
        let dir = tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("deep").join("active_session.json"));
        assert!(cache.load().is_none());

        cache.save(&session()).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.id, "abc");
        assert_eq!(loaded.elapsed_secs(), 600);

        cache.store(None).unwrap();
        assert!(cache.load().is_none());
        cache.clear().unwrap();
    }

    #[test]
    fn corrupt_cache_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("active_session.json");
        fs::write(&path, "garbage").unwrap();
        assert!(SessionCache::new(path).load().is_none());
    }
}
