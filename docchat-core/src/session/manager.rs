//! Session manager for handling multiple sessions

use super::store::{DocumentContext, Session, Turn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manages conversation sessions persisted under the workspace
#[derive(Debug)]
pub struct SessionManager {
    /// Sessions directory
    sessions_dir: PathBuf,
    /// In-memory cache of sessions
    cache: HashMap<String, Session>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new<P: AsRef<Path>>(workspace: P) -> Self {
        let sessions_dir = workspace.as_ref().join("sessions");
        Self {
            sessions_dir,
            cache: HashMap::new(),
        }
    }

    /// Get or create a session
    pub fn get_or_create(&mut self, key: impl Into<String>) -> &mut Session {
        let key = key.into();

        if !self.cache.contains_key(&key) {
            let session = self.load(&key).unwrap_or_else(|| Session::new(&key));
            self.cache.insert(key.clone(), session);
        }

        self.cache.get_mut(&key).unwrap()
    }

    /// Get a session if it exists in the cache
    pub fn get(&self, key: &str) -> Option<&Session> {
        self.cache.get(key)
    }

    /// Load a session from disk
    fn load(&self, key: &str) -> Option<Session> {
        let path = self.session_path(key);

        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        let mut turns = Vec::new();
        let mut document: Option<DocumentContext> = None;
        let mut created_at = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                if value.get("_type").and_then(|v| v.as_str()) == Some("metadata") {
                    created_at = value
                        .get("created_at")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok());
                    if let Some(doc) = value.get("document") {
                        document = serde_json::from_value(doc.clone()).ok();
                    }
                } else if let Ok(turn) = serde_json::from_value::<Turn>(value) {
                    turns.push(turn);
                }
            }
        }

        debug!(key, turns = turns.len(), has_document = document.is_some(), "loaded session");

        Some(Session {
            key: key.to_string(),
            turns,
            document,
            created_at: created_at.unwrap_or_else(chrono::Utc::now),
            updated_at: chrono::Utc::now(),
        })
    }

    /// Save a session to disk
    pub fn save(&self, session: &Session) -> crate::Result<()> {
        std::fs::create_dir_all(&self.sessions_dir)?;
        let path = self.session_path(&session.key);

        let mut lines = Vec::new();

        // Metadata line carries the document context; it is not a turn
        let metadata = serde_json::json!({
            "_type": "metadata",
            "created_at": session.created_at.to_rfc3339(),
            "updated_at": session.updated_at.to_rfc3339(),
            "document": session.document,
        });
        lines.push(serde_json::to_string(&metadata)?);

        for turn in &session.turns {
            lines.push(serde_json::to_string(turn)?);
        }

        std::fs::write(&path, lines.join("\n"))?;
        debug!(key = %session.key, turns = session.turns.len(), "saved session");
        Ok(())
    }

    /// Delete a session
    pub fn delete(&mut self, key: &str) -> crate::Result<bool> {
        self.cache.remove(key);

        let path = self.session_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            debug!(key, "deleted session");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List all persisted sessions
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions = Vec::new();

        if let Ok(entries) = std::fs::read_dir(&self.sessions_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if name.ends_with(".jsonl") {
                        let key = name.trim_end_matches(".jsonl").replace('_', ":");
                        if let Ok(content) = std::fs::read_to_string(entry.path()) {
                            if let Some(first_line) = content.lines().next() {
                                if let Ok(value) =
                                    serde_json::from_str::<serde_json::Value>(first_line)
                                {
                                    if value.get("_type").and_then(|v| v.as_str())
                                        == Some("metadata")
                                    {
                                        sessions.push(SessionInfo {
                                            key,
                                            created_at: value
                                                .get("created_at")
                                                .and_then(|v| v.as_str())
                                                .map(|s| s.to_string()),
                                            updated_at: value
                                                .get("updated_at")
                                                .and_then(|v| v.as_str())
                                                .map(|s| s.to_string()),
                                            path: entry.path().to_string_lossy().to_string(),
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Get the file path for a session
    fn session_path(&self, key: &str) -> PathBuf {
        let safe_key = key.replace([':', '/', '\\'], "_");
        self.sessions_dir.join(format!("{}.jsonl", safe_key))
    }
}

/// Information about a persisted session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session key
    pub key: String,
    /// Creation time
    pub created_at: Option<String>,
    /// Last update time
    pub updated_at: Option<String>,
    /// File path
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SessionManager::new(temp_dir.path());
        assert!(manager.list_sessions().is_empty());
    }

    #[test]
    fn test_get_or_create_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SessionManager::new(temp_dir.path());

        let session = manager.get_or_create("cli:chat");
        session.push_user("Hello");

        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.key, "cli:chat");
    }

    #[test]
    fn test_save_and_load_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SessionManager::new(temp_dir.path());

        let session = manager.get_or_create("cli:persist");
        session.push_user("Question");
        session.push_assistant("Answer");
        session.attach_document("report.pdf", "extracted body");
        let key = session.key.clone();

        manager.save(&manager.cache.get(&key).unwrap()).unwrap();

        // Clear cache and reload
        manager.cache.clear();
        let session = manager.get_or_create("cli:persist");

        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].content, "Question");
        let doc = session.document.as_ref().unwrap();
        assert_eq!(doc.file_name, "report.pdf");
        assert_eq!(doc.text, "extracted body");
    }

    #[test]
    fn test_cleared_session_persists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SessionManager::new(temp_dir.path());

        let session = manager.get_or_create("cli:reset");
        session.push_user("Hello");
        session.attach_document("a.txt", "text");
        session.clear();
        let snapshot = session.clone();
        manager.save(&snapshot).unwrap();

        manager.cache.clear();
        let reloaded = manager.get_or_create("cli:reset");
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_delete_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SessionManager::new(temp_dir.path());

        let session = manager.get_or_create("cli:gone");
        session.push_user("Hello");
        let snapshot = session.clone();
        manager.save(&snapshot).unwrap();

        assert!(manager.delete("cli:gone").unwrap());
        assert!(!manager.delete("cli:gone").unwrap());
        assert!(manager.list_sessions().is_empty());
    }
}
