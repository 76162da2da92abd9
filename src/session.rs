//! Persisted session token.
//!
//! The token lives in a small JSON file under a fixed key so that a restart
//! can re-authenticate without asking for credentials again.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::SessionToken;

/// Key of the token in the session file.
pub const SESSION_KEY: &str = "rowdeck_token";

#[derive(Debug)]
pub enum SessionError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "session file error: {}", e),
            SessionError::Parse(e) => write!(f, "session file is corrupt: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            SessionError::Parse(e) => Some(e),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Parse(e)
    }
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "rowdeck_token", default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

/// Reads and writes the session file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the saved token, or `None` when no session is stored.
    pub fn load(&self) -> Result<Option<SessionToken>, SessionError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: SessionFile = serde_json::from_str(&data)?;
        Ok(file.token.filter(|t| !t.is_empty()).map(SessionToken))
    }

    pub fn save(&self, token: &SessionToken) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = SessionFile {
            token: Some(token.as_str().to_string()),
        };
        let data = serde_json::to_vec_pretty(&file)?;
        let mut out = open_private(&self.path)?;
        out.write_all(&data)?;
        out.sync_all()?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Removes the saved session. Succeeds when none exists.
    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens `path` for writing, readable by the owner only before any byte lands in it.
#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies to new files
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("nested/session.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&SessionToken("abc".into())).unwrap();
        assert_eq!(store.load().unwrap(), Some(SessionToken("abc".into())));

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[SESSION_KEY], "abc");

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&SessionToken("abc".into())).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_over_readable_file_tightens_and_truncates() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, format!(r#"{{"{}": "{}"}}"#, SESSION_KEY, "x".repeat(200))).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::new(&path);
        store.save(&SessionToken("short".into())).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().unwrap(), Some(SessionToken("short".into())));
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SessionStore::new(&path).load(),
            Err(SessionError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_key_means_no_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"other": 1}"#).unwrap();
        assert_eq!(SessionStore::new(&path).load().unwrap(), None);
    }
}
