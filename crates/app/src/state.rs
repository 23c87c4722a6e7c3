//! Application state management

use std::sync::{Arc, Mutex, PoisonError};

use rand::distributions::Alphanumeric;
use rand::Rng;

use hostel_core::services::accounts;
use hostel_core::{Database, User};

use crate::config::Config;
use crate::error::Result;

/// Environment variable holding the first admin's password
pub const ADMIN_PASSWORD_ENV: &str = "HOSTEL_ADMIN_PASSWORD";

const GENERATED_PASSWORD_LEN: usize = 16;

/// Main application state
pub struct AppState {
    pub config: Config,
    pub db: Arc<Mutex<Database>>,
}

/// Admin account created on first start
#[derive(Debug)]
pub struct BootstrappedAdmin {
    pub user: User,
    /// Set when no password was supplied and one was generated
    pub generated_password: Option<String>,
}

impl AppState {
    /// Open the configured database, creating its directory if needed
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.database_path()?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        Ok(Self {
            config,
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Create the admin account if the user table is empty
    pub fn bootstrap(&self, password: Option<String>) -> Result<Option<BootstrappedAdmin>> {
        let (password, generated) = match password.filter(|p| !p.is_empty()) {
            Some(p) => (p, false),
            None => (generate_password(), true),
        };

        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let created = accounts::bootstrap_admin(&db, &self.config.admin_username, &password)?;

        Ok(created.map(|user| BootstrappedAdmin {
            user,
            generated_password: generated.then_some(password),
        }))
    }
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(dir: &tempfile::TempDir) -> AppState {
        let config = Config {
            database_path: Some(dir.path().join("nested").join("hostel.db")),
            ..Config::default()
        };
        AppState::new(config).unwrap()
    }

    #[test]
    fn test_new_creates_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let _state = state(&dir);
        assert!(dir.path().join("nested").join("hostel.db").exists());
    }

    #[test]
    fn test_bootstrap_generates_password_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        let admin = state.bootstrap(None).unwrap().unwrap();
        assert_eq!(admin.user.username, "admin");
        let password = admin.generated_password.unwrap();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(state.bootstrap(None).unwrap().is_none());

        let db = state.db.lock().unwrap();
        assert!(accounts::login(&db, "admin", &password, 1).is_ok());
    }

    #[test]
    fn test_bootstrap_uses_supplied_password() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        let admin = state.bootstrap(Some("s3cret-pass".into())).unwrap().unwrap();
        assert!(admin.generated_password.is_none());

        let db = state.db.lock().unwrap();
        assert!(accounts::login(&db, "admin", "s3cret-pass", 1).is_ok());
    }
}
