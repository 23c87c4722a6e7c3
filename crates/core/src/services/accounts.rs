//! Accounts, sessions and per-user settings

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{NotificationPreferences, Role, Session, Theme, User};
use crate::permissions::{Capability, PermissionMatrix};
use crate::storage::{Database, UserStore};

/// Default session lifetime: one week
pub const SESSION_HOURS: i64 = 24 * 7;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 32 random bytes, URL-safe base64
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

fn insert_user(users: &UserStore<'_>, new: &NewUser) -> Result<User> {
    let username = new.username.trim();
    validate_credentials(username, &new.password)?;
    if users.find_by_username(username)?.is_some() {
        return Err(Error::Validation("Username already exists".into()));
    }

    let mut user = User::new(username.to_string(), hash_password(&new.password)?, new.role);
    user.set_full_name(&new.full_name);
    user.email = new.email.trim().to_string();
    user.phone_number = new.phone_number.trim().to_string();
    users.create(&user)?;

    info!(user_id = %user.id, username = %user.username, role = %user.role.as_str(), "User created");
    Ok(user)
}

/// Create an account on behalf of an administrator
#[instrument(skip(db, actor, new), fields(actor = %actor.username, username = %new.username))]
pub fn create_user(db: &Database, actor: &User, new: &NewUser) -> Result<User> {
    PermissionMatrix::require(actor, Capability::ManageUsers)?;
    insert_user(&db.users(), new)
}

/// Create the first administrator when the user table is empty.
/// Returns `None` if any account already exists.
pub fn bootstrap_admin(db: &Database, username: &str, password: &str) -> Result<Option<User>> {
    let users = db.users();
    if users.count()? > 0 {
        return Ok(None);
    }
    let admin = insert_user(
        &users,
        &NewUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            full_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
        },
    )?;
    Ok(Some(admin))
}

/// Verify credentials and open a session
#[instrument(skip(db, password))]
pub fn login(
    db: &Database,
    username: &str,
    password: &str,
    session_hours: i64,
) -> Result<(User, Session)> {
    let users = db.users();
    let invalid = || Error::Authentication("Invalid username or password".into());

    let Some(user) = users.find_by_username(username.trim())? else {
        warn!("Login for unknown user");
        return Err(invalid());
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "Login with wrong password");
        return Err(invalid());
    }

    let purged = users.cleanup_expired_sessions()?;
    if purged > 0 {
        debug!(purged, "Expired sessions removed");
    }

    users.update_last_login(user.id)?;
    let session = Session::new(user.id, generate_token(), session_hours);
    users.create_session(&session)?;

    info!(user_id = %user.id, "User logged in");
    let user = users.find_by_id(user.id)?.unwrap_or(user);
    Ok((user, session))
}

/// Resolve a session token to its user
pub fn authenticate(db: &Database, token: &str) -> Result<User> {
    let users = db.users();
    let session = users
        .find_valid_session(token)?
        .ok_or_else(|| Error::Authentication("Session expired or invalid".into()))?;
    users
        .find_by_id(session.user_id)?
        .ok_or_else(|| Error::Authentication("Session user no longer exists".into()))
}

pub fn logout(db: &Database, token: &str) -> Result<()> {
    db.users().delete_session(token)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Replace the user's password and end all of their sessions
#[instrument(skip(db, user, change), fields(user_id = %user.id))]
pub fn change_password(db: &mut Database, user: &User, change: &PasswordChange) -> Result<()> {
    let stored = db
        .users()
        .find_by_id(user.id)?
        .ok_or_else(|| Error::NotFound(format!("User {}", user.id)))?;

    if !verify_password(&change.current_password, &stored.password_hash)? {
        return Err(Error::Authentication("Current password is incorrect".into()));
    }
    if change.new_password != change.confirm_password {
        return Err(Error::Validation("password mismatch".into()));
    }
    validate_credentials(&stored.username, &change.new_password)?;
    let hash = hash_password(&change.new_password)?;

    let tx = db.write_tx()?;
    let users = UserStore::new(&tx);
    users.update_password(user.id, &hash)?;
    users.delete_user_sessions(user.id)?;
    tx.commit()?;

    info!("Password changed, sessions revoked");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub theme: Theme,
}

pub fn update_profile(db: &Database, user: &User, update: &ProfileUpdate) -> Result<User> {
    let mut user = db
        .users()
        .find_by_id(user.id)?
        .ok_or_else(|| Error::NotFound(format!("User {}", user.id)))?;
    user.set_full_name(&update.full_name);
    user.email = update.email.trim().to_string();
    user.phone_number = update.phone_number.trim().to_string();
    user.theme = update.theme;
    db.users().update_profile(&user)?;
    Ok(user)
}

pub fn preferences(db: &Database, user: &User) -> Result<NotificationPreferences> {
    db.preferences().load(user.id)
}

/// Save toggles for the calling user; any other user id in the payload is ignored
pub fn save_preferences(
    db: &Database,
    user: &User,
    prefs: NotificationPreferences,
) -> Result<NotificationPreferences> {
    let prefs = NotificationPreferences {
        user_id: user.id,
        ..prefs
    };
    db.preferences().save(&prefs)?;
    Ok(prefs)
}
