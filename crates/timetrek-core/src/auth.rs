//! Local account provider.
//!
//! Mirrors the hosted auth flow against the local database: registration,
//! password sign-in, sign-out and password-reset requests. The signed-in user
//! id is kept in the key-value table so the session survives restarts, and
//! every change is broadcast on a `tokio::sync::watch` channel.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result, ValidationError};
use crate::member::{MemberRole, Profile};
use crate::storage::database::SESSION_KEY;
use crate::storage::workspace_db::UserRecord;
use crate::storage::{Database, WorkspaceDb};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub workspace_name: String,
}

impl SignUp {
    /// Checks run in form order; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidValue {
                field: "email".into(),
                message: format!("'{}' is not an email address", self.email),
            });
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.workspace_name.trim().is_empty() {
            return Err(ValidationError::MissingField("workspace_name"));
        }
        if self.workspace_id().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "workspace_name".into(),
                message: format!("'{}' has no letters or digits", self.workspace_name.trim()),
            });
        }
        Ok(())
    }

    /// Workspace id derived from the name: lowercase, runs of other
    /// characters collapsed to `-`.
    pub fn workspace_id(&self) -> String {
        let mut slug = String::new();
        for c in self.workspace_name.trim().chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        slug.trim_end_matches('-').to_string()
    }
}

/// Argon2id PHC string; the salt is embedded in it.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

fn to_profile(user: &UserRecord) -> Profile {
    Profile {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        workspace_id: user.workspace_id.clone(),
    }
}

pub struct LocalAuth<'a> {
    users: &'a WorkspaceDb,
    kv: &'a Database,
    session: watch::Sender<Option<Profile>>,
}

impl<'a> LocalAuth<'a> {
    /// Restore the persisted session, if its user still exists.
    pub fn new(users: &'a WorkspaceDb, kv: &'a Database) -> Result<Self> {
        let current = match kv.kv_get(SESSION_KEY)? {
            Some(user_id) => match users.get_user(&user_id)? {
                Some(user) => Some(to_profile(&user)),
                None => {
                    warn!(user_id = %user_id, "session user no longer exists, signing out");
                    kv.kv_delete(SESSION_KEY)?;
                    None
                }
            },
            None => None,
        };
        let (session, _) = watch::channel(current);
        Ok(Self {
            users,
            kv,
            session,
        })
    }

    pub fn current(&self) -> Option<Profile> {
        self.session.borrow().clone()
    }

    /// Session-change notifications. The receiver sees the current value first.
    pub fn subscribe(&self) -> watch::Receiver<Option<Profile>> {
        self.session.subscribe()
    }

    fn set_session(&self, profile: Option<Profile>) -> Result<()> {
        match &profile {
            Some(p) => self.kv.kv_set(SESSION_KEY, &p.id)?,
            None => self.kv.kv_delete(SESSION_KEY)?,
        }
        self.session.send_replace(profile);
        Ok(())
    }

    /// Create an account and sign it in.
    ///
    /// The first account of a workspace becomes its manager; later ones join
    /// as members.
    pub fn sign_up(&self, form: &SignUp) -> Result<Profile> {
        form.validate()?;
        let email = form.email.trim();
        if self.users.find_user_by_email(email)?.is_some() {
            return Err(AuthError::EmailTaken(email.to_string()).into());
        }

        let workspace_id = form.workspace_id();
        let role = if self.users.count_workspace_users(&workspace_id)? == 0 {
            MemberRole::Manager
        } else {
            MemberRole::Member
        };
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: form.name.trim().to_string(),
            email: email.to_string(),
            password_hash: hash_password(&form.password)?,
            workspace_id,
            role,
            created_at: Utc::now(),
        };
        self.users.insert_user(&user)?;
        info!(user_id = %user.id, workspace_id = %user.workspace_id, role = %role, "account created");

        let profile = to_profile(&user);
        self.set_session(Some(profile.clone()))?;
        Ok(profile)
    }

    /// Unknown email and wrong password fail the same way.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let user = self
            .users
            .find_user_by_email(email)?
            .filter(|u| verify_password(password, &u.password_hash))
            .ok_or(AuthError::InvalidCredentials)?;
        let profile = to_profile(&user);
        self.set_session(Some(profile.clone()))?;
        info!(user_id = %profile.id, "signed in");
        Ok(profile)
    }

    pub fn sign_out(&self) -> Result<()> {
        if self.current().is_none() {
            return Err(AuthError::NotSignedIn.into());
        }
        self.set_session(None)?;
        info!("signed out");
        Ok(())
    }

    /// Accept a reset request for a known email. Delivery of the reset link
    /// belongs to the hosted provider.
    pub fn request_password_reset(&self, email: &str) -> Result<()> {
        if self.users.find_user_by_email(email)?.is_none() {
            return Err(AuthError::UnknownEmail(email.trim().to_string()).into());
        }
        info!("password reset requested");
        Ok(())
    }
}
