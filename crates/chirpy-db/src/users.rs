use chirpy_types::error::{Error, Result};
use chirpy_types::models::UserId;
use tracing::info;

use crate::Database;
use crate::models::UserRecord;

impl Database {
    /// Insert a new user. The email check and the insert share one
    /// transaction, so two concurrent signups with one email cannot both win.
    pub fn create_user(&self, email: &str, password_hash: Vec<u8>) -> Result<UserRecord> {
        if email.trim().is_empty() {
            return Err(Error::validation("email must not be empty"));
        }

        let user = self.transaction(|doc| {
            if doc.user_by_email(email).is_some() {
                return Err(Error::conflict(format!("email already exists: {}", email)));
            }

            let id = doc.next_user_id();
            let user = UserRecord {
                id,
                email: email.to_string(),
                password_hash,
                is_upgraded: false,
            };
            doc.users.insert(id, user.clone());
            Ok(user)
        })?;

        info!("Created user {}", user.id);
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<UserRecord> {
        self.load()?
            .users
            .remove(&id)
            .ok_or_else(|| Error::not_found("user", id))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.load()?.user_by_email(email).cloned())
    }

    /// Replace email and password hash. The upgrade flag is kept.
    pub fn update_user(&self, id: UserId, email: &str, password_hash: Vec<u8>) -> Result<UserRecord> {
        if email.trim().is_empty() {
            return Err(Error::validation("email must not be empty"));
        }

        self.transaction(|doc| {
            if doc.user_by_email(email).is_some_and(|other| other.id != id) {
                return Err(Error::conflict(format!("email already exists: {}", email)));
            }

            let user = doc
                .users
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("user", id))?;
            user.email = email.to_string();
            user.password_hash = password_hash;
            Ok(user.clone())
        })
    }

    /// Apply an upgrade event. Idempotent for already-upgraded users.
    pub fn upgrade_user(&self, id: UserId) -> Result<UserRecord> {
        let user = self.transaction(|doc| {
            let user = doc
                .users
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("user", id))?;
            user.is_upgraded = true;
            Ok(user.clone())
        })?;

        info!("Upgraded user {}", id);
        Ok(user)
    }
}
