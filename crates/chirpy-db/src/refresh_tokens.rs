use chirpy_types::error::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::Database;
use crate::models::RefreshTokenRecord;

impl Database {
    // -- Refresh tokens --

    pub fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        self.transaction(|doc| {
            if !doc.users.contains_key(&record.user_id) {
                return Err(Error::not_found("user", record.user_id));
            }
            doc.refresh_tokens.push(record);
            Ok(())
        })
    }

    pub fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self
            .load()?
            .refresh_tokens
            .into_iter()
            .find(|t| t.token == token))
    }

    /// Delete one token regardless of expiry. Returns whether it existed.
    pub fn remove_refresh_token(&self, token: &str) -> Result<bool> {
        self.transaction(|doc| {
            let before = doc.refresh_tokens.len();
            doc.refresh_tokens.retain(|t| t.token != token);
            Ok(doc.refresh_tokens.len() != before)
        })
    }

    /// Delete every token that is expired at `now`. Returns how many went.
    pub fn sweep_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let swept = self.transaction(|doc| Ok(doc.sweep_expired_tokens(now)))?;
        if swept > 0 {
            debug!("Swept {} expired refresh tokens", swept);
        }
        Ok(swept)
    }

    /// Revoke `token` and sweep every other expired token in one write.
    ///
    /// Returns `true` when `token` was present and still live. An expired
    /// match is swept like the rest but reported as `false`.
    pub fn revoke_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let (revoked, swept) = self.transaction(|doc| {
            let before = doc.refresh_tokens.len();
            let mut revoked = false;
            doc.refresh_tokens.retain(|t| {
                if t.token == token && t.is_live_at(now) {
                    revoked = true;
                    return false;
                }
                t.is_live_at(now)
            });
            let removed = before - doc.refresh_tokens.len();
            Ok((revoked, removed - usize::from(revoked)))
        })?;

        if swept > 0 {
            debug!("Swept {} expired refresh tokens during revoke", swept);
        }
        Ok(revoked)
    }
}
