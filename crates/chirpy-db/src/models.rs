/// Record types persisted in the JSON document.
/// Distinct from chirpy-types API models so the password hash never leaves the DB layer.
use std::collections::BTreeMap;

use chirpy_types::models::{Post, PostId, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The whole database. Loaded, mutated and written back as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: BTreeMap<UserId, UserRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts: BTreeMap<PostId, PostRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refresh_tokens: Vec<RefreshTokenRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sequences: Sequences,
}

/// Older files write empty collections as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Highest ID ever issued per entity. IDs are never handed out twice,
/// even after the entity holding the highest one is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    pub users: u64,
    pub posts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    #[serde(rename = "password", with = "base64_bytes")]
    pub password_hash: Vec<u8>,
    #[serde(rename = "is_chirpy_red", default)]
    pub is_upgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    pub author_id: UserId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    #[serde(rename = "id")]
    pub user_id: UserId,
    #[serde(rename = "expiry_time")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "refresh_token")]
    pub token: String,
}

impl Document {
    pub fn next_user_id(&mut self) -> UserId {
        self.sequences.users += 1;
        self.sequences.users
    }

    pub fn next_post_id(&mut self) -> PostId {
        self.sequences.posts += 1;
        self.sequences.posts
    }

    /// Raise the counters to at least the highest ID present. Files written
    /// before counters were persisted carry no `sequences` object.
    pub(crate) fn reconcile_sequences(&mut self) {
        let max_user = self.users.keys().next_back().copied().unwrap_or(0);
        let max_post = self.posts.keys().next_back().copied().unwrap_or(0);
        self.sequences.users = self.sequences.users.max(max_user);
        self.sequences.posts = self.sequences.posts.max(max_post);
    }

    pub fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users.values().find(|u| u.email == email)
    }

    /// Drop every refresh token whose expiry is not after `now`.
    /// Returns how many were removed.
    pub fn sweep_expired_tokens(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|t| t.is_live_at(now));
        before - self.refresh_tokens.len()
    }
}

impl RefreshTokenRecord {
    /// Valid strictly before `expires_at`; a token expiring exactly now is dead.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email.clone(),
            is_chirpy_red: record.is_upgraded,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email,
            is_chirpy_red: record.is_upgraded,
        }
    }
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        Post {
            id: record.id,
            author_id: record.author_id,
            body: record.body,
        }
    }
}

/// Hash bytes are stored base64-encoded, the same shape a JSON byte slice takes.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        B64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
