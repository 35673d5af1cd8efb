//! Access and refresh token lifecycle.
//!
//! Access tokens are HS256 JWTs checked without touching the store. Refresh
//! tokens are random hex strings kept in the database; they stay usable until
//! they expire or are revoked, and a refresh does not rotate them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use tracing::{debug, info, warn};

use chirpy_db::Database;
use chirpy_db::models::{RefreshTokenRecord, UserRecord};
use chirpy_types::api::Claims;
use chirpy_types::error::{Error, Result};
use chirpy_types::models::UserId;

use crate::password::Credentials;

pub const ISSUER: &str = "chirpy";
pub const BEARER_PREFIX: &str = "Bearer ";

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl SessionConfig {
    /// One hour access tokens, sixty day refresh tokens.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer: ISSUER.to_string(),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    db: Arc<Database>,
    credentials: Credentials,
    config: SessionConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, credentials: Credentials, config: SessionConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            db,
            credentials,
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Check an email/password pair. Unknown email and wrong password fail
    /// with the same message after the same amount of hashing work.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord> {
        let user = self.db.find_user_by_email(email)?;

        let verified = match &user {
            Some(user) => self.credentials.verify(password, &user.password_hash),
            None => self.credentials.verify_missing(password),
        };

        match user {
            Some(user) if verified => Ok(user),
            _ => {
                warn!("Failed login attempt");
                Err(Error::unauthorized("invalid login details"))
            }
        }
    }

    /// Authenticate and mint a fresh token pair.
    pub fn login(&self, email: &str, password: &str) -> Result<(UserRecord, TokenPair)> {
        let user = self.authenticate(email, password)?;
        let tokens = self.issue_tokens(user.id)?;
        info!("User {} logged in", user.id);
        Ok((user, tokens))
    }

    pub fn issue_tokens(&self, user_id: UserId) -> Result<TokenPair> {
        self.issue_tokens_at(user_id, Utc::now())
    }

    pub fn issue_tokens_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<TokenPair> {
        let access_token = self.issue_access_token_at(user_id, now)?;

        let record = RefreshTokenRecord {
            user_id,
            expires_at: now + self.config.refresh_ttl,
            token: generate_refresh_token(),
        };
        let refresh_token = record.token.clone();
        self.db.insert_refresh_token(record)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn issue_access_token_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.access_ttl).timestamp(),
            sub: user_id.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("failed to sign access token: {}", e)))
    }

    /// Verify a bare access token and return its subject.
    pub fn verify_access_token(&self, token: &str) -> Result<UserId> {
        self.verify_access_token_at(token, Utc::now())
    }

    /// Like refresh tokens, an access token is valid strictly before `exp`.
    pub fn verify_access_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId> {
        let mut validation = Validation::new(Algorithm::HS256);
        // jsonwebtoken accepts a token at exactly `exp`; expiry is checked below.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Rejected access token: {}", e);
            Error::unauthorized("invalid access token")
        })?;

        if now.timestamp() >= data.claims.exp {
            debug!("Rejected access token: expired at {}", data.claims.exp);
            return Err(Error::unauthorized("invalid access token"));
        }

        data.claims
            .sub
            .parse()
            .map_err(|_| Error::unauthorized("invalid access token subject"))
    }

    /// Verify the access token carried by an `Authorization` header value.
    pub fn authorize(&self, header: &str) -> Result<UserId> {
        self.verify_access_token(bearer_token(header)?)
    }

    pub fn refresh(&self, header: &str) -> Result<String> {
        self.refresh_at(header, Utc::now())
    }

    /// Mint a new access token from a stored refresh token. The refresh
    /// token itself is left in place. Finding it expired sweeps all expired
    /// tokens before failing.
    pub fn refresh_at(&self, header: &str, now: DateTime<Utc>) -> Result<String> {
        let token = bearer_token(header)?;

        match self.db.find_refresh_token(token)? {
            Some(record) if record.is_live_at(now) => self.issue_access_token_at(record.user_id, now),
            Some(_) => {
                self.db.sweep_expired_refresh_tokens(now)?;
                Err(Error::unauthorized("refresh token expired"))
            }
            None => Err(Error::unauthorized("refresh token not found")),
        }
    }

    pub fn revoke(&self, header: &str) -> Result<()> {
        self.revoke_at(header, Utc::now())
    }

    /// Delete a live refresh token, sweeping expired ones in the same write.
    pub fn revoke_at(&self, header: &str, now: DateTime<Utc>) -> Result<()> {
        let token = bearer_token(header)?;

        if self.db.revoke_refresh_token(token, now)? {
            info!("Refresh token revoked");
            Ok(())
        } else {
            Err(Error::unauthorized("refresh token not found"))
        }
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str> {
    if header.len() < BEARER_PREFIX.len() {
        return Err(Error::unauthorized("no header found"));
    }

    match header.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(Error::unauthorized("malformed authorization header")),
    }
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use chirpy_types::error::ErrorKind;
    use tempfile::TempDir;

    use super::*;
    use crate::password::PasswordParams;

    fn setup() -> (TempDir, Arc<Database>, SessionManager) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("database.json")).unwrap());
        let credentials = Credentials::new(PasswordParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let hash = credentials.hash("pw123").unwrap();
        db.create_user("alice@example.com", hash).unwrap();

        let sessions = SessionManager::new(db.clone(), credentials, SessionConfig::new("test-secret"));
        (dir, db, sessions)
    }

    fn bearer(token: &str) -> String {
        format!("{}{}", BEARER_PREFIX, token)
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("Bearer").unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(bearer_token("").unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(bearer_token("Bearer ").unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(bearer_token("Token abcdef").unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn refresh_tokens_are_64_hex_chars() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_refresh_token());
    }

    #[test]
    fn login_rejects_bad_credentials_uniformly() {
        let (_dir, _db, sessions) = setup();

        let wrong_pw = sessions.login("alice@example.com", "nope").unwrap_err();
        let no_user = sessions.login("bob@example.com", "pw123").unwrap_err();
        assert_eq!(wrong_pw.kind(), ErrorKind::Unauthorized);
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
    }

    #[test]
    fn access_token_round_trips_subject() {
        let (_dir, _db, sessions) = setup();
        let (user, tokens) = sessions.login("alice@example.com", "pw123").unwrap();

        assert_eq!(sessions.verify_access_token(&tokens.access_token).unwrap(), user.id);
        assert_eq!(sessions.authorize(&bearer(&tokens.access_token)).unwrap(), user.id);
    }

    #[test]
    fn expired_or_foreign_access_tokens_fail() {
        let (_dir, db, sessions) = setup();

        let stale = sessions
            .issue_access_token_at(1, Utc::now() - Duration::hours(2))
            .unwrap();
        assert_eq!(
            sessions.verify_access_token(&stale).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );

        let credentials = Credentials::new(PasswordParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let other = SessionManager::new(db, credentials, SessionConfig::new("other-secret"));
        let forged = other.issue_access_token_at(1, Utc::now()).unwrap();
        assert!(sessions.verify_access_token(&forged).is_err());
        assert!(sessions.verify_access_token("not.a.jwt").is_err());
    }

    #[test]
    fn access_token_expiry_boundary_is_strict() {
        let (_dir, _db, sessions) = setup();
        let issued = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let token = sessions.issue_access_token_at(1, issued).unwrap();
        let exp = issued + Duration::hours(1);

        assert_eq!(
            sessions
                .verify_access_token_at(&token, exp - Duration::seconds(1))
                .unwrap(),
            1
        );
        assert_eq!(
            sessions.verify_access_token_at(&token, exp).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn unknown_email_costs_as_much_as_a_wrong_password() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("database.json")).unwrap());
        let credentials = Credentials::new(PasswordParams {
            memory_kib: 8 * 1024,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        db.create_user("alice@example.com", credentials.hash("pw123").unwrap())
            .unwrap();
        let sessions = SessionManager::new(db, credentials, SessionConfig::new("test-secret"));

        let fastest = |email: &str| {
            (0..3)
                .map(|_| {
                    let start = std::time::Instant::now();
                    assert!(sessions.authenticate(email, "wrong").is_err());
                    start.elapsed()
                })
                .min()
                .unwrap()
        };
        let known = fastest("alice@example.com");
        let unknown = fastest("nobody@example.com");

        assert!(
            unknown * 4 >= known,
            "unknown email took {:?}, known email took {:?}",
            unknown,
            known
        );
    }

    #[test]
    fn refresh_is_multi_use_and_stores_sixty_day_expiry() {
        let (_dir, db, sessions) = setup();
        let now = Utc::now();
        let tokens = sessions.issue_tokens_at(1, now).unwrap();

        let stored = db.find_refresh_token(&tokens.refresh_token).unwrap().unwrap();
        assert_eq!(stored.expires_at, now + Duration::days(60));

        for _ in 0..2 {
            let access = sessions.refresh(&bearer(&tokens.refresh_token)).unwrap();
            assert_eq!(sessions.verify_access_token(&access).unwrap(), 1);
        }
        assert!(db.find_refresh_token(&tokens.refresh_token).unwrap().is_some());
    }

    #[test]
    fn refresh_expiry_boundary_is_strict() {
        let (_dir, db, sessions) = setup();
        let now = Utc::now();
        db.insert_refresh_token(RefreshTokenRecord {
            user_id: 1,
            expires_at: now,
            token: "edge".into(),
        })
        .unwrap();

        // One nanosecond before expiry still works.
        sessions
            .refresh_at(&bearer("edge"), now - Duration::nanoseconds(1))
            .unwrap();

        let err = sessions.refresh_at(&bearer("edge"), now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        // The failed lookup swept it.
        assert!(db.find_refresh_token("edge").unwrap().is_none());
    }

    #[test]
    fn revoked_token_no_longer_refreshes() {
        let (_dir, _db, sessions) = setup();
        let (_, tokens) = sessions.login("alice@example.com", "pw123").unwrap();
        let header = bearer(&tokens.refresh_token);

        sessions.revoke(&header).unwrap();
        assert_eq!(sessions.refresh(&header).unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(sessions.revoke(&header).unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn short_headers_fail_before_any_lookup() {
        let (_dir, _db, sessions) = setup();
        assert_eq!(sessions.refresh("abc").unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(sessions.revoke("").unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(sessions.authorize("Bear").unwrap_err().kind(), ErrorKind::Unauthorized);
    }
}
