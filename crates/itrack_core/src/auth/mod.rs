use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ProfileFields, UserProfile};
use crate::error::AppError;
use crate::normalize::timestamps::format_stored;
use crate::profiles::{get_profile, insert_profile, validate_profile_fields};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// An authenticated identity plus the profile the access policy reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: Uuid,
    pub identity: Identity,
    pub profile: UserProfile,
    #[serde(with = "time::serde::rfc3339")]
    pub signed_in_at: OffsetDateTime,
}

pub trait IdentityProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: &ProfileFields,
        now: OffsetDateTime,
    ) -> Result<Session, AppError>;

    fn sign_in(&self, email: &str, password: &str, now: OffsetDateTime)
        -> Result<Session, AppError>;
}

/// Identity provider backed by the local `credentials` and `profiles` tables.
pub struct LocalIdentityProvider<'c> {
    conn: &'c Connection,
}

impl<'c> LocalIdentityProvider<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };
    if !valid {
        return Err(AppError::new("VALIDATION_EMAIL_INVALID", "Email address is invalid")
            .with_details(format!("value={}", raw.trim())));
    }
    Ok(email)
}

/// Argon2id PHC string for `password` under a fresh random salt.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| {
        AppError::new("AUTH_HASH_FAILED", "Failed to prepare password salt")
            .with_details(e.to_string())
    })?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            AppError::new("AUTH_HASH_FAILED", "Failed to hash password").with_details(e.to_string())
        })
}

fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        AppError::new("DB_DECODE_FAILED", "Stored password hash is malformed")
            .with_details(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn invalid_credentials() -> AppError {
    AppError::new(
        "AUTH_INVALID_CREDENTIALS",
        "Check your credentials and try again",
    )
}

impl IdentityProvider for LocalIdentityProvider<'_> {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: &ProfileFields,
        now: OffsetDateTime,
    ) -> Result<Session, AppError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::new(
                "VALIDATION_PASSWORD_TOO_SHORT",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        validate_profile_fields(fields)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to start sign-up transaction", e))?;

        let taken: Option<String> = tx
            .query_row(
                "SELECT user_id FROM credentials WHERE email = ?1",
                [&email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to look up email", e))?;
        if taken.is_some() {
            return Err(AppError::new(
                "VALIDATION_EMAIL_TAKEN",
                "An account with this email already exists",
            ));
        }

        let user_id = Uuid::new_v4();
        let profile = insert_profile(&tx, user_id, fields, now)?;

        tx.execute(
            r#"
      INSERT INTO credentials(user_id, email, password_hash, created_at)
      VALUES (?1, ?2, ?3, ?4)
      "#,
            params![
                user_id.to_string(),
                email,
                hash_password(password)?,
                format_stored(now)?,
            ],
        )
        .map_err(|e| AppError::db("DB_WRITE_FAILED", "Failed to store credentials", e))?;

        tx.commit()
            .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to commit sign-up", e))?;

        info!(user_id = %user_id, sector = %profile.sector, "user signed up");
        Ok(Session {
            token: Uuid::new_v4(),
            identity: Identity { user_id, email },
            profile,
            signed_in_at: now,
        })
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<Session, AppError> {
        let email = normalize_email(email).map_err(|_| invalid_credentials())?;

        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT user_id, password_hash FROM credentials WHERE email = ?1",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to look up credentials", e))?;

        let Some((user_id, stored_hash)) = row else {
            warn!("sign-in rejected: unknown email");
            return Err(invalid_credentials());
        };
        if !verify_password(password, &stored_hash)? {
            warn!(user_id = %user_id, "sign-in rejected: wrong password");
            return Err(invalid_credentials());
        }

        let user_id = Uuid::parse_str(&user_id).map_err(|e| {
            AppError::new("DB_DECODE_FAILED", "Stored user id is not a UUID")
                .with_details(e.to_string())
        })?;
        let profile = get_profile(self.conn, user_id)?.ok_or_else(|| {
            AppError::new("AUTH_PROFILE_MISSING", "No profile exists for this account")
                .with_details(format!("user_id={user_id}"))
        })?;

        info!(user_id = %user_id, "user signed in");
        Ok(Session {
            token: Uuid::new_v4(),
            identity: Identity { user_id, email },
            profile,
            signed_in_at: now,
        })
    }
}
