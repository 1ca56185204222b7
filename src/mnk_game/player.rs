use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::mnk_game::prelude::*;

pub type PlayerId = u64;

static NICKNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]([-._ ]?[A-Za-z0-9]+)*$").unwrap());

/// An identity handle supplied by the identity collaborator. Opaque to the
/// core, apart from the reserved internal identities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(handle: impl Into<String>) -> Identity {
        Identity(handle.into())
    }

    /// The identity behind every CPU seat.
    pub fn cpu() -> Identity {
        Identity(CPU_USER.into())
    }

    /// The identity behind every unauthenticated session.
    pub fn anonymous() -> Identity {
        Identity(ANONYMOUS_USER.into())
    }

    /// The identity for players registered directly with the application.
    pub fn registered() -> Identity {
        Identity(REGISTERED_USER.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The nickname a freshly-seen identity starts out with: the part of
    /// the handle before the '@'.
    pub fn default_nickname(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

/// A participant: a human (authenticated, registered, or anonymous) or one
/// of the CPU pool. Which of those it is follows entirely from `user`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub user: Identity,
    pub nickname: String,
    /// SHA-256 hex digest; only present for registered players.
    pub password: Option<String>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub session: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl Player {
    pub fn new(user: Identity, nickname: &str) -> Player {
        Player {
            user,
            nickname: nickname.to_owned(),
            password: None,
            wins: 0,
            losses: 0,
            draws: 0,
            session: None,
            expires: None,
        }
    }

    pub fn is_cpu(&self) -> bool {
        self.user == Identity::cpu()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user == Identity::anonymous()
    }

    pub fn is_registered(&self) -> bool {
        self.user == Identity::registered()
    }

    /// The name shown in listings.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.nickname, self.wins)
    }

    /// Validates a nickname against the pattern, length bounds and the
    /// reserved names. Uniqueness is the registry's concern, not this one's.
    pub fn validate_nickname(nickname: &str) -> std::result::Result<(), PlayerNameError> {
        if nickname == ANONYMOUS_NICKNAME || nickname == CPU_NICKNAME {
            return Err(PlayerNameError::Reserved(nickname.to_owned()));
        }
        if !NICKNAME_PATTERN.is_match(nickname) {
            return Err(PlayerNameError::Malformed);
        }
        if nickname.len() < 3 {
            return Err(PlayerNameError::TooShort);
        }
        if nickname.len() > 20 {
            return Err(PlayerNameError::TooLong);
        }
        Ok(())
    }

    /// Only the digest of a password is ever stored, so that an exposed
    /// database gives an attacker nothing directly usable.
    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Gives the player a fresh 128-bit session token, valid for a week.
    pub fn start_session(&mut self, rng: &mut impl Rng, now: DateTime<Utc>) {
        let token: u128 = rng.r#gen();
        self.session = Some(format!("{token:032x}"));
        self.expires = Some(now + Duration::days(SESSION_TTL_DAYS));
    }

    /// Drops the stored session, logging the player out everywhere.
    pub fn end_session(&mut self) {
        self.session = None;
        self.expires = None;
    }

    /// Determines whether `token` matches an unexpired session.
    pub fn session_matches(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.session.as_deref() == Some(token)
            && self.expires.is_some_and(|expires| expires > now)
    }
}
