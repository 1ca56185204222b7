use chrono::{DateTime, Utc};

use crate::mnk_game::prelude::*;

/// What the external dispatch layer knows about one request: an
/// authenticated identity from the identity collaborator (if any), the
/// session cookie presented by the client, and the login/logout URL the
/// collaborator wants shown. `set_cookie` travels the other way.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub user: Option<Identity>,
    pub session: Option<String>,
    pub log_url: Option<String>,
    pub set_cookie: Option<String>,
}

impl RequestContext {
    /// A context carrying nothing; the caller will be resolved to a fresh
    /// anonymous player.
    pub fn anonymous() -> RequestContext {
        RequestContext::default()
    }

    /// A context for an identity the identity collaborator has already
    /// authenticated.
    pub fn for_user(user: Identity) -> RequestContext {
        RequestContext { user: Some(user), ..RequestContext::default() }
    }
}

/// Formats the session cookie: name `session`, hex token value, HTTP-date
/// expiry a week out.
pub fn session_cookie(token: &str, expires: DateTime<Utc>) -> String {
    format!(
        "session={token}; expires={}",
        expires.format("%a, %d-%b-%Y %H:%M:%S GMT")
    )
}

/// A cookie with an epoch-past expiry, clearing the session client-side.
pub fn clear_session_cookie() -> String {
    "session=; expires=Thu, 01-Jan-1970 00:00:00 GMT".to_owned()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn cookie_uses_http_dates() {
        let expires = Utc.with_ymd_and_hms(2010, 7, 31, 3, 0, 0).unwrap();
        assert_eq!(
            session_cookie("00c0ffee", expires),
            "session=00c0ffee; expires=Sat, 31-Jul-2010 03:00:00 GMT"
        );
        assert!(clear_session_cookie().contains("01-Jan-1970"));
    }
}
