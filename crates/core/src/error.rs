//! Error types for FleetFlow Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredential,

    #[error("Permission denied")]
    Forbidden,

    #[error("Email does not match the invitation")]
    EmailMismatch,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invitation has expired")]
    InviteExpired,

    #[error("Invitation has already been used")]
    InviteUsed,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input; fixable by the caller
    Validation,
    /// Missing or unverifiable bearer credential
    Unauthenticated,
    /// Authenticated but not permitted
    Forbidden,
    NotFound,
    /// Resource already exists (e.g. a registered email)
    Duplicate,
    /// Invitation exists but is expired or used; terminal
    Conflict,
    /// Store or identity provider failed
    Upstream,
}

impl ErrorKind {
    /// HTTP-equivalent status code
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Duplicate => 409,
            ErrorKind::Conflict => 410,
            ErrorKind::Upstream => 502,
        }
    }
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::WeakPassword(_) => ErrorKind::Validation,
            Error::Unauthenticated | Error::InvalidCredential => ErrorKind::Unauthenticated,
            Error::Forbidden | Error::EmailMismatch => ErrorKind::Forbidden,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::EmailTaken => ErrorKind::Duplicate,
            Error::InviteExpired | Error::InviteUsed => ErrorKind::Conflict,
            Error::Database(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Upstream(_) => ErrorKind::Upstream,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::WeakPassword(_) => "weak_password",
            Error::Unauthenticated => "unauthenticated",
            Error::InvalidCredential => "invalid_credential",
            Error::Forbidden => "forbidden",
            Error::EmailMismatch => "email_mismatch",
            Error::NotFound(_) => "not_found",
            Error::EmailTaken => "email_taken",
            Error::InviteExpired => "invite_expired",
            Error::InviteUsed => "invite_used",
            Error::Database(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Upstream(_) => "upstream",
        }
    }

    /// Message safe to show to the caller.
    ///
    /// Upstream failures are reduced to a generic message; their detail
    /// only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            Error::InviteExpired => {
                "This invite has expired. Ask your admin to send a new one.".into()
            }
            Error::InviteUsed => {
                "This invite has already been used. Ask your admin for a new one if you need access."
                    .into()
            }
            Error::NotFound(resource) if resource == "invitation" => {
                "Nothing was found for this link. Check that it was copied correctly.".into()
            }
            Error::NotFound(resource) => format!("The requested {} was not found.", resource),
            Error::EmailMismatch => "This invite was sent to a different email address.".into(),
            Error::EmailTaken => "An account with this email already exists.".into(),
            Error::Unauthenticated => "Please sign in to continue.".into(),
            Error::Forbidden => "You do not have permission to do that.".into(),
            Error::Validation(_) | Error::WeakPassword(_) | Error::InvalidCredential => {
                self.to_string()
            }
            _ => "The service is temporarily unavailable. Please try again.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_conflicts_map_to_gone() {
        assert_eq!(Error::InviteExpired.kind().status(), 410);
        assert_eq!(Error::InviteUsed.kind().status(), 410);
        assert_ne!(Error::InviteExpired.code(), Error::InviteUsed.code());
    }

    #[test]
    fn test_upstream_detail_not_exposed() {
        let err = Error::Upstream("sqlite: disk I/O error at /var/lib".into());
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(!err.user_message().contains("/var/lib"));
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let invite = Error::NotFound("invitation".into()).user_message();
        assert!(invite.contains("link"));

        let company = Error::NotFound("company".into()).user_message();
        assert_eq!(company, "The requested company was not found.");
        assert!(!company.contains("link"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::validation("x").kind().status(), 400);
        assert_eq!(Error::Unauthenticated.kind().status(), 401);
        assert_eq!(Error::Forbidden.kind().status(), 403);
        assert_eq!(Error::NotFound("invitation".into()).kind().status(), 404);
        assert_eq!(Error::EmailTaken.kind().status(), 409);
    }
}
