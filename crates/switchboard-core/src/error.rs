//! Error types for switchboard-core
//!
//! Losing a compare-and-swap race is not an error: it is reported as
//! [`UpdateOutcome::NoOp`](crate::editor::UpdateOutcome). Everything here is a
//! condition the caller has to handle.

use crate::message::MessageId;
use crate::remote::RemoteError;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The stored message does not exist (or not in the expected keyboard state)
    #[error(
        "message not found: {} (keyboard state {:?})",
        .id.map_or_else(|| "unsaved".to_string(), |id| id.to_string()),
        .state
    )]
    MessageNotFound {
        /// Store identity of the message; `None` if it was never stored
        id: Option<MessageId>,
        /// Keyboard state the lookup was conditioned on
        state: Option<String>,
    },

    /// No button with this data at the expected position
    #[error("button not found: {data} in message {id}")]
    ButtonNotFound {
        /// Store identity of the message
        id: MessageId,
        /// Callback data of the button
        data: String,
        /// Position where the button was expected, if it was located at all
        position: Option<(usize, usize)>,
    },

    /// Selective keyboard with no resolvable recipients
    #[error("no target users: mention users with @username or reply to their message")]
    NoTargetUsers,

    /// The callback was already answered during this request
    #[error("callback already answered")]
    AlreadyAnswered,

    /// The current request was not triggered by a callback
    #[error("no callback to answer in this request")]
    NoCallback,

    /// The current request was not triggered by an inline query
    #[error("no inline query to answer in this request")]
    NoInlineQuery,

    /// The current request has no chat to act in
    #[error("no chat in this request")]
    NoChat,

    /// Edit requested with the text already shown
    #[error("text not modified")]
    TextNotModified,

    /// Button that the remote service would reject
    #[error("invalid button: {0}")]
    InvalidButton(String),

    /// Remote failure that is expected to go away or needs no action
    #[error("remote service unavailable: {0}")]
    RemoteTransient(RemoteError),

    /// Any other remote failure
    #[error("remote service error: {0}")]
    RemoteFatal(RemoteError),

    /// The store could not be restored after a failed remote edit
    #[error("failed to revert message {id} after remote error ({cause}): {reason}")]
    RevertFailed {
        /// Store identity of the message
        id: MessageId,
        /// Remote failure that triggered the revert
        cause: RemoteError,
        /// Why the revert itself failed
        reason: String,
    },

    /// Store backend error
    #[error("store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a remote failure according to its classification
    #[must_use]
    pub fn remote(err: RemoteError) -> Self {
        if err.is_transient() {
            Error::RemoteTransient(err)
        } else {
            Error::RemoteFatal(err)
        }
    }

    /// Short text suitable for a callback toast or a chat reply
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Error::MessageNotFound { .. } | Error::ButtonNotFound { .. } => {
                "This message is outdated.".to_string()
            }
            Error::NoTargetUsers => {
                "Mention the users this keyboard is for, or reply to their message.".to_string()
            }
            Error::RemoteTransient(RemoteError::RateLimited { retry_after }) => {
                match retry_after {
                    Some(secs) => format!("Too many requests. Please wait {} seconds.", secs),
                    None => "Too many requests. Please try again later.".to_string(),
                }
            }
            Error::RemoteTransient(_) => {
                "Message may be outdated. The bot can't edit it anymore.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        let err = Error::remote(RemoteError::RateLimited {
            retry_after: Some(3),
        });
        assert!(matches!(err, Error::RemoteTransient(_)));

        let err = Error::remote(RemoteError::Validation("bad markup".to_string()));
        assert!(matches!(err, Error::RemoteFatal(_)));
    }

    #[test]
    fn test_rate_limited_message() {
        let err = Error::RemoteTransient(RemoteError::RateLimited {
            retry_after: Some(30),
        });
        assert!(err.user_message().contains("30 seconds"));
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::ButtonNotFound {
            id: MessageId(7),
            data: "vote:1".to_string(),
            position: Some((1, 2)),
        };
        assert!(err.user_message().contains("outdated"));
        assert!(err.to_string().contains("vote:1"));
    }
}
