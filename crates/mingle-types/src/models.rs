use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Enums stored as lowercase text columns. Each gets `as_str`, `Display` and
/// `FromStr` that agree with its serde representation.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

text_enum!(
    /// Lifecycle of a stranger (or friend) chat session.
    SessionStatus, "session status" {
        Active => "active",
        Ended => "ended",
    }
);

text_enum!(
    MessageType, "message type" {
        Text => "text",
        Image => "image",
        System => "system",
    }
);

text_enum!(
    /// `Pending` is the only non-terminal state.
    RequestStatus, "request status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
);

text_enum!(
    MemberRole, "member role" {
        Admin => "admin",
        Moderator => "moderator",
        Member => "member",
    }
);

text_enum!(
    NotificationKind, "notification kind" {
        FriendRequest => "friend_request",
        Dm => "dm",
        Follow => "follow",
    }
);

text_enum!(
    /// Listing filter for communities.
    CommunityFilter, "community filter" {
        All => "all",
        Public => "public",
        Mine => "my",
    }
);

impl Default for CommunityFilter {
    fn default() -> Self {
        Self::All
    }
}

/// Friend-request actions a receiver can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
}

impl RequestStatus {
    /// Next state for `action`, or `None` when the request is already settled.
    pub fn apply(self, action: RequestAction) -> Option<RequestStatus> {
        match (self, action) {
            (Self::Pending, RequestAction::Accept) => Some(Self::Accepted),
            (Self::Pending, RequestAction::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Order a pair of user ids so that friendship rows are symmetric.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_through_serde_and_from_str() {
        let json = serde_json::to_string(&NotificationKind::FriendRequest).unwrap();
        assert_eq!(json, "\"friend_request\"");
        assert_eq!("friend_request".parse::<NotificationKind>().unwrap(), NotificationKind::FriendRequest);
        assert_eq!(CommunityFilter::Mine.as_str(), "my");
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "archived".parse::<SessionStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown session status 'archived'");
    }

    #[test]
    fn only_pending_requests_move() {
        assert_eq!(RequestStatus::Pending.apply(RequestAction::Accept), Some(RequestStatus::Accepted));
        assert_eq!(RequestStatus::Pending.apply(RequestAction::Reject), Some(RequestStatus::Rejected));
        assert_eq!(RequestStatus::Accepted.apply(RequestAction::Reject), None);
        assert_eq!(RequestStatus::Rejected.apply(RequestAction::Accept), None);
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn canonical_pair_is_order_independent() {
        assert_eq!(canonical_pair("b", "a"), ("a", "b"));
        assert_eq!(canonical_pair("a", "b"), ("a", "b"));
    }
}
