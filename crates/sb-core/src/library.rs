//! Library-domain enums: access scopes, roles, focus modes, sync modes and
//! dirty reasons.
//!
//! All enums serialize in snake_case and round-trip through their database
//! text representation via `as_str` / `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::ids::UserId;

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum from a
/// single variant/text table.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable text form used in storage and logs.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

/// Visibility class of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclScope {
    /// Visible to everyone, including guests.
    #[default]
    Public,
    /// Visible to any signed-in user.
    AnyUser,
    /// Visible to its owning user only.
    User,
    /// Visible to administrators only.
    Admin,
}

text_enum!(AclScope {
    Public => "public",
    AnyUser => "any_user",
    User => "user",
    Admin => "admin",
});

/// Role named by an ACL rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclRole {
    Guest,
    User,
    Admin,
}

text_enum!(AclRole {
    Guest => "guest",
    User => "user",
    Admin => "admin",
});

/// The scope and owner an image ends up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AclDecision {
    pub scope: AclScope,
    pub owner: Option<UserId>,
}

impl AclDecision {
    /// Map a rule's role (and optional user) to a decision.
    ///
    /// A user role with a concrete user becomes an owned image; without one
    /// it is visible to every signed-in user.
    pub fn for_role(role: AclRole, user: Option<UserId>) -> Self {
        match (role, user) {
            (AclRole::Admin, _) => Self {
                scope: AclScope::Admin,
                owner: None,
            },
            (AclRole::User, Some(id)) => Self {
                scope: AclScope::User,
                owner: Some(id),
            },
            (AclRole::User, None) => Self {
                scope: AclScope::AnyUser,
                owner: None,
            },
            (AclRole::Guest, _) => Self::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// How derivative crops pick their anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    #[default]
    Auto,
    Manual,
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

text_enum!(FocusMode {
    Auto => "auto",
    Manual => "manual",
    Center => "center",
    Top => "top",
    Bottom => "bottom",
    Left => "left",
    Right => "right",
});

// ---------------------------------------------------------------------------
// Sync runs
// ---------------------------------------------------------------------------

/// Whether a run removes records for files that disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Incremental,
    Full,
}

text_enum!(SyncMode {
    Incremental => "incremental",
    Full => "full",
});

/// Lifecycle state of a sync run row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Finished,
    Failed,
}

text_enum!(SyncStatus {
    Running => "running",
    Finished => "finished",
    Failed => "failed",
});

/// Why a file is being reprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyReason {
    NewFile,
    HashChanged,
    MetadataHashChanged,
    SizeChanged,
    MtimeChanged,
    ForcedRefresh,
}

text_enum!(DirtyReason {
    NewFile => "new_file",
    HashChanged => "hash_changed",
    MetadataHashChanged => "metadata_hash_changed",
    SizeChanged => "size_changed",
    MtimeChanged => "mtime_changed",
    ForcedRefresh => "forced_refresh",
});

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn text_round_trip() {
        for scope in [
            AclScope::Public,
            AclScope::AnyUser,
            AclScope::User,
            AclScope::Admin,
        ] {
            assert_eq!(scope.as_str().parse::<AclScope>().unwrap(), scope);
        }
        assert_eq!(DirtyReason::MtimeChanged.to_string(), "mtime_changed");
        assert_eq!("full".parse::<SyncMode>().unwrap(), SyncMode::Full);
    }

    #[test]
    fn unknown_text_is_validation_error() {
        assert_matches!("everyone".parse::<AclScope>(), Err(Error::Validation(_)));
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&AclScope::AnyUser).unwrap(),
            "\"any_user\""
        );
        let role: AclRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, AclRole::Admin);
    }

    #[test]
    fn role_mapping() {
        let owner = UserId::new();
        assert_eq!(
            AclDecision::for_role(AclRole::Admin, Some(owner)).scope,
            AclScope::Admin
        );
        assert_eq!(
            AclDecision::for_role(AclRole::User, Some(owner)),
            AclDecision {
                scope: AclScope::User,
                owner: Some(owner)
            }
        );
        assert_eq!(
            AclDecision::for_role(AclRole::User, None).scope,
            AclScope::AnyUser
        );
        assert_eq!(
            AclDecision::for_role(AclRole::Guest, None),
            AclDecision::default()
        );
    }
}
