//! Audit ledger records: events, ingress packages and received packages

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Listing scope value that widens listings to every user.
pub const SCOPE_ALL_USERS: &str = "all_users";

macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Short code persisted in the database
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(Self::$variant),)+
                    other => Err(AppError::InvalidFormat {
                        message: format!("unknown {} code: {}", stringify!($name), other),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

coded_enum!(
    /// Tracked operation kinds
    EventName {
        RetrievePackage => "RP",
        UploadPackage => "UP",
        MakePackage => "MP",
        RegisterContent => "RC",
        StartValidation => "SV",
        FinalizeValidation => "FV",
        ChangeUserGroups => "CUG",
        IdentifyDocumentsToMigrate => "MID",
        StartMigrationByIdFile => "MSF",
        StartMigrationByIsisDb => "MSD",
        StartMigrationByAcronym => "MAC",
        StartMigrationByVolumeOrYear => "MVY",
    }
);

coded_enum!(
    EventStatus {
        Initiated => "I",
        Completed => "C",
        Failed => "F",
    }
);

coded_enum!(
    /// Processing state of a submitted package
    IngressStatus {
        Received => "RC",
        QueuedForValidation => "QV",
        Validating => "VI",
        ValidationFailure => "VF",
        Validated => "VC",
        QueuedForUploading => "QU",
        Uploading => "UI",
        UploadingFailure => "UF",
        Uploaded => "UC",
    }
);

impl EventStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Initiated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: EventName,
    pub status: EventStatus,
    pub annotation: Option<serde_json::Value>,
    pub datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPackage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_name: String,
    pub status: IngressStatus,
    pub datetime: DateTime<Utc>,
}

/// Raw package deposited for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedPackage {
    pub id: String,
    pub file: super::file::FileDescriptor,
    pub updated: DateTime<Utc>,
}

/// Who is asking for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub user_id: Uuid,
    pub privileged: bool,
    pub all_users: bool,
}

impl Scope {
    pub fn new(user_id: Uuid, privileged: bool, scope: Option<&str>) -> Self {
        Self {
            user_id,
            privileged,
            all_users: scope == Some(SCOPE_ALL_USERS),
        }
    }

    /// User the listing is restricted to, if any.
    pub fn owner_filter(&self) -> Option<Uuid> {
        if self.all_users && self.privileged {
            None
        } else {
            Some(self.user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip_through_str() {
        assert_eq!("UP".parse::<EventName>().unwrap(), EventName::UploadPackage);
        assert_eq!(IngressStatus::Received.as_str(), "RC");
        assert_eq!(EventStatus::Failed.to_string(), "F");
        assert!("ZZ".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_scope_requires_privilege_for_all_users() {
        let user = Uuid::new_v4();
        assert_eq!(Scope::new(user, false, Some("all_users")).owner_filter(), Some(user));
        assert_eq!(Scope::new(user, true, Some("all_users")).owner_filter(), None);
        assert_eq!(Scope::new(user, true, None).owner_filter(), Some(user));
    }
}
