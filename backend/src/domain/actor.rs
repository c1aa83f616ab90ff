//! Acting user identity and role-based permissions.
//!
//! Authentication happens upstream; the engine only receives an opaque
//! identifier and a role, and decides which moderation operations the role
//! may perform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Error;

/// Identifier of the user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Role resolved for the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Reviews and resolves proposals.
    Reviewer,
    /// Unrestricted.
    Admin,
    /// Automated extraction pipeline submitting proposals.
    Extractor,
    /// Read-only access.
    Viewer,
}

impl ActorRole {
    /// Wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Admin => "admin",
            Self::Extractor => "extractor",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actor role: {0}")]
pub struct UnknownRoleError(pub String);

impl FromStr for ActorRole {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reviewer" => Ok(Self::Reviewer),
            "admin" => Ok(Self::Admin),
            "extractor" => Ok(Self::Extractor),
            "viewer" => Ok(Self::Viewer),
            _ => Err(UnknownRoleError(s.to_owned())),
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    role: ActorRole,
}

impl Actor {
    /// Pair an identifier with its resolved role.
    #[must_use]
    pub const fn new(id: ActorId, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// Identifier recorded in audit fields.
    #[must_use]
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// Resolved role.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }

    /// Require permission to approve, reject, edit or undo proposals.
    ///
    /// # Errors
    /// Returns a forbidden error for extractor and viewer roles.
    pub fn require_moderator(&self) -> Result<(), Error> {
        match self.role {
            ActorRole::Reviewer | ActorRole::Admin => Ok(()),
            ActorRole::Extractor | ActorRole::Viewer => Err(self.denied("moderate proposals")),
        }
    }

    /// Require permission to submit new proposals.
    ///
    /// # Errors
    /// Returns a forbidden error for reviewer and viewer roles.
    pub fn require_submitter(&self) -> Result<(), Error> {
        match self.role {
            ActorRole::Extractor | ActorRole::Admin => Ok(()),
            ActorRole::Reviewer | ActorRole::Viewer => Err(self.denied("submit proposals")),
        }
    }

    fn denied(&self, action: &str) -> Error {
        Error::forbidden(format!("role {} may not {action}", self.role)).with_details(
            serde_json::json!({
                "role": self.role.as_str(),
                "code": "role_not_permitted",
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    fn actor(role: ActorRole) -> Actor {
        Actor::new(ActorId::from_uuid(Uuid::nil()), role)
    }

    #[rstest]
    #[case(ActorRole::Reviewer, true, false)]
    #[case(ActorRole::Admin, true, true)]
    #[case(ActorRole::Extractor, false, true)]
    #[case(ActorRole::Viewer, false, false)]
    fn permissions_follow_role(
        #[case] role: ActorRole,
        #[case] moderates: bool,
        #[case] submits: bool,
    ) {
        let subject = actor(role);
        assert_eq!(subject.require_moderator().is_ok(), moderates);
        assert_eq!(subject.require_submitter().is_ok(), submits);
    }

    #[rstest]
    fn denial_is_forbidden() {
        let err = actor(ActorRole::Viewer)
            .require_moderator()
            .expect_err("viewer cannot moderate");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[case("Reviewer", ActorRole::Reviewer)]
    #[case(" admin ", ActorRole::Admin)]
    fn roles_parse_case_insensitively(#[case] raw: &str, #[case] expected: ActorRole) {
        assert_eq!(raw.parse::<ActorRole>().expect("known role"), expected);
    }

    #[rstest]
    fn unknown_role_is_rejected() {
        assert!("owner".parse::<ActorRole>().is_err());
    }
}
