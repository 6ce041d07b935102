//! Users, organisations and role grants.
//!
//! A role row scopes a user to an organisation and/or a grant; a platform
//! admin is an `Admin` role with both scopes null. Uniqueness of
//! `(user, organisation, grant, role)` is enforced by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    /// Identifier the organisation is known by in upstream systems; the
    /// multi-submission CSV keys rows on it.
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email_address: String,
    pub full_name: String,
    pub created_at_utc: DateTime<Utc>,
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Member,
    /// Organisation-side user allowed to fill in and submit returns.
    GrantRecipient,
    /// Grant-team user allowed to certify submissions.
    Certifier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::GrantRecipient => "GRANT_RECIPIENT",
            Role::Certifier => "CERTIFIER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organisation_id: Option<Uuid>,
    pub grant_id: Option<Uuid>,
    pub role: Role,
}

impl UserRole {
    /// Whether this row satisfies a role check at the given scope. A wider
    /// grant always covers a narrower check: a platform-scoped row matches
    /// any organisation or grant, an organisation-scoped row matches any
    /// grant check within that organisation.
    pub fn covers(&self, role: Role, organisation_id: Option<Uuid>, grant_id: Option<Uuid>) -> bool {
        if self.role != role {
            return false;
        }
        let org_ok = self.organisation_id.is_none() || self.organisation_id == organisation_id;
        let grant_ok = self.grant_id.is_none() || self.grant_id == grant_id;
        org_ok && grant_ok
    }
}

impl User {
    pub fn has_role(&self, role: Role, organisation_id: Option<Uuid>, grant_id: Option<Uuid>) -> bool {
        self.roles
            .iter()
            .any(|r| r.covers(role, organisation_id, grant_id))
    }

    /// Platform admin: an `Admin` role with no organisation or grant scope.
    pub fn is_platform_admin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r.role == Role::Admin && r.organisation_id.is_none() && r.grant_id.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(roles: Vec<UserRole>) -> User {
        User {
            id: Uuid::new_v4(),
            email_address: "user@example.com".into(),
            full_name: "Test User".into(),
            created_at_utc: Utc::now(),
            roles,
        }
    }

    fn role(role: Role, organisation_id: Option<Uuid>, grant_id: Option<Uuid>) -> UserRole {
        UserRole {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organisation_id,
            grant_id,
            role,
        }
    }

    #[test]
    fn platform_admin_requires_null_scopes() {
        let org = Uuid::new_v4();
        assert!(user_with(vec![role(Role::Admin, None, None)]).is_platform_admin());
        assert!(!user_with(vec![role(Role::Admin, Some(org), None)]).is_platform_admin());
        assert!(!user_with(vec![role(Role::Member, None, None)]).is_platform_admin());
    }

    #[test]
    fn wider_scope_covers_narrower_checks() {
        let org = Uuid::new_v4();
        let grant = Uuid::new_v4();
        let user = user_with(vec![role(Role::Certifier, Some(org), None)]);

        assert!(user.has_role(Role::Certifier, Some(org), Some(grant)));
        assert!(user.has_role(Role::Certifier, Some(org), None));
        assert!(!user.has_role(Role::Certifier, Some(Uuid::new_v4()), Some(grant)));
        assert!(!user.has_role(Role::GrantRecipient, Some(org), None));
    }
}
