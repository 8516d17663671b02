//! Identity resolution: mapping a verified email address to a team-member
//! record (display name, role, admin flag).

use serde::{Deserialize, Serialize};

/// A resolved user identity. Immutable once produced; carried in the
/// client session and stamped onto snapshot commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub is_admin: bool,
}

/// A known team member, as configured in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    pub role: String,
    pub email: String,
    pub is_admin: bool,
}

/// The configured roster plus the admin-domain rule used for emails that
/// are not on it.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    members: Vec<TeamMember>,
    admin_domain: Option<String>,
}

impl TeamDirectory {
    pub fn new(members: Vec<TeamMember>, admin_domain: Option<String>) -> Self {
        Self {
            members,
            admin_domain,
        }
    }

    /// Resolve an email to an identity. Roster entries win; otherwise the
    /// display name is the local part of the address and the admin flag
    /// comes from the domain-suffix test. Deterministic.
    pub fn resolve(&self, email: &str) -> Identity {
        let email = email.trim().to_ascii_lowercase();

        if let Some(member) = self
            .members
            .iter()
            .find(|m| m.email.eq_ignore_ascii_case(&email))
        {
            return Identity {
                email,
                display_name: member.name.clone(),
                role: Some(member.role.clone()),
                is_admin: member.is_admin,
            };
        }

        let display_name = email
            .split('@')
            .next()
            .unwrap_or(email.as_str())
            .to_string();
        let is_admin = self
            .admin_domain
            .as_deref()
            .is_some_and(|domain| domain_matches(&email, domain));

        Identity {
            email,
            display_name,
            role: None,
            is_admin,
        }
    }
}

/// True when `email` belongs to `domain` (suffix test on the part after
/// the `@`, case-insensitive).
pub fn domain_matches(email: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('@');
    email
        .rsplit_once('@')
        .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> TeamDirectory {
        TeamDirectory::new(
            vec![TeamMember {
                name: "Alice".to_string(),
                role: "Governance".to_string(),
                email: "alice@example.com".to_string(),
                is_admin: true,
            }],
            Some("example.com".to_string()),
        )
    }

    #[test]
    fn roster_entry_wins() {
        let id = directory().resolve("Alice@Example.com");
        assert_eq!(id.email, "alice@example.com");
        assert_eq!(id.display_name, "Alice");
        assert_eq!(id.role.as_deref(), Some("Governance"));
        assert!(id.is_admin);
    }

    #[test]
    fn derived_identity_uses_local_part() {
        let id = directory().resolve("bob@example.com");
        assert_eq!(id.display_name, "bob");
        assert_eq!(id.role, None);
        assert!(id.is_admin);
    }

    #[test]
    fn foreign_domain_is_not_admin() {
        let id = directory().resolve("carol@elsewhere.org");
        assert_eq!(id.display_name, "carol");
        assert!(!id.is_admin);
    }

    #[test]
    fn resolution_is_deterministic() {
        let dir = directory();
        assert_eq!(dir.resolve("bob@example.com"), dir.resolve("bob@example.com"));
    }

    #[test]
    fn domain_match_ignores_leading_at_and_case() {
        assert!(domain_matches("a@example.com", "@Example.COM"));
        assert!(!domain_matches("a@notexample.com", "example.com"));
        assert!(!domain_matches("no-at-sign", "example.com"));
    }
}
