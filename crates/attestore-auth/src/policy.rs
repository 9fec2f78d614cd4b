//! Deny-wins policy evaluation over the flat `Policy` records persisted
//! in the metadata store.

use crate::identity::Identity;
use attestore_meta_store::{Action, Effect, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// `Authorize(user, resource, action)`:
/// 1. Anonymous + read + anonymous-read enabled -> allow.
/// 2. `admin` role -> allow.
/// 3. Collect policies whose principal/action/resource all match.
/// 4. Any matching deny -> deny.
/// 5. Else any matching allow -> allow; otherwise deny.
pub struct PolicyEngine {
    anonymous_read_enabled: bool,
}

impl PolicyEngine {
    #[must_use]
    pub const fn new(anonymous_read_enabled: bool) -> Self {
        Self { anonymous_read_enabled }
    }

    #[must_use]
    pub fn authorize(&self, identity: &Identity, resource: &str, action: Action, policies: &[Policy]) -> Decision {
        if identity.is_anonymous() && action == Action::Read && self.anonymous_read_enabled {
            return Decision::Allow;
        }
        if identity.is_admin() {
            return Decision::Allow;
        }

        let principal_tokens = identity.principal_tokens();
        let mut explicit_deny = false;
        let mut explicit_allow = false;

        for policy in policies {
            if !matches_resource(&policy.resource, resource) {
                continue;
            }
            if !policy
                .actions
                .iter()
                .any(|a| *a == action || *a == Action::Any)
            {
                continue;
            }
            if !matches_principal(&policy.principals, &principal_tokens) {
                continue;
            }

            match policy.effect {
                Effect::Deny => explicit_deny = true,
                Effect::Allow => explicit_allow = true,
            }
        }

        if explicit_deny {
            Decision::Deny
        } else if explicit_allow {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Empty principal list means "everyone"; otherwise matches `*`, or any
/// of the identity's principal tokens (user id, username, `role:<r>`,
/// `group:<g>`).
fn matches_principal(principals: &[String], tokens: &std::collections::HashSet<String>) -> bool {
    if principals.is_empty() {
        return true;
    }
    principals
        .iter()
        .any(|p| p == "*" || tokens.contains(p))
}

/// Exact match, `*` wildcard, or `prefix/*` matching `prefix` and any
/// `prefix/<anything>`.
fn matches_resource(pattern: &str, resource: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return resource == prefix || resource.starts_with(&format!("{prefix}/"));
    }
    pattern == resource
}

/// Derives the policy action from an HTTP method, per the GET/HEAD ->
/// read, PUT/POST -> write, DELETE -> delete mapping.
#[must_use]
pub fn action_for_method(method: &str) -> Action {
    match method {
        "GET" | "HEAD" => Action::Read,
        "DELETE" => Action::Delete,
        _ => Action::Write,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(resource: &str, actions: Vec<Action>, effect: Effect, principals: Vec<&str>) -> Policy {
        Policy {
            id: "p".to_string(),
            name: "p".to_string(),
            resource: resource.to_string(),
            actions,
            effect,
            principals: principals.into_iter().map(str::to_string).collect(),
            condition: None,
        }
    }

    fn user(id: &str) -> Identity {
        Identity {
            user_id: Some(id.to_string()),
            username: Some(id.to_string()),
            email: None,
            groups: Vec::new(),
            roles: Vec::new(),
        }
    }

    #[test]
    fn deny_wins_over_allow() {
        let engine = PolicyEngine::new(false);
        let policies = vec![
            policy("bucket/*", vec![Action::Read], Effect::Allow, vec!["*"]),
            policy("bucket/*", vec![Action::Read], Effect::Deny, vec!["alice"]),
        ];
        let decision = engine.authorize(&user("alice"), "bucket/key", Action::Read, &policies);
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn no_matching_policy_is_implicit_deny() {
        let engine = PolicyEngine::new(false);
        let decision = engine.authorize(&user("alice"), "bucket/key", Action::Read, &[]);
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn admin_role_bypasses_policies() {
        let engine = PolicyEngine::new(false);
        let admin = Identity {
            user_id: Some("root".to_string()),
            username: None,
            email: None,
            groups: Vec::new(),
            roles: vec!["admin".to_string()],
        };
        let policies = vec![policy("bucket/*", vec![Action::Read], Effect::Deny, vec!["*"])];
        assert_eq!(
            engine.authorize(&admin, "bucket/key", Action::Read, &policies),
            Decision::Allow
        );
    }

    #[test]
    fn anonymous_read_allowed_when_enabled() {
        let engine = PolicyEngine::new(true);
        let decision = engine.authorize(&Identity::anonymous(), "bucket/key", Action::Read, &[]);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn anonymous_write_denied_even_when_read_enabled() {
        let engine = PolicyEngine::new(true);
        let decision = engine.authorize(&Identity::anonymous(), "bucket/key", Action::Write, &[]);
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn prefix_wildcard_matches_nested_resources() {
        let engine = PolicyEngine::new(false);
        let policies = vec![policy("bucket/*", vec![Action::Read], Effect::Allow, vec!["alice"])];
        assert_eq!(
            engine.authorize(&user("alice"), "bucket/deep/key", Action::Read, &policies),
            Decision::Allow
        );
    }
}
