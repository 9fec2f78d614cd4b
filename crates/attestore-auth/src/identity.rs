//! The authenticated identity shape produced by the JWT validator and
//! consumed by the policy engine and audit logger.

use std::collections::HashSet;

/// A validated caller, or the anonymous identity when a route allows
/// unauthenticated access and no bearer token was presented.
#[derive(Debug, Clone)]
pub struct Identity {
    /// `sub` claim. `None` for the anonymous identity.
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            username: None,
            email: None,
            groups: Vec::new(),
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }

    /// Principal strings this identity matches in a policy's
    /// `principals` list: its user id, username, `role:<r>` for every
    /// role, and `group:<g>` for every group.
    #[must_use]
    pub fn principal_tokens(&self) -> HashSet<String> {
        let mut tokens = HashSet::new();
        if let Some(id) = &self.user_id {
            tokens.insert(id.clone());
        }
        if let Some(name) = &self.username {
            tokens.insert(name.clone());
        }
        for role in &self.roles {
            tokens.insert(format!("role:{role}"));
        }
        for group in &self.groups {
            tokens.insert(format!("group:{group}"));
        }
        tokens
    }
}
