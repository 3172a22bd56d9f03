//! Visibility and access policy.
//!
//! Every read path takes an explicit [`AccessContext`] — there is no ambient
//! "current user" state. The context carries the caller's identity and their
//! granted access level; ownership promotes the effective level to `Owner`,
//! and a collection's owner additionally bypasses the scale entirely (they
//! can see their own `Hidden` resources).
//!
//! Below the policy boundary, absence and denial are indistinguishable:
//! callers get "not found" either way.

use uuid::Uuid;

use crate::model::Visibility;

/// The caller's identity and granted access level for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    /// Authenticated user, if any.
    pub user: Option<Uuid>,
    /// Granted access level, before ownership promotion.
    pub rights: Visibility,
}

impl AccessContext {
    /// Anonymous caller: sees only `Public` resources.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            rights: Visibility::Public,
        }
    }

    /// Logged-in caller at the `Authenticated` tier.
    pub fn authenticated(user: Uuid) -> Self {
        Self {
            user: Some(user),
            rights: Visibility::Authenticated,
        }
    }

    pub fn with_rights(user: Option<Uuid>, rights: Visibility) -> Self {
        Self { user, rights }
    }

    /// The caller's rights for a resource owned by `owner`: their own level,
    /// promoted to `Owner` when they are the owner.
    pub fn effective_rights(&self, owner: Uuid) -> Visibility {
        if self.user == Some(owner) {
            self.rights.max(Visibility::Owner)
        } else {
            self.rights
        }
    }

    /// Whether a resource at `visibility`, owned by `owner`, is visible to
    /// this caller. Owners see everything of their own, `Hidden` included.
    pub fn can_view(&self, owner: Uuid, visibility: Visibility) -> bool {
        self.user == Some(owner) || visibility <= self.effective_rights(owner)
    }
}
