//! Role-based access decisions.
//!
//! Everything here is pure: callers describe the acting role, the resource,
//! the action and whether the caller owns the target, and get a [`Decision`]
//! back. Handlers never branch on roles themselves.

use crate::{
    entities::user::Role,
    error::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Category,
    Genre,
    Title,
    Review,
    Comment,
    User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
    /// Writing the `role` field of a user record.
    ChangeRole,
}

/// Relationship between the caller and the target record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Caller authored the review/comment or is the user record itself.
    Owner,
    NotOwner,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthorized,
    Forbidden,
}

pub fn decide(role: Option<Role>, resource: Resource, action: Action, ownership: Ownership) -> Decision {
    use Action::*;
    use Resource::*;

    let public_read =
        matches!(resource, Category | Genre | Title | Review | Comment) && matches!(action, List | Retrieve);
    if public_read {
        return Decision::Allow;
    }

    let Some(role) = role else {
        return Decision::Unauthorized;
    };

    let owner = ownership == Ownership::Owner;
    let allowed = match (resource, action) {
        (_, ChangeRole) => role == Role::Admin,
        (Category | Genre | Title, _) => role == Role::Admin,
        (Review | Comment, Create) => true,
        (Review | Comment, _) => owner || role >= Role::Moderator,
        (User, Retrieve | Update) => owner || role == Role::Admin,
        (User, _) => role == Role::Admin,
    };

    if allowed { Decision::Allow } else { Decision::Forbidden }
}

pub fn ensure(role: Option<Role>, resource: Resource, action: Action, ownership: Ownership) -> AppResult<()> {
    match decide(role, resource, action, ownership) {
        Decision::Allow => Ok(()),
        Decision::Unauthorized => Err(AppError::Unauthorized),
        Decision::Forbidden => {
            tracing::debug!(?role, ?resource, ?action, "permission denied");
            Err(AppError::Forbidden)
        },
    }
}

/// Whether a `role` value supplied by this caller should be applied. Callers
/// drop the field silently when this is false.
pub fn can_change_role(role: Option<Role>) -> bool {
    decide(role, Resource::User, Action::ChangeRole, Ownership::NotOwner) == Decision::Allow
}

#[cfg(test)]
mod tests {
    use super::{Action::*, Decision::*, Ownership::*, Resource::*, *};

    const CONTENT: [Resource; 5] = [Category, Genre, Title, Review, Comment];
    const ROLES: [Option<Role>; 4] = [None, Some(Role::User), Some(Role::Moderator), Some(Role::Admin)];

    #[test]
    fn everyone_reads_content() {
        for role in ROLES {
            for resource in CONTENT {
                assert_eq!(decide(role, resource, List, NotOwner), Allow);
                assert_eq!(decide(role, resource, Retrieve, NotOwner), Allow);
            }
        }
    }

    #[test]
    fn anonymous_writes_are_unauthorized() {
        for resource in CONTENT {
            for action in [Create, Update, Delete] {
                assert_eq!(decide(None, resource, action, NotOwner), Unauthorized);
            }
        }
        assert_eq!(decide(None, User, Retrieve, Owner), Unauthorized);
    }

    #[test]
    fn catalog_writes_are_admin_only() {
        for resource in [Category, Genre, Title] {
            for action in [Create, Update, Delete] {
                assert_eq!(decide(Some(Role::User), resource, action, NotOwner), Forbidden);
                assert_eq!(decide(Some(Role::Moderator), resource, action, NotOwner), Forbidden);
                assert_eq!(decide(Some(Role::Admin), resource, action, NotOwner), Allow);
            }
        }
    }

    #[test]
    fn any_user_may_post_reviews_and_comments() {
        for resource in [Review, Comment] {
            for role in [Role::User, Role::Moderator, Role::Admin] {
                assert_eq!(decide(Some(role), resource, Create, NotOwner), Allow);
            }
        }
    }

    #[test]
    fn authors_and_staff_edit_reviews() {
        for resource in [Review, Comment] {
            for action in [Update, Delete] {
                assert_eq!(decide(Some(Role::User), resource, action, Owner), Allow);
                assert_eq!(decide(Some(Role::User), resource, action, NotOwner), Forbidden);
                assert_eq!(decide(Some(Role::Moderator), resource, action, NotOwner), Allow);
                assert_eq!(decide(Some(Role::Admin), resource, action, NotOwner), Allow);
            }
        }
    }

    #[test]
    fn users_manage_only_themselves() {
        let user = Some(Role::User);
        assert_eq!(decide(user, User, Retrieve, Owner), Allow);
        assert_eq!(decide(user, User, Update, Owner), Allow);
        assert_eq!(decide(user, User, Retrieve, NotOwner), Forbidden);
        assert_eq!(decide(user, User, List, NotOwner), Forbidden);
        assert_eq!(decide(user, User, Delete, Owner), Forbidden);
        assert_eq!(decide(Some(Role::Moderator), User, Update, NotOwner), Forbidden);
        assert_eq!(decide(Some(Role::Admin), User, Delete, NotOwner), Allow);
    }

    #[test]
    fn only_admins_change_roles() {
        assert!(!can_change_role(None));
        assert!(!can_change_role(Some(Role::User)));
        assert!(!can_change_role(Some(Role::Moderator)));
        assert!(can_change_role(Some(Role::Admin)));
    }

    #[test]
    fn ensure_maps_decisions_to_errors() {
        assert!(ensure(Some(Role::Admin), Category, Delete, NotOwner).is_ok());
        assert!(matches!(ensure(None, Category, Delete, NotOwner), Err(AppError::Unauthorized)));
        assert!(matches!(ensure(Some(Role::User), Category, Delete, NotOwner), Err(AppError::Forbidden)));
    }
}
