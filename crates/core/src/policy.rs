use crate::error::CoreError;
use crate::models::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Chat,
    ListDocuments,
    UploadDocument,
    ProcessDocument,
    DeleteDocument,
    ViewStats,
}

/// Single authorization gate consulted by every orchestrator entry point.
pub fn authorize(identity: &Identity, action: Action) -> Result<(), CoreError> {
    let allowed = match action {
        Action::Chat | Action::ListDocuments => true,
        Action::UploadDocument => matches!(identity.role, Role::Admin | Role::Staff),
        Action::ProcessDocument | Action::DeleteDocument | Action::ViewStats => {
            matches!(identity.role, Role::Admin)
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "insufficient permissions for {action:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{authorize, Action};
    use crate::error::CoreError;
    use crate::models::{Identity, Role};
    use uuid::Uuid;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn every_role_may_chat_and_list() {
        for role in [Role::Admin, Role::Staff, Role::Member] {
            assert!(authorize(&identity(role), Action::Chat).is_ok());
            assert!(authorize(&identity(role), Action::ListDocuments).is_ok());
        }
    }

    #[test]
    fn upload_requires_admin_or_staff() {
        assert!(authorize(&identity(Role::Admin), Action::UploadDocument).is_ok());
        assert!(authorize(&identity(Role::Staff), Action::UploadDocument).is_ok());
        assert!(matches!(
            authorize(&identity(Role::Member), Action::UploadDocument),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn processing_and_deletion_are_admin_only() {
        for action in [
            Action::ProcessDocument,
            Action::DeleteDocument,
            Action::ViewStats,
        ] {
            assert!(authorize(&identity(Role::Admin), action).is_ok());
            assert!(matches!(
                authorize(&identity(Role::Staff), action),
                Err(CoreError::Forbidden(_))
            ));
        }
    }
}
