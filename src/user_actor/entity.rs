use chrono::Utc;

use super::error::UserError;
use crate::actor_framework::Entity;
use crate::domain::{Role, UserCreate, UserPatch, UserProfile};

#[derive(Debug, Clone)]
pub enum UserAction {
    /// Sets the stored role, returning the previous one.
    SetRole(Role),
}

impl Entity for UserProfile {
    const COLLECTION: &'static str = "users";

    type Id = String;
    type CreateParams = UserCreate;
    type Patch = UserPatch;
    type Action = UserAction;
    type ActionResult = Role;
    type Error = UserError;

    /// New profiles always start as customers.
    fn from_create_params(id: String, params: UserCreate) -> Result<Self, UserError> {
        if params.email.trim().is_empty() {
            return Err(UserError::ValidationError("Email required".to_string()));
        }
        Ok(Self {
            id,
            display_name: params.display_name,
            email: params.email,
            role: Role::Customer,
            created_at: Utc::now(),
        })
    }

    fn not_found(id: &String) -> UserError {
        UserError::NotFound(id.clone())
    }

    fn already_exists(id: &String) -> UserError {
        UserError::AlreadyExists(id.clone())
    }

    fn on_update(&mut self, patch: UserPatch) -> Result<(), UserError> {
        if let Some(display_name) = patch.display_name {
            self.display_name = display_name;
        }
        if let Some(email) = patch.email {
            if email.trim().is_empty() {
                return Err(UserError::ValidationError("Email required".to_string()));
            }
            self.email = email;
        }
        Ok(())
    }

    fn handle_action(&mut self, action: UserAction) -> Result<Role, UserError> {
        match action {
            UserAction::SetRole(role) => Ok(std::mem::replace(&mut self.role, role)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profiles_are_customers_and_can_be_promoted() {
        let params = UserCreate { display_name: "Alice".into(), email: "alice@example.com".into() };
        let mut user = UserProfile::from_create_params("uid-1".into(), params).unwrap();
        assert_eq!(user.role, Role::Customer);

        let previous = user.handle_action(UserAction::SetRole(Role::Admin)).unwrap();
        assert_eq!(previous, Role::Customer);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn email_is_required() {
        let params = UserCreate { display_name: "Bob".into(), email: " ".into() };
        assert!(matches!(
            UserProfile::from_create_params("uid-2".into(), params),
            Err(UserError::ValidationError(_))
        ));
    }
}
