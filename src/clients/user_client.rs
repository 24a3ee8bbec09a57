use tracing::{debug, instrument};

use crate::actor_framework::ResourceClient;
use crate::domain::{Role, UserCreate, UserPatch, UserProfile};
use crate::user_actor::{UserAction, UserError};

/// Client for the user profile records.
#[derive(Clone)]
pub struct UserClient {
    inner: ResourceClient<UserProfile>,
}

impl_basic_client!(UserClient, UserProfile, UserError, get = get_user);

impl UserClient {
    /// Creates the profile record for an authenticated uid.
    #[instrument(skip(self, user), fields(user_email = %user.email))]
    pub async fn create_user(&self, uid: String, user: UserCreate) -> Result<String, UserError> {
        debug!("Sending request");
        self.inner.insert(uid, user).await
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: String, patch: UserPatch) -> Result<UserProfile, UserError> {
        debug!("Sending request");
        self.inner.update(id, patch).await
    }

    /// Sets the stored role and returns the previous one.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: String, role: Role) -> Result<Role, UserError> {
        debug!("Sending request");
        self.inner.perform_action(id, UserAction::SetRole(role)).await
    }
}
