//! Role resolution and promotion.
//!
//! A caller's role is looked up through an ordered list of providers: the
//! trusted claim on the authenticated identity first, then the user's profile
//! record (claims can lag behind a promotion until the next token refresh).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::clients::UserClient;
use crate::domain::Role;
use crate::error::{ServiceError, ServiceResult};

/// Authenticated caller, as established by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    /// Role carried in the caller's token claims, if any.
    pub role_claim: Option<Role>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), role_claim: None }
    }

    pub fn with_role_claim(mut self, role: Role) -> Self {
        self.role_claim = Some(role);
        self
    }
}

#[async_trait]
pub trait RoleProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// The caller's role according to this provider, or `None` if it has no opinion.
    async fn role_of(&self, identity: &Identity) -> ServiceResult<Option<Role>>;
}

/// Reads the role from the identity's trusted claim.
pub struct ClaimRoleProvider;

#[async_trait]
impl RoleProvider for ClaimRoleProvider {
    fn name(&self) -> &'static str {
        "claims"
    }

    async fn role_of(&self, identity: &Identity) -> ServiceResult<Option<Role>> {
        Ok(identity.role_claim)
    }
}

/// Reads the role stored on the caller's profile record.
pub struct ProfileRoleProvider {
    users: UserClient,
}

impl ProfileRoleProvider {
    pub fn new(users: UserClient) -> Self {
        Self { users }
    }
}

#[async_trait]
impl RoleProvider for ProfileRoleProvider {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn role_of(&self, identity: &Identity) -> ServiceResult<Option<Role>> {
        Ok(self.users.get_user(identity.uid.clone()).await?.map(|user| user.role))
    }
}

/// Gatekeeper for administrative operations.
#[derive(Clone)]
pub struct AccessControl {
    providers: Vec<Arc<dyn RoleProvider>>,
    users: UserClient,
}

impl AccessControl {
    pub fn new(providers: Vec<Arc<dyn RoleProvider>>, users: UserClient) -> Self {
        Self { providers, users }
    }

    /// Claims first, profile record as fallback.
    pub fn with_default_providers(users: UserClient) -> Self {
        let providers: Vec<Arc<dyn RoleProvider>> =
            vec![Arc::new(ClaimRoleProvider), Arc::new(ProfileRoleProvider::new(users.clone()))];
        Self::new(providers, users)
    }

    /// Whether the caller holds `required`, asking providers in priority order.
    ///
    /// A provider that denies the role does not stop the search: a stale
    /// `customer` claim is still overridden by an `admin` profile record.
    pub async fn has_role(&self, identity: &Identity, required: Role) -> ServiceResult<bool> {
        for provider in &self.providers {
            match provider.role_of(identity).await {
                Ok(Some(role)) if role == required => return Ok(true),
                Ok(_) => {}
                Err(e) => warn!(provider = provider.name(), error = %e, "Role provider failed"),
            }
        }
        Ok(false)
    }

    pub async fn require_admin(&self, identity: &Identity) -> ServiceResult<()> {
        if self.has_role(identity, Role::Admin).await? {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "You must be an admin to perform this action.".to_string(),
            ))
        }
    }

    /// Sets `target_uid`'s stored role. The caller must already be an admin.
    #[instrument(skip(self), fields(caller = %caller.uid))]
    pub async fn promote(&self, caller: &Identity, target_uid: &str, role: Role) -> ServiceResult<Role> {
        self.require_admin(caller).await?;
        let previous = self.users.set_role(target_uid.to_string(), role).await?;
        info!(target_uid, %previous, %role, "User role updated");
        Ok(previous)
    }
}
