use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rolesync_core::AppResult;
use rolesync_domain::{Member, Role};

/// Port for the remote authority that holds the authoritative role set.
///
/// Every call observes the cancellation token and should give up promptly
/// once it is cancelled.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Lists every role held remotely.
    async fn list_roles(&self, cancel: &CancellationToken) -> AppResult<Vec<Role>>;

    /// Finds one role by name.
    async fn find_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<Option<Role>>;

    /// Creates a role and returns it with its remote identifier.
    async fn create_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role>;

    /// Replaces an existing role. The role carries its remote identifier.
    async fn update_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role>;

    /// Deletes a role by name.
    async fn delete_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<()>;

    /// Lists every member known to the remote authority.
    async fn list_members(&self, cancel: &CancellationToken) -> AppResult<Vec<Member>>;

    /// Invites an identity that is not yet a member, granting the role.
    async fn invite_member(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()>;

    /// Assigns a role to an existing member.
    async fn assign_member_role(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()>;
}
