use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rolesync_core::AppResult;
use rolesync_domain::{Member, Role};

use crate::retry::Retrier;
use crate::sync_ports::RoleStore;

/// Role store decorator that retries every call of the wrapped store.
#[derive(Clone)]
pub struct RetryingRoleStore {
    inner: Arc<dyn RoleStore>,
    retrier: Retrier,
}

impl RetryingRoleStore {
    /// Wraps a store with a retrier.
    #[must_use]
    pub fn new(inner: Arc<dyn RoleStore>, retrier: Retrier) -> Self {
        Self { inner, retrier }
    }
}

#[async_trait]
impl RoleStore for RetryingRoleStore {
    async fn list_roles(&self, cancel: &CancellationToken) -> AppResult<Vec<Role>> {
        self.retrier
            .run("list_roles", cancel, || self.inner.list_roles(cancel))
            .await
    }

    async fn find_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<Option<Role>> {
        self.retrier
            .run("find_role", cancel, || self.inner.find_role(name, cancel))
            .await
    }

    async fn create_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        self.retrier
            .run("create_role", cancel, || self.inner.create_role(role, cancel))
            .await
    }

    async fn update_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        self.retrier
            .run("update_role", cancel, || self.inner.update_role(role, cancel))
            .await
    }

    async fn delete_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<()> {
        self.retrier
            .run("delete_role", cancel, || self.inner.delete_role(name, cancel))
            .await
    }

    async fn list_members(&self, cancel: &CancellationToken) -> AppResult<Vec<Member>> {
        self.retrier
            .run("list_members", cancel, || self.inner.list_members(cancel))
            .await
    }

    async fn invite_member(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.retrier
            .run("invite_member", cancel, || {
                self.inner.invite_member(identity, role_id, cancel)
            })
            .await
    }

    async fn assign_member_role(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.retrier
            .run("assign_member_role", cancel, || {
                self.inner.assign_member_role(identity, role_id, cancel)
            })
            .await
    }
}
