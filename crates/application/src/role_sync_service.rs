use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use rolesync_core::AppResult;
use rolesync_domain::{ChangePlan, Role, compare, validate_unique_members};

use crate::plan_executor::{ExecutionResult, ExecutorOptions, PlanExecutor};
use crate::sync_ports::RoleStore;

/// Plan and execution result of one reconciliation pass.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Computed change plan.
    pub plan: ChangePlan,
    /// Execution result for the plan.
    pub result: ExecutionResult,
}

/// Reconciles local role definitions against a remote role store.
#[derive(Clone)]
pub struct RoleSyncService {
    store: Arc<dyn RoleStore>,
    options: ExecutorOptions,
}

impl RoleSyncService {
    /// Creates a service. The store should already retry transient failures.
    #[must_use]
    pub fn new(store: Arc<dyn RoleStore>, options: ExecutorOptions) -> Self {
        Self { store, options }
    }

    /// Fetches remote roles and computes the change plan.
    ///
    /// Member conflicts in `local` are reported before the remote store is
    /// contacted.
    pub async fn plan(&self, local: &[Role], cancel: &CancellationToken) -> AppResult<ChangePlan> {
        validate_unique_members(local)?;

        let remote = self.store.list_roles(cancel).await?;
        let plan = compare(local, &remote)?;
        let summary = plan.summary();
        info!(
            local_roles = local.len(),
            remote_roles = remote.len(),
            creates = summary.creates,
            updates = summary.updates,
            deletes = summary.deletes,
            "computed role change plan"
        );

        Ok(plan)
    }

    /// Computes the change plan and executes it.
    ///
    /// Errors before execution (validation, fetching remote roles) are
    /// returned directly; execution errors are carried in the outcome.
    pub async fn sync(&self, local: &[Role], cancel: &CancellationToken) -> AppResult<SyncOutcome> {
        let plan = self.plan(local, cancel).await?;
        let result = PlanExecutor::new(self.store.clone(), self.options)
            .execute(&plan, cancel)
            .await;

        Ok(SyncOutcome { plan, result })
    }
}
