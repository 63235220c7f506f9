use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rolesync_core::{AppError, AppResult};
use rolesync_domain::{ChangePlan, Member, PlanSummary, Role, RoleUpdate};

use crate::sync_ports::RoleStore;

/// Caller switches for one plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Traverse the plan without calling the remote store.
    pub dry_run: bool,
    /// Invite declared members that the remote authority does not know yet.
    pub invite_missing_members: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            invite_missing_members: true,
        }
    }
}

/// Member-level operation that can fail without stopping a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberOperation {
    /// Invitation of an unknown identity.
    Invite,
    /// Role assignment of a known identity.
    Assign,
}

/// Recorded member invitation or assignment failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    /// Member identity.
    pub identity: String,
    /// Role the member was declared in.
    pub role: String,
    /// Failed operation.
    pub operation: MemberOperation,
    /// Failure description.
    pub error: String,
}

/// Outcome of one plan execution.
///
/// Counts cover operations the remote store acknowledged. A dry run leaves
/// them at zero and reports the traversed operations in `previewed`.
#[derive(Debug, Default, Serialize)]
pub struct ExecutionResult {
    /// Whether the run was a dry run.
    pub dry_run: bool,
    /// Roles created.
    pub created_count: usize,
    /// Roles updated.
    pub updated_count: usize,
    /// Roles deleted.
    pub deleted_count: usize,
    /// Members invited.
    pub invited_count: usize,
    /// Member role assignments made.
    pub assigned_count: usize,
    /// Role operations a dry run would have applied.
    pub previewed: PlanSummary,
    /// Member operations that failed without stopping the run.
    pub member_failures: Vec<MemberFailure>,
    /// Error that stopped the run, if any.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<AppError>,
}

impl ExecutionResult {
    /// Returns the number of role operations applied.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.created_count + self.updated_count + self.deleted_count
    }

    /// Returns whether the run neither applied nor previewed anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.completed() == 0
            && self.previewed.total() == 0
            && self.invited_count == 0
            && self.assigned_count == 0
            && self.error.is_none()
    }

    /// Returns whether the run stopped after applying some operations.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.error.is_some() && self.completed() > 0
    }

    /// Converts a stopped run, or one with failed member operations, into an
    /// error carrying the completed count.
    pub fn into_result(mut self) -> AppResult<Self> {
        if let Some(source) = self.error.take() {
            return match self.completed() {
                0 => Err(source),
                completed => Err(AppError::PartialSync {
                    completed,
                    source: Box::new(source),
                }),
            };
        }

        if !self.member_failures.is_empty() {
            return Err(AppError::MemberSync {
                failures: self.member_failures.len(),
                completed: self.completed(),
            });
        }

        Ok(self)
    }
}

fn serialize_error<S>(error: &Option<AppError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Applies change plans: creates, then updates, then deletes.
///
/// Operations run one at a time. The first failing role operation stops the
/// run; nothing already applied is rolled back.
#[derive(Clone)]
pub struct PlanExecutor {
    store: Arc<dyn RoleStore>,
    options: ExecutorOptions,
}

struct ExecutionRun<'a> {
    apply: bool,
    invite_missing_members: bool,
    cancel: &'a CancellationToken,
    result: ExecutionResult,
    members: Option<HashMap<String, Member>>,
}

enum MemberAction {
    Skip,
    Assign,
    Invite,
}

impl ExecutionRun<'_> {
    fn ensure_active(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled("plan execution was cancelled".to_owned()));
        }

        Ok(())
    }

    fn member_action(&self, identity: &str, role_id: &str) -> MemberAction {
        match self
            .members
            .as_ref()
            .and_then(|members| members.get(identity))
        {
            Some(member) if member.has_role(role_id) => MemberAction::Skip,
            Some(_) => MemberAction::Assign,
            None => MemberAction::Invite,
        }
    }

    fn record_member_failure(
        &mut self,
        identity: &str,
        role: &str,
        operation: MemberOperation,
        error: String,
    ) {
        warn!(identity, role, ?operation, error = %error, "member operation failed");
        self.result.member_failures.push(MemberFailure {
            identity: identity.to_owned(),
            role: role.to_owned(),
            operation,
            error,
        });
    }

    fn finish(self, outcome: AppResult<()>) -> ExecutionResult {
        let mut result = self.result;
        match outcome {
            Ok(()) => info!(
                dry_run = result.dry_run,
                created = result.created_count,
                updated = result.updated_count,
                deleted = result.deleted_count,
                invited = result.invited_count,
                member_failures = result.member_failures.len(),
                "plan execution finished"
            ),
            Err(error) => {
                warn!(
                    created = result.created_count,
                    updated = result.updated_count,
                    deleted = result.deleted_count,
                    error = %error,
                    "plan execution stopped"
                );
                result.error = Some(error);
            }
        }

        result
    }
}

impl PlanExecutor {
    /// Creates an executor over a role store.
    #[must_use]
    pub fn new(store: Arc<dyn RoleStore>, options: ExecutorOptions) -> Self {
        Self { store, options }
    }

    /// Applies the plan and reports what was done.
    ///
    /// The returned result carries the error that stopped the run, if any,
    /// alongside the counts accumulated until then.
    pub async fn execute(&self, plan: &ChangePlan, cancel: &CancellationToken) -> ExecutionResult {
        let mut run = ExecutionRun {
            apply: !self.options.dry_run,
            invite_missing_members: self.options.invite_missing_members,
            cancel,
            result: ExecutionResult {
                dry_run: self.options.dry_run,
                ..ExecutionResult::default()
            },
            members: None,
        };

        let outcome = self.apply_plan(plan, &mut run).await;
        run.finish(outcome)
    }

    async fn apply_plan(&self, plan: &ChangePlan, run: &mut ExecutionRun<'_>) -> AppResult<()> {
        for role in plan.creates() {
            self.create_role(role, run).await?;
        }
        for update in plan.updates() {
            self.update_role(update, run).await?;
        }
        for name in plan.deletes() {
            self.delete_role(name, run).await?;
        }

        Ok(())
    }

    async fn create_role(&self, role: &Role, run: &mut ExecutionRun<'_>) -> AppResult<()> {
        if !run.apply {
            info!(role = %role.name(), members = role.members().len(), "dry run: would create role");
            run.result.previewed.creates += 1;
            return Ok(());
        }

        run.ensure_active()?;
        let created = self.store.create_role(role, run.cancel).await?;
        run.result.created_count += 1;
        info!(role = %role.name(), "created role");

        self.reconcile_members(role, created.id(), run).await
    }

    async fn update_role(&self, update: &RoleUpdate, run: &mut ExecutionRun<'_>) -> AppResult<()> {
        if !run.apply {
            let changes = update.changes();
            info!(
                role = %update.name(),
                allowed_added = changes.allowed.added.len(),
                allowed_removed = changes.allowed.removed.len(),
                denied_added = changes.denied.added.len(),
                denied_removed = changes.denied.removed.len(),
                members_added = changes.members.added.len(),
                "dry run: would update role"
            );
            run.result.previewed.updates += 1;
            return Ok(());
        }

        run.ensure_active()?;
        let desired = update.desired();
        let updated = self.store.update_role(&desired, run.cancel).await?;
        run.result.updated_count += 1;
        info!(role = %update.name(), "updated role");

        let role_id = updated.id().or_else(|| desired.id());
        self.reconcile_members(update.local(), role_id, run).await
    }

    async fn delete_role(&self, name: &str, run: &mut ExecutionRun<'_>) -> AppResult<()> {
        if !run.apply {
            info!(role = %name, "dry run: would delete role");
            run.result.previewed.deletes += 1;
            return Ok(());
        }

        run.ensure_active()?;
        self.store.delete_role(name, run.cancel).await?;
        run.result.deleted_count += 1;
        info!(role = %name, "deleted role");
        Ok(())
    }

    async fn reconcile_members(
        &self,
        role: &Role,
        known_role_id: Option<&str>,
        run: &mut ExecutionRun<'_>,
    ) -> AppResult<()> {
        if role.members().is_empty() {
            return Ok(());
        }

        let role_id = match known_role_id {
            Some(role_id) => role_id.to_owned(),
            None => match self.lookup_role_id(role.name(), run.cancel).await {
                Ok(role_id) => role_id,
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    let error = error.to_string();
                    for identity in role.members() {
                        run.record_member_failure(
                            identity,
                            role.name(),
                            MemberOperation::Assign,
                            error.clone(),
                        );
                    }
                    return Ok(());
                }
            },
        };
        self.load_members(run).await?;

        for identity in role.members() {
            run.ensure_active()?;
            match run.member_action(identity, &role_id) {
                MemberAction::Skip => {
                    debug!(identity = %identity, role = %role.name(), "member already holds role");
                }
                MemberAction::Assign => self.assign(identity, role, &role_id, run).await?,
                MemberAction::Invite if !run.invite_missing_members => {
                    run.record_member_failure(
                        identity,
                        role.name(),
                        MemberOperation::Invite,
                        "member does not exist and invitations are disabled".to_owned(),
                    );
                }
                MemberAction::Invite => {
                    if self.invite(identity, role, &role_id, run).await? {
                        self.assign(identity, role, &role_id, run).await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn lookup_role_id(&self, name: &str, cancel: &CancellationToken) -> AppResult<String> {
        self.store
            .find_role(name, cancel)
            .await?
            .and_then(|role| role.id().map(str::to_owned))
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{name}' has no remote identifier"))
            })
    }

    async fn load_members(&self, run: &mut ExecutionRun<'_>) -> AppResult<()> {
        if run.members.is_some() {
            return Ok(());
        }

        let members = self.store.list_members(run.cancel).await?;
        debug!(count = members.len(), "fetched remote member snapshot");
        run.members = Some(
            members
                .into_iter()
                .map(|member| (member.identity.clone(), member))
                .collect(),
        );
        Ok(())
    }

    async fn invite(
        &self,
        identity: &str,
        role: &Role,
        role_id: &str,
        run: &mut ExecutionRun<'_>,
    ) -> AppResult<bool> {
        match self.store.invite_member(identity, role_id, run.cancel).await {
            Ok(()) => {
                run.result.invited_count += 1;
                info!(identity, role = %role.name(), "invited member");
                Ok(true)
            }
            Err(error) if error.is_cancelled() => Err(error),
            Err(error) => {
                run.record_member_failure(
                    identity,
                    role.name(),
                    MemberOperation::Invite,
                    error.to_string(),
                );
                Ok(false)
            }
        }
    }

    async fn assign(
        &self,
        identity: &str,
        role: &Role,
        role_id: &str,
        run: &mut ExecutionRun<'_>,
    ) -> AppResult<()> {
        match self
            .store
            .assign_member_role(identity, role_id, run.cancel)
            .await
        {
            Ok(()) => {
                run.result.assigned_count += 1;
                info!(identity, role = %role.name(), "assigned member role");
                Ok(())
            }
            Err(error) if error.is_cancelled() => Err(error),
            Err(error) => {
                run.record_member_failure(
                    identity,
                    role.name(),
                    MemberOperation::Assign,
                    error.to_string(),
                );
                Ok(())
            }
        }
    }
}
