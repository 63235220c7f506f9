//! Application services and ports.

#![forbid(unsafe_code)]

mod plan_executor;
mod retry;
mod retrying_role_store;
mod role_sync_service;
mod sync_ports;

#[cfg(test)]
mod test_support;

pub use plan_executor::{
    ExecutionResult, ExecutorOptions, MemberFailure, MemberOperation, PlanExecutor,
};
pub use retry::{Retrier, RetryObserver, RetryPolicy, RetryState};
pub use retrying_role_store::RetryingRoleStore;
pub use role_sync_service::{RoleSyncService, SyncOutcome};
pub use sync_ports::RoleStore;
