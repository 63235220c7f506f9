use std::fmt::Write;

use serde::Serialize;

use rolesync_application::{ExecutionResult, SyncOutcome};
use rolesync_core::{AppError, AppResult};
use rolesync_domain::{ChangePlan, PlanSummary, Role, SetChange};

#[derive(Serialize)]
struct PlanReport<'a> {
    summary: PlanSummary,
    plan: &'a ChangePlan,
}

#[derive(Serialize)]
struct SyncReport<'a> {
    summary: PlanSummary,
    plan: &'a ChangePlan,
    result: &'a ExecutionResult,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    valid: bool,
    roles: &'a [Role],
}

pub fn validation_json(roles: &[Role]) -> AppResult<String> {
    to_json(&ValidationReport { valid: true, roles })
}

pub fn plan_json(plan: &ChangePlan) -> AppResult<String> {
    to_json(&PlanReport {
        summary: plan.summary(),
        plan,
    })
}

pub fn sync_json(outcome: &SyncOutcome) -> AppResult<String> {
    to_json(&SyncReport {
        summary: outcome.plan.summary(),
        plan: &outcome.plan,
        result: &outcome.result,
    })
}

fn to_json<T: Serialize>(report: &T) -> AppResult<String> {
    serde_json::to_string_pretty(report)
        .map_err(|error| AppError::Internal(format!("failed to serialize report: {error}")))
}

pub fn render_validation(roles: &[Role]) -> String {
    let members: usize = roles.iter().map(|role| role.members().len()).sum();
    format!(
        "{} role(s) with {members} member(s) are valid",
        roles.len()
    )
}

pub fn render_plan(plan: &ChangePlan) -> String {
    if plan.is_empty() {
        return "No changes needed".to_owned();
    }

    let mut output = String::new();
    for role in plan.creates() {
        let _ = writeln!(
            output,
            "+ create {} (allowed {}, denied {}, members {})",
            role.name(),
            role.allowed().len(),
            role.denied().len(),
            role.members().len()
        );
    }
    for update in plan.updates() {
        let changes = update.changes();
        let _ = writeln!(
            output,
            "~ update {} (allowed {}, denied {}, members {})",
            update.name(),
            describe_change(&changes.allowed),
            describe_change(&changes.denied),
            describe_change(&changes.members)
        );
    }
    for name in plan.deletes() {
        let _ = writeln!(output, "- delete {name}");
    }

    let summary = plan.summary();
    let _ = write!(
        output,
        "Plan: {} to create, {} to update, {} to delete",
        summary.creates, summary.updates, summary.deletes
    );
    output
}

fn describe_change(change: &SetChange) -> String {
    format!("+{} -{}", change.added.len(), change.removed.len())
}

pub fn render_result(result: &ExecutionResult) -> String {
    let mut output = String::new();

    if result.dry_run && result.error.is_none() {
        let previewed = result.previewed;
        if previewed.total() == 0 {
            output.push_str("No changes needed");
        } else {
            let _ = write!(
                output,
                "Dry run: would create {}, update {}, delete {} role(s)",
                previewed.creates, previewed.updates, previewed.deletes
            );
        }
    } else if let Some(error) = &result.error {
        if result.is_partial() {
            let _ = write!(
                output,
                "Partial failure: {} operations completed before error: {error}",
                result.completed()
            );
        } else {
            let _ = write!(output, "Sync failed: {error}");
        }
    } else if result.is_noop() {
        output.push_str("No changes needed");
    } else if !result.member_failures.is_empty() {
        let _ = write!(
            output,
            "Partial failure: {} operations completed, {} member operation(s) failed",
            result.completed(),
            result.member_failures.len()
        );
    } else {
        let _ = write!(
            output,
            "Applied: created {}, updated {}, deleted {} role(s); invited {}, assigned {} member(s)",
            result.created_count,
            result.updated_count,
            result.deleted_count,
            result.invited_count,
            result.assigned_count
        );
    }

    for failure in &result.member_failures {
        let _ = write!(
            output,
            "\n! {:?} {} for role {} failed: {}",
            failure.operation, failure.identity, failure.role, failure.error
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use rolesync_application::{ExecutionResult, MemberFailure, MemberOperation};
    use rolesync_core::AppError;
    use rolesync_domain::{ChangePlan, PlanSummary, Role, compare};

    use super::{plan_json, render_plan, render_result};

    fn role(name: &str) -> Role {
        match Role::new(name) {
            Ok(role) => role,
            Err(error) => panic!("invalid test role '{name}': {error}"),
        }
    }

    #[test]
    fn empty_plan_needs_no_changes() {
        assert_eq!(render_plan(&ChangePlan::default()), "No changes needed");
    }

    #[test]
    fn plan_lists_operations_and_summary() {
        let Ok(plan) = compare(
            &[
                role("admin").with_allowed(["*"]),
                role("editor").with_allowed(["read", "write"]),
            ],
            &[role("editor").with_allowed(["read"]), role("stale")],
        ) else {
            panic!("plan should be valid");
        };

        let rendered = render_plan(&plan);

        assert!(rendered.contains("+ create admin"));
        assert!(rendered.contains("~ update editor (allowed +1 -0"));
        assert!(rendered.contains("- delete stale"));
        assert!(rendered.ends_with("Plan: 1 to create, 1 to update, 1 to delete"));
    }

    #[test]
    fn dry_run_reports_would_be_operations() {
        let result = ExecutionResult {
            dry_run: true,
            previewed: PlanSummary {
                creates: 0,
                updates: 1,
                deletes: 0,
            },
            ..ExecutionResult::default()
        };

        assert_eq!(
            render_result(&result),
            "Dry run: would create 0, update 1, delete 0 role(s)"
        );
    }

    #[test]
    fn partial_failure_reports_completed_count() {
        let result = ExecutionResult {
            created_count: 2,
            error: Some(AppError::from_status(500, "boom")),
            ..ExecutionResult::default()
        };

        assert!(render_result(&result).starts_with("Partial failure: 2 operations completed"));
    }

    #[test]
    fn member_failures_are_listed() {
        let result = ExecutionResult {
            created_count: 1,
            member_failures: vec![MemberFailure {
                identity: "new@x.com".to_owned(),
                role: "ops".to_owned(),
                operation: MemberOperation::Invite,
                error: "invalid email".to_owned(),
            }],
            ..ExecutionResult::default()
        };

        let rendered = render_result(&result);

        assert!(rendered.starts_with(
            "Partial failure: 1 operations completed, 1 member operation(s) failed"
        ));
        assert!(rendered.contains("! Invite new@x.com for role ops failed: invalid email"));
    }

    #[test]
    fn plan_json_carries_summary() {
        let Ok(plan) = compare(&[role("admin")], &[]) else {
            panic!("plan should be valid");
        };

        let json = plan_json(&plan);

        assert!(matches!(json, Ok(json) if json.contains("\"creates\": 1")));
    }
}
