//! Role model, change plans and the role comparator.

#![forbid(unsafe_code)]

mod comparator;
mod member;
mod plan;
mod role;

pub use comparator::{compare, validate_unique_members};
pub use member::Member;
pub use plan::{ChangePlan, PlanSummary, RoleChanges, RoleUpdate, SetChange};
pub use role::{ResourceRecord, Role, RoleRecord};
