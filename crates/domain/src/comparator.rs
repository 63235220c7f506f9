use std::collections::{BTreeMap, HashMap};

use rolesync_core::{AppError, AppResult};

use crate::{ChangePlan, Role, RoleUpdate};

/// Computes the operations that reconcile `remote` with `local`.
///
/// Local roles missing remotely are created, diverging roles are updated and
/// remote roles without a local definition are deleted. Equivalent roles
/// produce no operation. Fails without a plan when a member identity is
/// declared by more than one local role, or when either side repeats a name.
pub fn compare(local: &[Role], remote: &[Role]) -> AppResult<ChangePlan> {
    validate_unique_members(local)?;
    let local_by_name = index_by_name(local, "local")?;
    let remote_by_name = index_by_name(remote, "remote")?;

    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for role in local {
        match remote_by_name.get(role.name()) {
            None => creates.push(role.clone()),
            Some(existing) if !role.is_equivalent(existing) => {
                updates.push(RoleUpdate::new(role.clone(), (*existing).clone())?);
            }
            Some(_) => {}
        }
    }

    let deletes = remote
        .iter()
        .filter(|role| !local_by_name.contains_key(role.name()))
        .map(|role| role.name().to_owned())
        .collect();

    ChangePlan::new(creates, updates, deletes)
}

/// Rejects role sets where one member identity belongs to several roles.
///
/// The reported member is the lowest conflicting identity so repeated runs
/// report the same conflict.
pub fn validate_unique_members(roles: &[Role]) -> AppResult<()> {
    let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for role in roles {
        for member in role.members() {
            owners.entry(member.as_str()).or_default().push(role.name());
        }
    }

    match owners.into_iter().find(|(_, roles)| roles.len() > 1) {
        Some((member, mut roles)) => {
            roles.sort_unstable();
            Err(AppError::DuplicateMember {
                member: member.to_owned(),
                roles: roles.into_iter().map(str::to_owned).collect(),
            })
        }
        None => Ok(()),
    }
}

fn index_by_name<'a>(roles: &'a [Role], side: &str) -> AppResult<HashMap<&'a str, &'a Role>> {
    let mut index = HashMap::with_capacity(roles.len());
    for role in roles {
        if index.insert(role.name(), role).is_some() {
            return Err(AppError::Validation(format!(
                "{side} role '{}' is defined more than once",
                role.name()
            )));
        }
    }

    Ok(index)
}
