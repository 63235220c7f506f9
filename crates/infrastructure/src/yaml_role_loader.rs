use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use rolesync_core::{AppError, AppResult};
use rolesync_domain::{Role, RoleRecord};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleDocument {
    Many(Vec<RoleRecord>),
    One(RoleRecord),
}

impl RoleDocument {
    fn into_records(self) -> Vec<RoleRecord> {
        match self {
            Self::Many(records) => records,
            Self::One(record) => vec![record],
        }
    }
}

/// Loads local role definitions from YAML files.
///
/// A file holds either a single role mapping or a sequence of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRoleLoader;

impl YamlRoleLoader {
    /// Loads every `*.yaml` and `*.yml` file directly inside `dir`.
    ///
    /// Files are read in name order. A role name declared in two files is
    /// rejected.
    pub fn load_dir(&self, dir: &Path) -> AppResult<Vec<Role>> {
        let mut roles = Vec::new();
        let mut origins: HashMap<String, PathBuf> = HashMap::new();

        for path in role_files(dir)? {
            for role in self.load_file(&path)? {
                if let Some(previous) = origins.get(role.name()) {
                    return Err(AppError::Validation(format!(
                        "role '{}' is declared in both '{}' and '{}'",
                        role.name(),
                        previous.display(),
                        path.display()
                    )));
                }

                origins.insert(role.name().to_owned(), path.clone());
                roles.push(role);
            }
        }

        debug!(dir = %dir.display(), roles = roles.len(), "loaded local role definitions");
        Ok(roles)
    }

    /// Loads the roles declared in one file.
    pub fn load_file(&self, path: &Path) -> AppResult<Vec<Role>> {
        let content = fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read role file '{}': {error}",
                path.display()
            ))
        })?;

        parse_roles(&content).map_err(|error| match error {
            AppError::Validation(message) => {
                AppError::Validation(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }
}

fn parse_roles(content: &str) -> AppResult<Vec<Role>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: RoleDocument = serde_yaml::from_str(content)
        .map_err(|error| AppError::Validation(format!("invalid role definition: {error}")))?;

    let roles = document
        .into_records()
        .into_iter()
        .map(Role::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    let mut seen = HashSet::with_capacity(roles.len());
    for role in &roles {
        if !seen.insert(role.name()) {
            return Err(AppError::Validation(format!(
                "role '{}' is declared more than once",
                role.name()
            )));
        }
    }

    Ok(roles)
}

fn role_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|error| {
        AppError::Validation(format!(
            "failed to read roles directory '{}': {error}",
            dir.display()
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|error| {
                AppError::Validation(format!(
                    "failed to read roles directory '{}': {error}",
                    dir.display()
                ))
            })?
            .path();

        let is_yaml = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| matches!(extension, "yaml" | "yml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests;
