use std::fs;
use std::path::Path;

use rolesync_core::AppError;
use tempfile::TempDir;

use super::YamlRoleLoader;

fn write(dir: &Path, file: &str, content: &str) {
    if let Err(error) = fs::write(dir.join(file), content) {
        panic!("failed to write fixture '{file}': {error}");
    }
}

fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(error) => panic!("failed to create temp dir: {error}"),
    }
}

#[test]
fn loads_single_role_and_role_lists_in_file_order() {
    let dir = temp_dir();
    write(
        dir.path(),
        "b-team.yml",
        "- name: ops\n  resources:\n    allowed: [deploy]\n  members: [ops@x.com]\n- name: viewer\n",
    );
    write(
        dir.path(),
        "a-admin.yaml",
        "name: admin\nresources:\n  allowed: ['*']\n  denied: [billing]\n",
    );
    write(dir.path(), "notes.txt", "not a role");

    let roles = YamlRoleLoader.load_dir(dir.path());

    let Ok(roles) = roles else {
        panic!("roles should load: {roles:?}");
    };
    let names: Vec<&str> = roles.iter().map(|role| role.name()).collect();
    assert_eq!(names, vec!["admin", "ops", "viewer"]);
    assert!(roles[0].denied().contains("billing"));
    assert!(roles[1].members().contains("ops@x.com"));
    assert!(roles[2].allowed().is_empty());
}

#[test]
fn duplicate_names_across_files_name_both_files() {
    let dir = temp_dir();
    write(dir.path(), "first.yaml", "name: admin\n");
    write(dir.path(), "second.yaml", "name: admin\n");

    let roles = YamlRoleLoader.load_dir(dir.path());

    match roles {
        Err(AppError::Validation(message)) => {
            assert!(message.contains("first.yaml"));
            assert!(message.contains("second.yaml"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn blank_role_name_is_rejected_with_file_context() {
    let dir = temp_dir();
    write(dir.path(), "broken.yaml", "name: '   '\n");

    let roles = YamlRoleLoader.load_file(&dir.path().join("broken.yaml"));

    assert!(matches!(roles, Err(AppError::Validation(message)) if message.contains("broken.yaml")));
}

#[test]
fn malformed_yaml_is_validation_error() {
    let dir = temp_dir();
    write(dir.path(), "broken.yaml", "name: [unterminated\n");

    let roles = YamlRoleLoader.load_dir(dir.path());

    assert!(matches!(roles, Err(AppError::Validation(_))));
}

#[test]
fn empty_file_declares_no_roles() {
    let dir = temp_dir();
    write(dir.path(), "empty.yaml", "\n");

    let roles = YamlRoleLoader.load_dir(dir.path());

    assert!(matches!(roles, Ok(roles) if roles.is_empty()));
}

#[test]
fn missing_directory_is_reported() {
    let dir = temp_dir();

    let roles = YamlRoleLoader.load_dir(&dir.path().join("absent"));

    assert!(matches!(roles, Err(AppError::Validation(message)) if message.contains("absent")));
}
