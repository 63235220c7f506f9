//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_role_store;
mod in_memory_role_store;
mod yaml_role_loader;

pub use http_role_store::HttpRoleStore;
pub use in_memory_role_store::InMemoryRoleStore;
pub use yaml_role_loader::YamlRoleLoader;
