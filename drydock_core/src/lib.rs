pub use failure::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The status lattice and backend-response classifiers.
pub mod status;

/// Template expansion: env substitution, `tera` rendering, import/indent/
/// loadFile/trim/hash/base64/asGenericMap/asMapString.
pub mod template;

/// Glob- and URL-based resource file discovery, plus the expand/strip/split
/// pipeline that turns a file into one or more `Resource`s.
pub mod resource_file;

/// The resource group dependency graph and its two BFS walkers.
pub mod graph;

/// The project descriptor, variable precedence chain, and docker credentials.
pub mod project;

/// The group filter predicate held by `Project::filter`.
pub mod filter;

pub use filter::GroupFilter;
pub use graph::{ResourceGraph, ResourceGroup, ResourceGroupConfig, WaitConfig};
pub use project::{Config, CredentialConfig, DockerCredential, Project};
pub use resource_file::{Resource, ResourceFile};
pub use status::Status;
pub use template::Variables;
