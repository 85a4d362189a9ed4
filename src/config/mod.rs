//! Configuration: CLI definition, YAML profile spec, scheduler environment.

pub mod cli;
mod env;
mod loader;
mod schema;
mod validate;

pub use cli::{apply_overrides, parse_args, AnalyzeArgs, Cli, Command, ProfileArgs};
pub use env::{JobEnvironment, TargetSource, JOB_ID_VAR, PROC_ID_VAR, STEP_GPUS_VAR};
pub use loader::{load_spec, parse_spec};
pub use schema::{BackendKind, ProfileSpec};
pub use validate::{validate_spec, ValidationError};
