//! Shared vocabulary of the release-mesh setup pipeline.
//!
//! This crate owns everything the other crates agree on by name: the
//! structured-name grammar, the command model, the spec registry, and
//! the error taxonomy. It deliberately knows nothing about scenes or
//! execution order.

pub mod command;
pub mod error;
pub mod names;
pub mod profile;
pub mod spec;

pub use command::{Command, CommandArgs, ScopeKind, add_command, commands_in_scope, remove_command, renumber};
pub use error::{Result, SetupError};
pub use names::{CollectionRole, MergeSourceTag, classify_collection, dedupe_name};
pub use profile::{BoneGroupProfile, Profile, ShapeKeyProfile, ShapeKeyRow};
pub use spec::{SPEC_DEFAULT, SPEC_DEFAULT_ONLY, SPEC_DISABLE, Spec, SpecRegistry};
