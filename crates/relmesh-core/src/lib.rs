//! Setup orchestration engine: collection status, scheduling, the
//! per-object strategy pipeline, release execution, and translation.
//!
//! Entry points: [`queue::schedule`] decides what to rebuild,
//! [`execute::execute`] rebuilds it, [`translate::translate`] renames a
//! finished release toward an export convention.

pub mod apply;
pub mod cleanup;
pub mod execute;
pub mod queue;
pub mod status;
pub mod strategy;
pub mod translate;

pub use execute::{execute, execute_collection};
pub use queue::{ScheduleMode, schedule};
pub use status::{CollectionStatus, ReleasePlacement};
pub use strategy::{ObjectStrategy, StrategyContext, StrategyPipeline, build_default_pipeline};
pub use translate::{TranslateMode, translate};
