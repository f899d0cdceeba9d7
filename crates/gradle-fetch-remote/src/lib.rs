//! Daemon-side half of the Gradle model fetch protocol.
//!
//! Runs inside the Gradle daemon:
//! - [`ProjectInfoModelBuilder`]: the per-project model registered by the init script
//! - [`ModelFetcherBuildAction`]: the build action collecting every model in one pass
//! - [`ProjectTreeAssembler`]: rebuilds the project hierarchy from the evaluated projects

pub mod action;
pub mod builders;
pub mod controller;
pub mod input;
pub mod project_info;
pub mod tree;

#[cfg(test)]
mod test_utils;

pub use action::{
    ActionFetchedModels, ActionFetchedModelsOrError, ActionFetchedProjectModels,
    ModelFetcherBuildAction,
};
pub use builders::{BuilderCatalog, DecodedBuilders, decode_builders};
pub use controller::{BasicGradleProject, BuildController, GradleBuild, ToolingModel};
pub use input::{FetchActionRequest, ModelQueryInput};
pub use project_info::{
    BasicProjectInfo, ModelQueryOutput, ModelQueryOutputRef, ProjectInfoModelBuilder,
};
pub use tree::{ProjectForest, ProjectTreeAssembler};
