//! Tooling API controller abstraction.
//!
//! Inside the daemon the build action talks to Gradle only through
//! [`BuildController`]. The lightweight project descriptors it returns carry
//! topology (parent/children) but none of the custom model data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use gradle_fetch_core::{BoxError, BuildHandle, ProjectPath, TransferValue, Transferable};

use crate::project_info::ModelQueryOutputRef;

/// Identifier of a model the controller can look up, e.g.
/// `org.gradle.tooling.model.idea.IdeaProject`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolingModel(String);

impl ToolingModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The custom per-project model registered by the generated init script.
    pub fn project_info() -> Self {
        Self::new(ModelQueryOutputRef::TYPE_TAG)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tooling API descriptor of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicGradleProject {
    pub name: String,
    pub path: ProjectPath,
    pub project_dir: PathBuf,
    pub parent: Option<ProjectPath>,
    pub children: Vec<ProjectPath>,
}

/// Tooling API descriptor of the whole build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradleBuild {
    pub root_project: ProjectPath,
    pub projects: Vec<BasicGradleProject>,
}

impl GradleBuild {
    pub fn project(&self, path: &ProjectPath) -> Option<&BasicGradleProject> {
        self.projects.iter().find(|project| &project.path == path)
    }
}

/// Daemon-side handle used by the build action.
pub trait BuildController {
    /// Evaluates the build and returns its project descriptors.
    ///
    /// An error here means the build scripts could not be evaluated.
    fn build_model(&self) -> Result<GradleBuild, BoxError>;

    /// Descriptor of the project the fetch was started for.
    fn default_project(&self) -> Result<BasicGradleProject, BoxError>;

    /// The evaluated build, for build-level builders.
    fn build_handle(&self) -> &dyn BuildHandle;

    /// Looks up `model` for `target`, or for the default project when `target`
    /// is `None`. `Ok(None)` means the model is not available.
    fn find_model(
        &self,
        target: Option<&BasicGradleProject>,
        model: &ToolingModel,
    ) -> Result<Option<TransferValue>, BoxError>;
}
