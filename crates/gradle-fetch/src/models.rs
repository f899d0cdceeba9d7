//! Rehydrated fetch results as seen by IDE code.

use std::collections::HashMap;
use std::hash::Hash;

use gradle_fetch_core::{
    BuilderResult, GradleProjectTree, ProjectPath, TransferValue, Transferable, TransferableIssue,
};
use gradle_fetch_remote::ToolingModel;

/// Results of the build-level queries, one list per caller key.
#[derive(Debug, Clone)]
pub struct FetchedBuildModels<K> {
    build_info_results: HashMap<K, Vec<BuilderResult>>,
}

impl<K: Eq + Hash> FetchedBuildModels<K> {
    pub fn new(build_info_results: HashMap<K, Vec<BuilderResult>>) -> Self {
        Self { build_info_results }
    }

    /// One result per query registered under `key`, in registration order.
    pub fn build_info_results(&self, key: &K) -> &[BuilderResult] {
        self.build_info_results
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn all_results(&self) -> &HashMap<K, Vec<BuilderResult>> {
        &self.build_info_results
    }
}

/// Results for one project.
#[derive(Debug, Clone)]
pub struct FetchedProjectModels<K> {
    project_tree: GradleProjectTree,
    project_info_results: HashMap<K, Vec<BuilderResult>>,
    tooling_models: HashMap<ToolingModel, TransferValue>,
    issue: Option<TransferableIssue>,
}

impl<K: Eq + Hash> FetchedProjectModels<K> {
    pub fn new(
        project_tree: GradleProjectTree,
        project_info_results: HashMap<K, Vec<BuilderResult>>,
        tooling_models: HashMap<ToolingModel, TransferValue>,
        issue: Option<TransferableIssue>,
    ) -> Self {
        Self {
            project_tree,
            project_info_results,
            tooling_models,
            issue,
        }
    }

    pub fn project_path(&self) -> &ProjectPath {
        self.project_tree.path()
    }

    /// The subtree rooted at this project.
    pub fn project_tree(&self) -> &GradleProjectTree {
        &self.project_tree
    }

    /// One result per query registered under `key`, in registration order.
    pub fn project_info_results(&self, key: &K) -> &[BuilderResult] {
        self.project_info_results
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tooling_model(&self, model: &ToolingModel) -> Option<&TransferValue> {
        self.tooling_models.get(model)
    }

    /// Typed access to a tooling model decoded as `T`.
    pub fn typed_tooling_model<T: Transferable>(&self, model: &ToolingModel) -> Option<&T> {
        self.tooling_model(model)?.downcast_ref::<T>()
    }

    pub fn tooling_models(&self) -> &HashMap<ToolingModel, TransferValue> {
        &self.tooling_models
    }

    /// Set when the project could only be partially evaluated.
    pub fn issue(&self) -> Option<&TransferableIssue> {
        self.issue.as_ref()
    }
}

/// All results of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedModels<KB, KP> {
    build_models: FetchedBuildModels<KB>,
    default_project_models: FetchedProjectModels<KP>,
    other_project_models: Vec<FetchedProjectModels<KP>>,
}

impl<KB: Eq + Hash, KP: Eq + Hash> FetchedModels<KB, KP> {
    pub fn new(
        build_models: FetchedBuildModels<KB>,
        default_project_models: FetchedProjectModels<KP>,
        other_project_models: Vec<FetchedProjectModels<KP>>,
    ) -> Self {
        Self {
            build_models,
            default_project_models,
            other_project_models,
        }
    }

    pub fn build_models(&self) -> &FetchedBuildModels<KB> {
        &self.build_models
    }

    /// The project the fetch was started for.
    pub fn default_project_models(&self) -> &FetchedProjectModels<KP> {
        &self.default_project_models
    }

    pub fn other_project_models(&self) -> &[FetchedProjectModels<KP>] {
        &self.other_project_models
    }

    /// The default project followed by all others.
    pub fn all_project_models(&self) -> impl Iterator<Item = &FetchedProjectModels<KP>> {
        std::iter::once(&self.default_project_models).chain(&self.other_project_models)
    }

    pub fn project_models(&self, path: &ProjectPath) -> Option<&FetchedProjectModels<KP>> {
        self.all_project_models()
            .find(|models| models.project_path() == path)
    }
}

/// Outcome of a fetch: models, or one of the two fatal errors.
#[derive(Debug, Clone)]
pub enum FetchedModelsOrError<KB, KP> {
    Models(Box<FetchedModels<KB, KP>>),
    /// The build scripts could not be evaluated.
    BuildScriptError(TransferableIssue),
    /// The fetch failed inside the daemon after the build was evaluated.
    UnexpectedError(TransferableIssue),
}

impl<KB, KP> FetchedModelsOrError<KB, KP> {
    pub fn models(&self) -> Option<&FetchedModels<KB, KP>> {
        match self {
            Self::Models(models) => Some(models),
            _ => None,
        }
    }

    pub fn into_models(self) -> Option<FetchedModels<KB, KP>> {
        match self {
            Self::Models(models) => Some(*models),
            _ => None,
        }
    }

    pub fn build_script_evaluation_error(&self) -> Option<&TransferableIssue> {
        match self {
            Self::BuildScriptError(issue) => Some(issue),
            _ => None,
        }
    }

    pub fn unexpected_error(&self) -> Option<&TransferableIssue> {
        match self {
            Self::UnexpectedError(issue) => Some(issue),
            _ => None,
        }
    }
}
