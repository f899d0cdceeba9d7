//! The build action executed inside the Gradle daemon.
//!
//! Outcomes are split three ways. A failure to evaluate the build scripts and
//! a failure of the fetch logic itself end the whole fetch, each on its own
//! channel. A failing builder only costs its own result slot.

use bytes::Bytes;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use gradle_fetch_core::wire::{WireReader, WireWriter};
use gradle_fetch_core::{
    BuilderIssue, CustomSerializedMap, Encodable, EncodedValue, ErasedBuildInfoBuilder,
    FetchError, GradleProjectTree, ProjectPath, Result, TransferValue, TransferableIssue,
    invoke_guarded,
};

use crate::builders::{BuilderCatalog, decode_builders};
use crate::controller::{BasicGradleProject, BuildController, GradleBuild, ToolingModel};
use crate::input::FetchActionRequest;
use crate::project_info::{BasicProjectInfo, ModelQueryOutput, ModelQueryOutputRef};
use crate::tree::{ProjectForest, ProjectTreeAssembler};

const MAGIC: &[u8; 4] = b"GFAM";
const OUTCOME_MODELS: u8 = 0;
const OUTCOME_BUILD_SCRIPT_ERROR: u8 = 1;
const OUTCOME_UNEXPECTED_ERROR: u8 = 2;

/// Results collected for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFetchedProjectModels {
    pub project_tree: GradleProjectTree,
    pub project_info_results: CustomSerializedMap,
    pub tooling_models: Vec<(ToolingModel, EncodedValue)>,
    pub issue: Option<TransferableIssue>,
}

impl ActionFetchedProjectModels {
    pub fn project_path(&self) -> &ProjectPath {
        self.project_tree.path()
    }

    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.put_json(&self.project_tree)?;
        self.project_info_results.write_to(writer)?;
        writer.put_len(self.tooling_models.len())?;
        for (model, value) in &self.tooling_models {
            writer.put_str(model.name())?;
            writer.put_encoded(value)?;
        }
        writer.put_bool(self.issue.is_some());
        if let Some(issue) = &self.issue {
            writer.put_json(issue)?;
        }
        Ok(())
    }

    fn read_from(reader: &mut WireReader) -> Result<Self> {
        let project_tree = reader.get_json()?;
        let project_info_results = CustomSerializedMap::read_from(reader)?;
        let count = reader.get_len()?;
        let mut tooling_models = Vec::new();
        for _ in 0..count {
            let model = ToolingModel::new(reader.get_str()?);
            tooling_models.push((model, reader.get_encoded()?));
        }
        let issue = if reader.get_bool()? {
            Some(reader.get_json()?)
        } else {
            None
        };
        Ok(Self {
            project_tree,
            project_info_results,
            tooling_models,
            issue,
        })
    }
}

/// Everything the action computed for a successfully evaluated build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFetchedModels {
    pub build_info_results: CustomSerializedMap,
    pub default_project: ActionFetchedProjectModels,
    pub other_projects: Vec<ActionFetchedProjectModels>,
}

impl ActionFetchedModels {
    /// The default project followed by all others.
    pub fn projects(&self) -> impl Iterator<Item = &ActionFetchedProjectModels> {
        std::iter::once(&self.default_project).chain(&self.other_projects)
    }
}

/// Payload returned by the build action: exactly one of three outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFetchedModelsOrError {
    Models(Box<ActionFetchedModels>),
    /// The build scripts could not be evaluated; nothing else was attempted.
    BuildScriptError(TransferableIssue),
    /// The build evaluated but the fetch logic failed.
    UnexpectedError(TransferableIssue),
}

impl ActionFetchedModelsOrError {
    pub fn models(&self) -> Option<&ActionFetchedModels> {
        match self {
            Self::Models(models) => Some(models),
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

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = WireWriter::new(MAGIC);
        match self {
            Self::Models(models) => {
                writer.put_u8(OUTCOME_MODELS);
                models.build_info_results.write_to(&mut writer)?;
                models.default_project.write_to(&mut writer)?;
                writer.put_len(models.other_projects.len())?;
                for project in &models.other_projects {
                    project.write_to(&mut writer)?;
                }
            }
            Self::BuildScriptError(issue) => {
                writer.put_u8(OUTCOME_BUILD_SCRIPT_ERROR);
                writer.put_json(issue)?;
            }
            Self::UnexpectedError(issue) => {
                writer.put_u8(OUTCOME_UNEXPECTED_ERROR);
                writer.put_json(issue)?;
            }
        }
        Ok(writer.finish())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut reader = WireReader::new(data, MAGIC)?;
        let outcome = match reader.get_u8()? {
            OUTCOME_MODELS => {
                let build_info_results = CustomSerializedMap::read_from(&mut reader)?;
                let default_project = ActionFetchedProjectModels::read_from(&mut reader)?;
                let count = reader.get_len()?;
                let mut other_projects = Vec::new();
                for _ in 0..count {
                    other_projects.push(ActionFetchedProjectModels::read_from(&mut reader)?);
                }
                Self::Models(Box::new(ActionFetchedModels {
                    build_info_results,
                    default_project,
                    other_projects,
                }))
            }
            OUTCOME_BUILD_SCRIPT_ERROR => Self::BuildScriptError(reader.get_json()?),
            OUTCOME_UNEXPECTED_ERROR => Self::UnexpectedError(reader.get_json()?),
            other => {
                return Err(FetchError::wire(format!("unknown fetch outcome {other}")));
            }
        };
        reader.finish()?;
        Ok(outcome)
    }
}

/// Daemon-side entry point of a model fetch.
#[derive(Debug)]
pub struct ModelFetcherBuildAction {
    request: FetchActionRequest,
    catalog: BuilderCatalog,
}

impl ModelFetcherBuildAction {
    pub fn new(request: FetchActionRequest, catalog: BuilderCatalog) -> Self {
        Self { request, catalog }
    }

    /// Decodes an action shipped by the IDE.
    pub fn from_bytes(data: Bytes, catalog: BuilderCatalog) -> Result<Self> {
        Ok(Self::new(FetchActionRequest::from_bytes(data)?, catalog))
    }

    pub fn execute(&self, controller: &dyn BuildController) -> ActionFetchedModelsOrError {
        let build = match controller.build_model() {
            Ok(build) => build,
            Err(err) => {
                tracing::warn!("Build script evaluation failed: {}", err);
                return ActionFetchedModelsOrError::BuildScriptError(TransferableIssue::from_error(
                    &*err,
                ));
            }
        };
        tracing::debug!("build evaluated with {} projects", build.projects.len());

        let fetched = catch_unwind(AssertUnwindSafe(|| self.fetch(controller, &build)));
        match fetched {
            Ok(Ok(models)) => ActionFetchedModelsOrError::Models(Box::new(models)),
            Ok(Err(err)) => {
                tracing::warn!("Model fetch failed after evaluation: {}", err);
                ActionFetchedModelsOrError::UnexpectedError(TransferableIssue::from_error(&err))
            }
            Err(payload) => {
                let issue = TransferableIssue::from_panic(&*payload);
                tracing::warn!("Model fetch panicked after evaluation: {}", issue);
                ActionFetchedModelsOrError::UnexpectedError(issue)
            }
        }
    }

    /// Executes and serializes the outcome for the trip back to the IDE.
    pub fn execute_to_bytes(&self, controller: &dyn BuildController) -> Result<Bytes> {
        self.execute(controller).to_bytes()
    }

    fn fetch(
        &self,
        controller: &dyn BuildController,
        build: &GradleBuild,
    ) -> Result<ActionFetchedModels> {
        let default_descriptor = controller.default_project().map_err(FetchError::Controller)?;

        let default_output = project_output(controller, None)?.ok_or_else(|| {
            FetchError::consistency("no project info model for the default project")
        })?;
        if default_output.project_path() != &default_descriptor.path {
            return Err(FetchError::consistency(format!(
                "project info was built for {} but the default project is {}",
                default_output.project_path(),
                default_descriptor.path
            )));
        }
        let default_path = default_descriptor.path.clone();

        let mut outputs = HashMap::new();
        outputs.insert(default_path.clone(), default_output);
        for project in &build.projects {
            if project.path == default_path {
                continue;
            }
            if let Some(output) = project_output(controller, Some(project))? {
                if output.project_path() != &project.path {
                    return Err(FetchError::consistency(format!(
                        "project info was built for {} but was requested for {}",
                        output.project_path(),
                        project.path
                    )));
                }
                outputs.insert(project.path.clone(), output);
            }
        }

        let infos: HashMap<ProjectPath, BasicProjectInfo> = outputs
            .iter()
            .map(|(path, output)| (path.clone(), output.basic_info.clone()))
            .collect();
        let forest = ProjectTreeAssembler::new(build, &infos).assemble()?;

        let default_project =
            self.project_models(controller, &default_descriptor, &forest, &mut outputs)?;
        let mut other_projects = Vec::new();
        for project in &build.projects {
            if project.path != default_path {
                let models = self.project_models(controller, project, &forest, &mut outputs)?;
                other_projects.push(models);
            }
        }

        let build_info_results = self.build_info_results(controller);

        Ok(ActionFetchedModels {
            build_info_results,
            default_project,
            other_projects,
        })
    }

    fn project_models(
        &self,
        controller: &dyn BuildController,
        project: &BasicGradleProject,
        forest: &ProjectForest,
        outputs: &mut HashMap<ProjectPath, ModelQueryOutput>,
    ) -> Result<ActionFetchedProjectModels> {
        let output = outputs.remove(&project.path).ok_or_else(|| {
            FetchError::consistency(format!("missing custom info for project {}", project.path))
        })?;
        let project_tree = forest.tree(&project.path).cloned().ok_or_else(|| {
            FetchError::consistency(format!("project {} was not assembled", project.path))
        })?;

        Ok(ActionFetchedProjectModels {
            project_tree,
            project_info_results: output.project_info_results,
            tooling_models: self.tooling_models(controller, project)?,
            issue: output.issue,
        })
    }

    fn tooling_models(
        &self,
        controller: &dyn BuildController,
        project: &BasicGradleProject,
    ) -> Result<Vec<(ToolingModel, EncodedValue)>> {
        let mut models = Vec::new();
        for model in &self.request.tooling_models {
            let Some(value) = controller
                .find_model(Some(project), model)
                .map_err(FetchError::Controller)?
            else {
                continue;
            };
            match value.to_encoded() {
                Ok(encoded) => models.push((model.clone(), encoded)),
                Err(err) => {
                    tracing::warn!("Dropping model {} of project {}: {}", model, project.path, err);
                }
            }
        }
        Ok(models)
    }

    fn build_info_results(&self, controller: &dyn BuildController) -> CustomSerializedMap {
        let decoded = decode_builders(&self.request.build_info_builders, |encoded| {
            self.catalog.decode_build(encoded)
        });

        let mut results = CustomSerializedMap::builder();
        for (key, issue) in decoded.failures {
            results.add_failure(key, issue);
        }
        for (key, builder) in &decoded.builders {
            results.add_outcome(*key, run_build_builder(builder.as_ref(), controller));
        }
        results.create()
    }
}

fn run_build_builder(
    builder: &dyn ErasedBuildInfoBuilder,
    controller: &dyn BuildController,
) -> std::result::Result<Option<TransferValue>, BuilderIssue> {
    let name = builder.builder_name();
    invoke_guarded(&name, || builder.invoke(controller.build_handle()))
}

fn project_output(
    controller: &dyn BuildController,
    target: Option<&BasicGradleProject>,
) -> Result<Option<ModelQueryOutput>> {
    let Some(value) = controller
        .find_model(target, &ToolingModel::project_info())
        .map_err(FetchError::Controller)?
    else {
        return Ok(None);
    };
    let reference = value.downcast_ref::<ModelQueryOutputRef>().ok_or_else(|| {
        FetchError::consistency(format!(
            "project info model has unexpected type {}",
            value.type_tag()
        ))
    })?;
    reference.output().map(Some)
}
