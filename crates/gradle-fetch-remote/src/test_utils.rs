//! In-memory build used by the daemon-side tests.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gradle_fetch_core::{
    BoxError, BuildHandle, BuildInfoBuilder, GradleTaskId, ProjectHandle, ProjectId,
    ProjectInfoBuilder, ProjectPath, TransferValue, Transferable,
};

use crate::builders::BuilderCatalog;
use crate::controller::{BasicGradleProject, BuildController, GradleBuild, ToolingModel};
use crate::input::ModelQueryInput;
use crate::project_info::ProjectInfoModelBuilder;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProjectDirNameBuilder;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ProjectDirName(pub(crate) String);

impl Transferable for ProjectDirNameBuilder {
    const TYPE_TAG: &'static str = "test.ProjectDirNameBuilder";
}

impl Transferable for ProjectDirName {
    const TYPE_TAG: &'static str = "test.ProjectDirName";
}

impl ProjectInfoBuilder for ProjectDirNameBuilder {
    type Info = ProjectDirName;

    fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<ProjectDirName>, BoxError> {
        let name = project
            .project_dir()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(name.map(ProjectDirName))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TaskCountBuilder;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct TaskCount {
    pub(crate) count: usize,
}

impl Transferable for TaskCountBuilder {
    const TYPE_TAG: &'static str = "test.TaskCountBuilder";
}

impl Transferable for TaskCount {
    const TYPE_TAG: &'static str = "test.TaskCount";
}

impl ProjectInfoBuilder for TaskCountBuilder {
    type Info = TaskCount;

    fn name(&self) -> String {
        "task-count".to_string()
    }

    fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<TaskCount>, BoxError> {
        Ok(Some(TaskCount {
            count: project.tasks()?.len(),
        }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GradleVersionBuilder;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradleVersion(pub(crate) String);

impl Transferable for GradleVersionBuilder {
    const TYPE_TAG: &'static str = "test.GradleVersionBuilder";
}

impl Transferable for GradleVersion {
    const TYPE_TAG: &'static str = "test.GradleVersion";
}

impl BuildInfoBuilder for GradleVersionBuilder {
    type Info = GradleVersion;

    fn build_info(&self, build: &dyn BuildHandle) -> Result<Option<GradleVersion>, BoxError> {
        Ok(Some(GradleVersion(build.gradle_version().to_string())))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PanickingBuildBuilder;

impl Transferable for PanickingBuildBuilder {
    const TYPE_TAG: &'static str = "test.PanickingBuildBuilder";
}

impl BuildInfoBuilder for PanickingBuildBuilder {
    type Info = GradleVersion;

    fn build_info(&self, _build: &dyn BuildHandle) -> Result<Option<GradleVersion>, BoxError> {
        panic!("builder bug")
    }
}

pub(crate) fn builder_catalog() -> BuilderCatalog {
    BuilderCatalog::new()
        .with_project::<ProjectDirNameBuilder>()
        .with_project::<TaskCountBuilder>()
        .with_build::<GradleVersionBuilder>()
        .with_build::<PanickingBuildBuilder>()
}

#[derive(Debug, Clone)]
pub(crate) struct FakeProject {
    path: ProjectPath,
    dir: PathBuf,
    build_dir: PathBuf,
    tasks: Result<Vec<String>, String>,
}

impl FakeProject {
    pub(crate) fn new(path: &str) -> Self {
        let path = ProjectPath::parse(path).unwrap();
        let dir = path
            .segments()
            .fold(PathBuf::from("/work/root"), |dir, segment| dir.join(segment));
        Self {
            build_dir: dir.join("build"),
            dir,
            path,
            tasks: Ok(Vec::new()),
        }
    }

    pub(crate) fn with_tasks(mut self, tasks: &[&str]) -> Self {
        self.tasks = Ok(tasks.iter().map(ToString::to_string).collect());
        self
    }

    pub(crate) fn with_failing_tasks(mut self, message: &str) -> Self {
        self.tasks = Err(message.to_string());
        self
    }
}

impl ProjectHandle for FakeProject {
    fn path(&self) -> &ProjectPath {
        &self.path
    }

    fn name(&self) -> &str {
        if self.path.is_root() { "root" } else { self.path.name() }
    }

    fn project_dir(&self) -> &Path {
        &self.dir
    }

    fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn build_script(&self) -> Option<&Path> {
        None
    }

    fn project_id(&self) -> ProjectId {
        ProjectId::new("org.example", self.name(), "1.0")
    }

    fn tasks(&self) -> Result<Vec<GradleTaskId>, BoxError> {
        match &self.tasks {
            Ok(names) => Ok(names
                .iter()
                .map(|name| GradleTaskId::new(self.path.clone(), name.as_str()))
                .collect()),
            Err(message) => Err(message.clone().into()),
        }
    }

    fn property(&self, _name: &str) -> Option<String> {
        None
    }
}

/// A build whose projects are listed in `order`, with topology derived from
/// the project paths.
pub(crate) struct FakeBuild {
    projects: BTreeMap<ProjectPath, FakeProject>,
    order: Vec<ProjectPath>,
}

impl FakeBuild {
    pub(crate) fn new(projects: Vec<FakeProject>) -> Self {
        let order = projects.iter().map(|project| project.path.clone()).collect();
        let projects = projects
            .into_iter()
            .map(|project| (project.path.clone(), project))
            .collect();
        Self { projects, order }
    }

    pub(crate) fn descriptor(&self, path: &ProjectPath) -> BasicGradleProject {
        let project = &self.projects[path];
        BasicGradleProject {
            name: project.name().to_string(),
            path: path.clone(),
            project_dir: project.dir.clone(),
            parent: path.parent(),
            children: self
                .order
                .iter()
                .filter(|candidate| candidate.parent().as_ref() == Some(path))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn gradle_build(&self) -> GradleBuild {
        GradleBuild {
            root_project: ProjectPath::root(),
            projects: self.order.iter().map(|path| self.descriptor(path)).collect(),
        }
    }
}

impl BuildHandle for FakeBuild {
    fn root_project_dir(&self) -> &Path {
        Path::new("/work/root")
    }

    fn gradle_version(&self) -> &str {
        "8.10"
    }

    fn project_paths(&self) -> Vec<ProjectPath> {
        self.order.clone()
    }

    fn project(&self, path: &ProjectPath) -> Option<&dyn ProjectHandle> {
        self.projects.get(path).map(|project| project as &dyn ProjectHandle)
    }
}

pub(crate) enum ControllerFailure {
    Evaluation(String),
    DefaultPathMismatch(ProjectPath),
    /// Project info requested for `requested` is built for `answered`.
    MisroutedProjectInfo {
        requested: ProjectPath,
        answered: ProjectPath,
    },
}

/// Controller answering from a [`FakeBuild`] through the real
/// [`ProjectInfoModelBuilder`].
pub(crate) struct FakeController {
    build: FakeBuild,
    default_project: ProjectPath,
    model_builder: ProjectInfoModelBuilder,
    tooling_models: BTreeMap<(ProjectPath, String), TransferValue>,
    failure: Option<ControllerFailure>,
    pub(crate) lookups: RefCell<Vec<(Option<ProjectPath>, String)>>,
}

impl FakeController {
    pub(crate) fn new(build: FakeBuild, default_project: &str, input: &ModelQueryInput) -> Self {
        Self {
            build,
            default_project: ProjectPath::parse(default_project).unwrap(),
            model_builder: ProjectInfoModelBuilder::new(input, &builder_catalog()),
            tooling_models: BTreeMap::new(),
            failure: None,
            lookups: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_tooling_model(
        mut self,
        project: &str,
        model: &str,
        value: TransferValue,
    ) -> Self {
        let path = ProjectPath::parse(project).unwrap();
        self.tooling_models.insert((path, model.to_string()), value);
        self
    }

    pub(crate) fn failing(mut self, failure: ControllerFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}

impl BuildController for FakeController {
    fn build_model(&self) -> Result<GradleBuild, BoxError> {
        if let Some(ControllerFailure::Evaluation(message)) = &self.failure {
            return Err(message.clone().into());
        }
        Ok(self.build.gradle_build())
    }

    fn default_project(&self) -> Result<BasicGradleProject, BoxError> {
        let mut descriptor = self.build.descriptor(&self.default_project);
        if let Some(ControllerFailure::DefaultPathMismatch(path)) = &self.failure {
            descriptor.path = path.clone();
        }
        Ok(descriptor)
    }

    fn build_handle(&self) -> &dyn BuildHandle {
        &self.build
    }

    fn find_model(
        &self,
        target: Option<&BasicGradleProject>,
        model: &ToolingModel,
    ) -> Result<Option<TransferValue>, BoxError> {
        let path = target.map_or_else(|| self.default_project.clone(), |t| t.path.clone());
        self.lookups
            .borrow_mut()
            .push((target.map(|t| t.path.clone()), model.name().to_string()));

        if model == &ToolingModel::project_info() {
            let path = match &self.failure {
                Some(ControllerFailure::MisroutedProjectInfo { requested, answered })
                    if *requested == path =>
                {
                    answered.clone()
                }
                _ => path,
            };
            let project = self.build.project(&path).ok_or("unknown project")?;
            return Ok(Some(self.model_builder.build_model(project)?));
        }
        Ok(self.tooling_models.get(&(path, model.name().to_string())).cloned())
    }
}
