//! A fake Gradle daemon that runs the real build action in-process.
//!
//! It reads the init script and the input file the fetcher wrote, just as
//! Gradle would, so the whole round trip goes through the wire formats.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gradle_fetch::{BuildOperation, ConnectionError, ToolingConnection};
use gradle_fetch_core::{
    BoxError, BuildHandle, BuildInfoBuilder, ClassPath, GradleTaskId, ProjectHandle, ProjectId,
    ProjectInfoBuilder, ProjectPath, TransferValue, Transferable, TypeCatalog,
};
use gradle_fetch_remote::{
    BasicGradleProject, BuildController, BuilderCatalog, GradleBuild, ModelFetcherBuildAction,
    ProjectInfoModelBuilder, ToolingModel,
};

pub(crate) const EXTENSION_JAR: &str = "/ide/plugins/java/java-ext.jar";

// --- builders shipped by an IDE extension ---

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ModuleNameBuilder;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ModuleName(pub(crate) String);

impl Transferable for ModuleNameBuilder {
    const TYPE_TAG: &'static str = "ext.ModuleNameBuilder";
}

impl Transferable for ModuleName {
    const TYPE_TAG: &'static str = "ext.ModuleName";
}

impl ProjectInfoBuilder for ModuleNameBuilder {
    type Info = ModuleName;

    fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<ModuleName>, BoxError> {
        Ok(Some(ModuleName(project.name().to_string())))
    }
}

/// Fails for one project and reports the task count everywhere else.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TaskCountBuilder {
    pub(crate) broken_project: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct TaskCount(pub(crate) usize);

impl Transferable for TaskCountBuilder {
    const TYPE_TAG: &'static str = "ext.TaskCountBuilder";
}

impl Transferable for TaskCount {
    const TYPE_TAG: &'static str = "ext.TaskCount";
}

impl ProjectInfoBuilder for TaskCountBuilder {
    type Info = TaskCount;

    fn name(&self) -> String {
        "task-count".to_string()
    }

    fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<TaskCount>, BoxError> {
        if project.path().as_str() == self.broken_project {
            return Err(format!("cannot count tasks of {}", self.broken_project).into());
        }
        Ok(Some(TaskCount(project.tasks()?.len())))
    }
}

/// Has nothing to say about any project.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SilentBuilder;

impl Transferable for SilentBuilder {
    const TYPE_TAG: &'static str = "ext.SilentBuilder";
}

impl ProjectInfoBuilder for SilentBuilder {
    type Info = ModuleName;

    fn project_info(&self, _project: &dyn ProjectHandle) -> Result<Option<ModuleName>, BoxError> {
        Ok(None)
    }
}

/// Cannot be serialized, so it never leaves the IDE.
#[derive(Debug, Deserialize)]
pub(crate) struct UnshippableBuilder;

impl Serialize for UnshippableBuilder {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("holds a live IDE handle"))
    }
}

impl Transferable for UnshippableBuilder {
    const TYPE_TAG: &'static str = "ext.UnshippableBuilder";
}

impl ProjectInfoBuilder for UnshippableBuilder {
    type Info = ModuleName;

    fn project_info(&self, _project: &dyn ProjectHandle) -> Result<Option<ModuleName>, BoxError> {
        Ok(None)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GradleVersionBuilder;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradleVersion(pub(crate) String);

impl Transferable for GradleVersionBuilder {
    const TYPE_TAG: &'static str = "ext.GradleVersionBuilder";
}

impl Transferable for GradleVersion {
    const TYPE_TAG: &'static str = "ext.GradleVersion";
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
    const TYPE_TAG: &'static str = "ext.PanickingBuildBuilder";
}

impl BuildInfoBuilder for PanickingBuildBuilder {
    type Info = GradleVersion;

    fn build_info(&self, _build: &dyn BuildHandle) -> Result<Option<GradleVersion>, BoxError> {
        panic!("extension bug")
    }
}

/// A built-in model returned by the daemon itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IdeaModule {
    pub(crate) source_dirs: Vec<String>,
}

impl Transferable for IdeaModule {
    const TYPE_TAG: &'static str = "org.gradle.tooling.model.idea.IdeaModule";
}

pub(crate) fn idea_module() -> ToolingModel {
    ToolingModel::new(IdeaModule::TYPE_TAG)
}

pub(crate) fn extension_classpath() -> ClassPath {
    ClassPath::new([EXTENSION_JAR])
}

/// What the daemon can load from the init script classpath.
pub(crate) fn daemon_catalog() -> BuilderCatalog {
    BuilderCatalog::new()
        .with_project::<ModuleNameBuilder>()
        .with_project::<TaskCountBuilder>()
        .with_project::<SilentBuilder>()
        .with_project::<UnshippableBuilder>()
        .with_build::<GradleVersionBuilder>()
        .with_build::<PanickingBuildBuilder>()
}

/// What the IDE can load for a classpath.
pub(crate) fn ide_catalog(classpath: &ClassPath) -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    if classpath.contains(EXTENSION_JAR) {
        catalog
            .register::<ModuleName>()
            .register::<TaskCount>()
            .register::<GradleVersion>();
    }
    catalog.register::<IdeaModule>();
    catalog
}

// --- the evaluated build ---

#[derive(Debug, Clone)]
pub(crate) struct FakeProject {
    path: ProjectPath,
    dir: PathBuf,
    build_dir: PathBuf,
    tasks: Vec<String>,
}

impl FakeProject {
    pub(crate) fn new(path: &str, tasks: &[&str]) -> Self {
        let path = ProjectPath::parse(path).unwrap();
        let dir = path
            .segments()
            .fold(PathBuf::from("/work/shop"), |dir, segment| dir.join(segment));
        Self {
            build_dir: dir.join("build"),
            dir,
            path,
            tasks: tasks.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ProjectHandle for FakeProject {
    fn path(&self) -> &ProjectPath {
        &self.path
    }

    fn name(&self) -> &str {
        if self.path.is_root() { "shop" } else { self.path.name() }
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
        ProjectId::new("com.shop", self.name(), "2.1")
    }

    fn tasks(&self) -> Result<Vec<GradleTaskId>, BoxError> {
        Ok(self
            .tasks
            .iter()
            .map(|name| GradleTaskId::new(self.path.clone(), name.as_str()))
            .collect())
    }

    fn property(&self, _name: &str) -> Option<String> {
        None
    }
}

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

    /// `:`, `:api`, `:app` and `:app:ui`.
    pub(crate) fn shop() -> Self {
        Self::new(vec![
            FakeProject::new(":", &["help"]),
            FakeProject::new(":api", &["compileJava", "test"]),
            FakeProject::new(":app", &["compileJava", "test", "run"]),
            FakeProject::new(":app:ui", &["compileKotlin"]),
        ])
    }

    fn descriptor(&self, path: &ProjectPath) -> Option<BasicGradleProject> {
        let project = self.projects.get(path)?;
        Some(BasicGradleProject {
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
        })
    }
}

impl BuildHandle for FakeBuild {
    fn root_project_dir(&self) -> &Path {
        Path::new("/work/shop")
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

// --- the daemon ---

#[derive(Debug, Clone)]
pub(crate) enum DaemonFailure {
    /// The build scripts do not compile.
    Evaluation(String),
    /// The daemon reports a default project other than the one the project
    /// info model was built for.
    DefaultPathMismatch(String),
    /// The connection drops before the action runs.
    Disconnected,
}

/// Files the daemon found while running an action.
#[derive(Debug, Clone)]
pub(crate) struct SeenFiles {
    pub(crate) init_script: PathBuf,
    pub(crate) input_file: PathBuf,
    pub(crate) script: String,
}

pub(crate) struct FakeDaemon {
    build: FakeBuild,
    default_project: ProjectPath,
    tooling_models: HashMap<(ProjectPath, String), TransferValue>,
    failure: Option<DaemonFailure>,
    seen: Mutex<Vec<SeenFiles>>,
}

impl FakeDaemon {
    pub(crate) fn new(build: FakeBuild, default_project: &str) -> Self {
        Self {
            build,
            default_project: ProjectPath::parse(default_project).unwrap(),
            tooling_models: HashMap::new(),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_tooling_model(
        mut self,
        project: &str,
        model: &ToolingModel,
        value: TransferValue,
    ) -> Self {
        let path = ProjectPath::parse(project).unwrap();
        self.tooling_models.insert((path, model.name().to_string()), value);
        self
    }

    pub(crate) fn failing(mut self, failure: DaemonFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub(crate) fn seen(&self) -> Vec<SeenFiles> {
        self.seen.lock().unwrap().clone()
    }

    fn load_input(
        &self,
        operation: &BuildOperation,
    ) -> Result<ProjectInfoModelBuilder, ConnectionError> {
        let init_script = operation
            .init_script()
            .ok_or_else(|| ConnectionError::Unavailable {
                message: "no init script".into(),
            })?
            .to_path_buf();
        let script = std::fs::read_to_string(&init_script)?;
        let input_file = input_file_of(&script).ok_or_else(|| ConnectionError::Unavailable {
            message: "init script does not name an input file".into(),
        })?;
        let data = std::fs::read(&input_file)?;

        self.seen.lock().unwrap().push(SeenFiles {
            init_script,
            input_file,
            script,
        });
        ProjectInfoModelBuilder::from_bytes(Bytes::from(data), &daemon_catalog())
            .map_err(|err| ConnectionError::Action(Box::new(err)))
    }
}

#[async_trait]
impl ToolingConnection for FakeDaemon {
    async fn run_build_action(
        &self,
        operation: &BuildOperation,
        action: Bytes,
    ) -> Result<Bytes, ConnectionError> {
        let model_builder = self.load_input(operation)?;
        if matches!(self.failure, Some(DaemonFailure::Disconnected)) {
            return Err(ConnectionError::Unavailable {
                message: "daemon disappeared".into(),
            });
        }

        let action = ModelFetcherBuildAction::from_bytes(action, daemon_catalog())
            .map_err(|err| ConnectionError::Action(Box::new(err)))?;
        let controller = FakeController {
            daemon: self,
            model_builder,
        };
        action
            .execute_to_bytes(&controller)
            .map_err(|err| ConnectionError::Action(Box::new(err)))
    }
}

/// Reads the input file path back out of the generated init script.
fn input_file_of(script: &str) -> Option<PathBuf> {
    const PREFIX: &str = "def inputFile = new File('";
    let line = script.lines().find(|line| line.starts_with(PREFIX))?;
    let literal = line.strip_prefix(PREFIX)?.strip_suffix("')")?;

    let mut path = String::new();
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            path.push(chars.next()?);
        } else {
            path.push(c);
        }
    }
    Some(PathBuf::from(path))
}

struct FakeController<'a> {
    daemon: &'a FakeDaemon,
    model_builder: ProjectInfoModelBuilder,
}

impl BuildController for FakeController<'_> {
    fn build_model(&self) -> Result<GradleBuild, BoxError> {
        if let Some(DaemonFailure::Evaluation(message)) = &self.daemon.failure {
            return Err(message.clone().into());
        }
        let build = &self.daemon.build;
        let projects = build
            .order
            .iter()
            .filter_map(|path| build.descriptor(path))
            .collect();
        Ok(GradleBuild {
            root_project: ProjectPath::root(),
            projects,
        })
    }

    fn default_project(&self) -> Result<BasicGradleProject, BoxError> {
        let mut descriptor = self
            .daemon
            .build
            .descriptor(&self.daemon.default_project)
            .ok_or("default project is not part of the build")?;
        if let Some(DaemonFailure::DefaultPathMismatch(path)) = &self.daemon.failure {
            descriptor.path = ProjectPath::parse(path)?;
        }
        Ok(descriptor)
    }

    fn build_handle(&self) -> &dyn BuildHandle {
        &self.daemon.build
    }

    fn find_model(
        &self,
        target: Option<&BasicGradleProject>,
        model: &ToolingModel,
    ) -> Result<Option<TransferValue>, BoxError> {
        let path = target.map_or_else(|| self.daemon.default_project.clone(), |t| t.path.clone());
        if model == &ToolingModel::project_info() {
            let project = self.daemon.build.project(&path).ok_or("unknown project")?;
            return Ok(Some(self.model_builder.build_model(project)?));
        }
        Ok(self
            .daemon
            .tooling_models
            .get(&(path, model.name().to_string()))
            .cloned())
    }
}
