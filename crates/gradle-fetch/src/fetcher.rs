//! IDE-side driver of a model fetch.

use bytes::Bytes;
use std::hash::Hash;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use gradle_fetch_core::CatalogProvider;
use gradle_fetch_remote::{
    ActionFetchedModelsOrError, FetchActionRequest, ModelQueryInput, ToolingModel,
};

use crate::config::FetchConfig;
use crate::connection::{BuildOperation, OperationInitializer, ToolingConnection};
use crate::error::{ModelFetchError, Result};
use crate::init_script::render_init_script;
use crate::models::FetchedModelsOrError;
use crate::query::{GradleBuildInfoQuery, GradleProjectInfoQuery};
use crate::query_map::GradleInfoQueryMap;
use crate::rehydrate::ResultRehydrator;

/// Collects queries and runs them against a Gradle build in one round trip.
///
/// `KB` and `KP` are the caller's keys for build-level and project-level
/// queries. Several queries may share a key; their results come back as one
/// list in registration order.
///
/// # Examples
///
/// ```no_run
/// # async fn example(
/// #     connection: &dyn gradle_fetch::ToolingConnection,
/// #     query: gradle_fetch::GradleProjectInfoQuery,
/// # ) -> gradle_fetch::Result<()> {
/// use gradle_fetch::{FetchConfig, GenericModelFetcher};
/// use gradle_fetch_core::{ClassPath, TypeCatalog};
///
/// let mut fetcher = GenericModelFetcher::<&str, &str>::new();
/// fetcher.add_project_queries("java", vec![query]);
///
/// let catalogs = |_: &ClassPath| TypeCatalog::new();
/// let initializer = |_: &mut gradle_fetch::BuildOperation| {};
/// let outcome = fetcher
///     .fetch_models(connection, &initializer, &catalogs, &FetchConfig::default())
///     .await?;
/// if let Some(models) = outcome.models() {
///     for project in models.all_project_models() {
///         let results = project.project_info_results(&"java");
///         println!("{}: {} results", project.project_path(), results.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GenericModelFetcher<KB, KP> {
    build_queries: Vec<(KB, Vec<GradleBuildInfoQuery>)>,
    project_queries: Vec<(KP, Vec<GradleProjectInfoQuery>)>,
    tooling_models: Vec<ToolingModel>,
}

impl<KB, KP> Default for GenericModelFetcher<KB, KP> {
    fn default() -> Self {
        Self {
            build_queries: Vec::new(),
            project_queries: Vec::new(),
            tooling_models: Vec::new(),
        }
    }
}

impl<KB, KP> GenericModelFetcher<KB, KP>
where
    KB: Clone + Eq + Hash,
    KP: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build_queries(
        &mut self,
        key: KB,
        queries: Vec<GradleBuildInfoQuery>,
    ) -> &mut Self {
        self.build_queries.push((key, queries));
        self
    }

    pub fn add_project_queries(
        &mut self,
        key: KP,
        queries: Vec<GradleProjectInfoQuery>,
    ) -> &mut Self {
        self.project_queries.push((key, queries));
        self
    }

    /// Requests a built-in Tooling API model for every project.
    pub fn add_tooling_model(&mut self, model: ToolingModel) -> &mut Self {
        if !self.tooling_models.contains(&model) {
            self.tooling_models.push(model);
        }
        self
    }

    /// Runs the fetch.
    ///
    /// Both temporary files are deleted before this returns, whether the
    /// connection succeeded or not.
    ///
    /// # Errors
    ///
    /// Fails when the temporary files cannot be written, the connection
    /// fails, or the daemon's reply cannot be read. Build script and daemon
    /// side failures are reported through [`FetchedModelsOrError`] instead.
    pub async fn fetch_models(
        &self,
        connection: &dyn ToolingConnection,
        initializer: &dyn OperationInitializer,
        catalogs: &dyn CatalogProvider,
        config: &FetchConfig,
    ) -> Result<FetchedModelsOrError<KB, KP>> {
        let build_map = GradleInfoQueryMap::from_queries(&self.build_queries);
        let project_map = GradleInfoQueryMap::from_queries(&self.project_queries);

        let input = ModelQueryInput::new(project_map.serialized_builders().clone());
        let input_file =
            write_temp_file(config, &config.input_file_prefix, ".bin", &input.to_bytes()?)?;
        tracing::debug!("wrote model input to {}", input_file.path().display());

        let script = render_init_script(&config.init_script_classpath, input_file.path());
        let init_script =
            write_temp_file(config, &config.init_script_prefix, ".gradle", script.as_bytes())?;

        let mut operation = BuildOperation::default();
        initializer.initialize(&mut operation);
        operation.add_arguments([
            "--init-script".to_string(),
            init_script.path().to_string_lossy().into_owned(),
        ]);

        let request = FetchActionRequest {
            build_info_builders: build_map.serialized_builders().clone(),
            tooling_models: self.tooling_models.clone(),
        };
        let action = request.to_bytes()?;

        tracing::debug!(
            "running build action with {} build and {} project builders",
            build_map.routing().len(),
            project_map.routing().len()
        );
        let response = connection.run_build_action(&operation, action).await;

        delete_temp_file(init_script);
        delete_temp_file(input_file);

        let outcome = ActionFetchedModelsOrError::from_bytes(response?)?;
        let mut rehydrator = ResultRehydrator::new(catalogs, config.default_classpath());
        Ok(rehydrator.rehydrate(outcome, &build_map, &project_map))
    }
}

fn write_temp_file(
    config: &FetchConfig,
    prefix: &str,
    suffix: &str,
    contents: &[u8],
) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(suffix);
    let mut file = match &config.temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ModelFetchError::TempFile)?;

    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

fn delete_temp_file(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(err) = file.close() {
        tracing::warn!("Failed to delete temporary file {}: {}", path.display(), err);
    }
}

/// Reads a file written by [`GenericModelFetcher::fetch_models`], for
/// daemon-side code that receives its path through the init script.
pub fn read_model_input(path: &Path) -> Result<ModelQueryInput> {
    let data = std::fs::read(path)?;
    Ok(ModelQueryInput::from_bytes(Bytes::from(data))?)
}
