//! Turns the daemon's payload back into typed results.
//!
//! Each builder's values are decoded with the catalog of the classpath its
//! query named. Catalogs and decoded values are shared within one pass only.

use std::collections::HashMap;
use std::hash::Hash;

use gradle_fetch_core::{
    BuilderIssue, BuilderResult, CatalogCache, CatalogProvider, ClassPath, CustomSerializedMap,
    EncodedValue, EntryKey, SharedValueCache, TransferValue, TransferableIssue,
};
use gradle_fetch_remote::{ActionFetchedModelsOrError, ActionFetchedProjectModels, ToolingModel};

use crate::models::{
    FetchedBuildModels, FetchedModels, FetchedModelsOrError, FetchedProjectModels,
};
use crate::query_map::GradleInfoQueryMap;

/// One rehydration pass.
pub struct ResultRehydrator<'a> {
    catalogs: CatalogCache<'a>,
    values: SharedValueCache,
    default_classpath: ClassPath,
}

impl<'a> ResultRehydrator<'a> {
    /// `default_classpath` is used for tooling models and for entries no
    /// query claims.
    pub fn new(provider: &'a dyn CatalogProvider, default_classpath: ClassPath) -> Self {
        Self {
            catalogs: CatalogCache::new(provider),
            values: SharedValueCache::new(),
            default_classpath,
        }
    }

    pub fn rehydrate<KB, KP>(
        &mut self,
        outcome: ActionFetchedModelsOrError,
        build_queries: &GradleInfoQueryMap<KB>,
        project_queries: &GradleInfoQueryMap<KP>,
    ) -> FetchedModelsOrError<KB, KP>
    where
        KB: Clone + Eq + Hash,
        KP: Clone + Eq + Hash,
    {
        let models = match outcome {
            ActionFetchedModelsOrError::Models(models) => *models,
            ActionFetchedModelsOrError::BuildScriptError(issue) => {
                tracing::warn!("Gradle build script evaluation failed: {}", issue);
                return FetchedModelsOrError::BuildScriptError(issue);
            }
            ActionFetchedModelsOrError::UnexpectedError(issue) => {
                tracing::warn!("Gradle model fetch failed: {}", issue);
                return FetchedModelsOrError::UnexpectedError(issue);
            }
        };

        let build_models =
            FetchedBuildModels::new(self.results(&models.build_info_results, build_queries));
        let default_project = self.project(models.default_project, project_queries);
        let other_projects = models
            .other_projects
            .into_iter()
            .map(|project| self.project(project, project_queries))
            .collect();

        tracing::debug!(
            "rehydrated results with {} type catalogs and {} shared values",
            self.catalogs.len(),
            self.values.len()
        );
        FetchedModelsOrError::Models(Box::new(FetchedModels::new(
            build_models,
            default_project,
            other_projects,
        )))
    }

    pub fn project<K: Clone + Eq + Hash>(
        &mut self,
        project: ActionFetchedProjectModels,
        queries: &GradleInfoQueryMap<K>,
    ) -> FetchedProjectModels<K> {
        let results = self.results(&project.project_info_results, queries);
        let tooling_models = self.tooling_models(&project.tooling_models);
        FetchedProjectModels::new(project.project_tree, results, tooling_models, project.issue)
    }

    /// Decodes `map` and regroups its entries by caller key.
    ///
    /// Every query registered under a key gets at least one result, in
    /// registration order; failures anywhere along the way become issue
    /// results for the affected query only.
    pub fn results<K: Clone + Eq + Hash>(
        &mut self,
        map: &CustomSerializedMap,
        queries: &GradleInfoQueryMap<K>,
    ) -> HashMap<K, Vec<BuilderResult>> {
        let routing = queries.routing();
        let catalogs = &mut self.catalogs;
        let default_classpath = &self.default_classpath;

        let mut resolver = |key: EntryKey| {
            let classpath = routing
                .slot(key)
                .map_or(default_classpath, |slot| &slot.classpath);
            catalogs.catalog(classpath)
        };
        let transformer = |key: EntryKey, issue: TransferableIssue| {
            let name = routing
                .slot(key)
                .map_or_else(|| key.to_string(), |slot| slot.builder_name.clone());
            vec![TransferValue::new(BuilderIssue::new(name, issue))]
        };
        let mut decoded = map.deserialize(&mut resolver, &mut self.values, &transformer);

        let mut results: HashMap<K, Vec<BuilderResult>> = routing
            .caller_keys()
            .iter()
            .map(|key| (key.clone(), Vec::new()))
            .collect();

        for (entry, slot) in routing.slots() {
            let slot_results = if let Some(values) = decoded.remove(&entry) {
                if values.is_empty() {
                    vec![BuilderResult::empty()]
                } else {
                    values.into_iter().map(BuilderResult::from_transferred).collect()
                }
            } else if let Some(issue) = queries.serialization_failure(entry) {
                vec![BuilderResult::failed(BuilderIssue::new(
                    slot.builder_name.clone(),
                    issue.clone(),
                ))]
            } else {
                tracing::warn!("No result for builder '{}' ({})", slot.builder_name, entry);
                let issue = TransferableIssue::new(
                    "missing result",
                    format!("builder '{}' produced no result", slot.builder_name),
                );
                vec![BuilderResult::failed(BuilderIssue::new(
                    slot.builder_name.clone(),
                    issue,
                ))]
            };
            results.entry(slot.key.clone()).or_default().extend(slot_results);
        }

        for entry in decoded.keys() {
            tracing::debug!("ignoring result for unregistered entry {}", entry);
        }
        results
    }

    /// Decodes tooling models through the default classpath catalog.
    ///
    /// A model that cannot be decoded is dropped.
    pub fn tooling_models(
        &mut self,
        models: &[(ToolingModel, EncodedValue)],
    ) -> HashMap<ToolingModel, TransferValue> {
        let catalog = self.catalogs.catalog(&self.default_classpath);
        let mut decoded = HashMap::new();
        for (model, encoded) in models {
            match self.values.decode(&catalog, encoded) {
                Ok(value) => {
                    decoded.insert(model.clone(), value);
                }
                Err(err) => tracing::warn!("Dropping tooling model {}: {}", model, err),
            }
        }
        decoded
    }
}
