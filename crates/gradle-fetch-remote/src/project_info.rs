//! Companion model builder registered inside the daemon by the init script.
//!
//! For every project the build action asks about, [`ProjectInfoModelBuilder`]
//! reads the project's identity, runs all shipped project-level builders
//! against it and hands the result back as one opaque, already serialized
//! [`ModelQueryOutput`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use gradle_fetch_core::wire::{WireReader, WireWriter};
use gradle_fetch_core::{
    CustomSerializedMap, ErasedProjectInfoBuilder, GradleTaskId, ProjectHandle, ProjectId,
    ProjectPath, Result, TransferValue, Transferable, TransferableIssue, invoke_guarded,
};

use crate::builders::{BuilderCatalog, DecodedBuilders, decode_builders};
use crate::input::ModelQueryInput;

const OUTPUT_MAGIC: &[u8; 4] = b"GFQO";

/// Identity of a project as read inside the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicProjectInfo {
    pub project_path: ProjectPath,
    pub project_id: ProjectId,
    pub build_script: Option<PathBuf>,
    pub build_dir: PathBuf,
    pub tasks: Vec<GradleTaskId>,
}

/// Everything the daemon computed for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQueryOutput {
    pub basic_info: BasicProjectInfo,
    pub project_info_results: CustomSerializedMap,
    /// Set when part of the project could not be evaluated.
    pub issue: Option<TransferableIssue>,
}

impl ModelQueryOutput {
    pub fn project_path(&self) -> &ProjectPath {
        &self.basic_info.project_path
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = WireWriter::new(OUTPUT_MAGIC);
        writer.put_json(&self.basic_info)?;
        self.project_info_results.write_to(&mut writer)?;
        writer.put_bool(self.issue.is_some());
        if let Some(issue) = &self.issue {
            writer.put_json(issue)?;
        }
        Ok(writer.finish())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut reader = WireReader::new(data, OUTPUT_MAGIC)?;
        let basic_info = reader.get_json()?;
        let project_info_results = CustomSerializedMap::read_from(&mut reader)?;
        let issue = if reader.get_bool()? {
            Some(reader.get_json()?)
        } else {
            None
        };
        reader.finish()?;
        Ok(Self {
            basic_info,
            project_info_results,
            issue,
        })
    }
}

/// The model value handed out by the controller: a [`ModelQueryOutput`]
/// kept in serialized form so it crosses the model boundary untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelQueryOutputRef {
    serialized: Vec<u8>,
}

impl ModelQueryOutputRef {
    pub fn new(output: &ModelQueryOutput) -> Result<Self> {
        Ok(Self {
            serialized: output.to_bytes()?.to_vec(),
        })
    }

    pub fn output(&self) -> Result<ModelQueryOutput> {
        ModelQueryOutput::from_bytes(Bytes::copy_from_slice(&self.serialized))
    }
}

impl Transferable for ModelQueryOutputRef {
    const TYPE_TAG: &'static str = "gradle-fetch.ModelQueryOutput";
}

/// Runs the shipped project-level builders for one project at a time.
///
/// Builders are decoded once and reused for every project.
#[derive(Debug)]
pub struct ProjectInfoModelBuilder {
    builders: DecodedBuilders<dyn ErasedProjectInfoBuilder>,
}

impl ProjectInfoModelBuilder {
    pub fn new(input: &ModelQueryInput, catalog: &BuilderCatalog) -> Self {
        let builders = decode_builders(&input.project_info_builders, |encoded| {
            catalog.decode_project(encoded)
        });
        tracing::debug!(
            "loaded {} project info builders ({} unusable)",
            builders.builders.len(),
            builders.failures.len()
        );
        Self { builders }
    }

    /// Reads the model input file contents.
    pub fn from_bytes(data: Bytes, catalog: &BuilderCatalog) -> Result<Self> {
        let input = ModelQueryInput::from_bytes(data)?;
        Ok(Self::new(&input, catalog))
    }

    pub fn builder_count(&self) -> usize {
        self.builders.builders.len() + self.builders.failures.len()
    }

    pub fn build(&self, project: &dyn ProjectHandle) -> ModelQueryOutput {
        let (tasks, issue) = match project.tasks() {
            Ok(tasks) => (tasks, None),
            Err(err) => {
                tracing::warn!("Cannot read tasks of project {}: {}", project.path(), err);
                (Vec::new(), Some(TransferableIssue::from_error(&*err)))
            }
        };

        let basic_info = BasicProjectInfo {
            project_path: project.path().clone(),
            project_id: project.project_id(),
            build_script: project.build_script().map(PathBuf::from),
            build_dir: project.build_dir().to_path_buf(),
            tasks,
        };

        let mut results = CustomSerializedMap::builder();
        for (key, issue) in &self.builders.failures {
            results.add_failure(*key, issue.clone());
        }
        for (key, builder) in &self.builders.builders {
            let name = builder.builder_name();
            results.add_outcome(*key, invoke_guarded(&name, || builder.invoke(project)));
        }

        ModelQueryOutput {
            basic_info,
            project_info_results: results.create(),
            issue,
        }
    }

    /// [`build`](Self::build) wrapped as the value the controller returns.
    pub fn build_model(&self, project: &dyn ProjectHandle) -> Result<TransferValue> {
        let output = self.build(project);
        Ok(TransferValue::new(ModelQueryOutputRef::new(&output)?))
    }
}
