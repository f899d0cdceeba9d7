//! Payloads shipped from the IDE into the daemon.

use bytes::Bytes;

use gradle_fetch_core::wire::{WireReader, WireWriter};
use gradle_fetch_core::{CustomSerializedMap, Result};

use crate::controller::ToolingModel;

const INPUT_MAGIC: &[u8; 4] = b"GFQI";
const REQUEST_MAGIC: &[u8; 4] = b"GFAR";

/// Contents of the model input file read by the project info model builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelQueryInput {
    pub project_info_builders: CustomSerializedMap,
}

impl ModelQueryInput {
    pub fn new(project_info_builders: CustomSerializedMap) -> Self {
        Self {
            project_info_builders,
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = WireWriter::new(INPUT_MAGIC);
        self.project_info_builders.write_to(&mut writer)?;
        Ok(writer.finish())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut reader = WireReader::new(data, INPUT_MAGIC)?;
        let project_info_builders = CustomSerializedMap::read_from(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            project_info_builders,
        })
    }
}

/// The serialized build action: build-level builders plus the Tooling
/// models to look up for every project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchActionRequest {
    pub build_info_builders: CustomSerializedMap,
    pub tooling_models: Vec<ToolingModel>,
}

impl FetchActionRequest {
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = WireWriter::new(REQUEST_MAGIC);
        self.build_info_builders.write_to(&mut writer)?;
        writer.put_len(self.tooling_models.len())?;
        for model in &self.tooling_models {
            writer.put_str(model.name())?;
        }
        Ok(writer.finish())
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut reader = WireReader::new(data, REQUEST_MAGIC)?;
        let build_info_builders = CustomSerializedMap::read_from(&mut reader)?;
        let count = reader.get_len()?;
        let mut tooling_models = Vec::new();
        for _ in 0..count {
            tooling_models.push(ToolingModel::new(reader.get_str()?));
        }
        reader.finish()?;
        Ok(Self {
            build_info_builders,
            tooling_models,
        })
    }
}
