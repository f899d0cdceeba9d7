//! Queries contributed by IDE extensions.
//!
//! A query pairs a builder with the classpath its results are decoded with.

use std::sync::Arc;

use gradle_fetch_core::{
    BuildInfoBuilder, ClassPath, EncodedValue, ErasedBuildInfoBuilder,
    ErasedProjectInfoBuilder, ProjectInfoBuilder, Result,
};

/// Common view of build-level and project-level queries.
pub trait InfoQuery {
    fn classpath(&self) -> &ClassPath;

    fn builder_name(&self) -> String;

    /// Serializes the builder for shipping into the daemon.
    fn encode_builder(&self) -> Result<EncodedValue>;
}

/// Asks one question about the whole build.
#[derive(Debug, Clone)]
pub struct GradleBuildInfoQuery {
    builder: Arc<dyn ErasedBuildInfoBuilder>,
    classpath: ClassPath,
}

impl GradleBuildInfoQuery {
    pub fn new<B: BuildInfoBuilder>(builder: B, classpath: ClassPath) -> Self {
        Self {
            builder: Arc::new(builder),
            classpath,
        }
    }

    pub fn builder(&self) -> &dyn ErasedBuildInfoBuilder {
        self.builder.as_ref()
    }
}

impl InfoQuery for GradleBuildInfoQuery {
    fn classpath(&self) -> &ClassPath {
        &self.classpath
    }

    fn builder_name(&self) -> String {
        self.builder.builder_name()
    }

    fn encode_builder(&self) -> Result<EncodedValue> {
        self.builder.to_encoded()
    }
}

/// Asks one question about every project of the build.
#[derive(Debug, Clone)]
pub struct GradleProjectInfoQuery {
    builder: Arc<dyn ErasedProjectInfoBuilder>,
    classpath: ClassPath,
}

impl GradleProjectInfoQuery {
    pub fn new<B: ProjectInfoBuilder>(builder: B, classpath: ClassPath) -> Self {
        Self {
            builder: Arc::new(builder),
            classpath,
        }
    }

    pub fn builder(&self) -> &dyn ErasedProjectInfoBuilder {
        self.builder.as_ref()
    }
}

impl InfoQuery for GradleProjectInfoQuery {
    fn classpath(&self) -> &ClassPath {
        &self.classpath
    }

    fn builder_name(&self) -> String {
        self.builder.builder_name()
    }

    fn encode_builder(&self) -> Result<EncodedValue> {
        self.builder.to_encoded()
    }
}
