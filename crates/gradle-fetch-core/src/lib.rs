//! Core protocol types for fetching Gradle models across the daemon boundary.
//!
//! Shared by the daemon-side build action (`gradle-fetch-remote`) and the
//! IDE-side fetcher (`gradle-fetch`):
//! - [`TransferValue`] / [`EncodedValue`]: type-erased values and their wire form
//! - [`TypeCatalog`]: decodes values by type tag for one classpath
//! - [`CustomSerializedMap`]: per-entry serialized values with isolated failures
//! - [`BuilderResult`] / [`BuilderIssue`]: uniform per-builder outcomes
//! - [`GradleProjectTree`]: the project hierarchy keyed by [`ProjectPath`]

pub mod builder;
pub mod catalog;
pub mod envelope;
pub mod error;
pub mod issue;
pub mod project;
pub mod value;
pub mod wire;

pub use builder::{
    BoxError, BuildHandle, BuildInfoBuilder, ErasedBuildInfoBuilder, ErasedProjectInfoBuilder,
    ProjectHandle, ProjectInfoBuilder, invoke_guarded,
};
pub use catalog::{CatalogCache, CatalogProvider, ClassPath, SharedValueCache, TypeCatalog};
pub use envelope::{
    CatalogResolver, CustomSerializedMap, CustomSerializedMapBuilder, EntryKey, IssueTransformer,
    SerializedEntries,
};
pub use error::{FetchError, Result};
pub use issue::{BuilderIssue, BuilderResult, TransferableIssue};
pub use project::{
    GenericProjectProperties, GradleProjectTree, GradleTaskId, ProjectId, ProjectPath,
};
pub use value::{Encodable, EncodedValue, TransferValue, Transferable};
