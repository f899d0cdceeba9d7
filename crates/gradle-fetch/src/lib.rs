//! IDE-side Gradle model fetching.
//!
//! Register build-level and project-level queries on a
//! [`GenericModelFetcher`], then run them with one build action:
//!
//! 1. Project-level builders are written to a temporary input file that a
//!    generated init script hands to every project in the daemon.
//! 2. Build-level builders and the requested tooling models travel inside
//!    the build action itself.
//! 3. The daemon's reply is decoded per query classpath and grouped back
//!    under the caller's keys as [`FetchedModels`].
//!
//! A failing builder never fails the fetch. Its slot holds a
//! [`BuilderIssue`](gradle_fetch_core::BuilderIssue) instead.

pub mod config;
pub mod connection;
pub mod error;
pub mod fetcher;
pub mod init_script;
pub mod models;
pub mod query;
pub mod query_map;
pub mod rehydrate;

pub use config::FetchConfig;
pub use connection::{BuildOperation, OperationInitializer, ToolingConnection};
pub use error::{ConnectionError, ModelFetchError, Result};
pub use fetcher::{GenericModelFetcher, read_model_input};
pub use init_script::{escape_string_literal, render_init_script, safe_to_paste};
pub use models::{FetchedBuildModels, FetchedModels, FetchedModelsOrError, FetchedProjectModels};
pub use query::{GradleBuildInfoQuery, GradleProjectInfoQuery, InfoQuery};
pub use query_map::{GradleInfoQueryMap, QueryRouting, QuerySlot};
pub use rehydrate::ResultRehydrator;
