//! Model builders and the live handles they run against.
//!
//! Builders are written on the IDE side, shipped to the daemon as
//! [`Transferable`] values and invoked there. A builder returns `Ok(None)`
//! when it has nothing to say about a target; that is not a failure.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use crate::issue::{BuilderIssue, TransferableIssue};
use crate::project::{GradleTaskId, ProjectId, ProjectPath};
use crate::value::{Encodable, TransferValue, Transferable};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Live view of the evaluated build, available inside the daemon.
pub trait BuildHandle {
    fn root_project_dir(&self) -> &Path;

    fn gradle_version(&self) -> &str;

    fn project_paths(&self) -> Vec<ProjectPath>;

    fn project(&self, path: &ProjectPath) -> Option<&dyn ProjectHandle>;
}

/// Live view of one evaluated project, available inside the daemon.
pub trait ProjectHandle {
    fn path(&self) -> &ProjectPath;

    fn name(&self) -> &str;

    fn project_dir(&self) -> &Path;

    fn build_dir(&self) -> &Path;

    fn build_script(&self) -> Option<&Path>;

    fn project_id(&self) -> ProjectId;

    /// Declared tasks. Realizing tasks may fail for a broken project.
    fn tasks(&self) -> Result<Vec<GradleTaskId>, BoxError>;

    fn property(&self, name: &str) -> Option<String>;
}

/// Extracts one fact about the whole build. Invoked once per fetch.
pub trait BuildInfoBuilder: Transferable {
    type Info: Transferable;

    /// Name reported with failures of this builder.
    fn name(&self) -> String {
        Self::TYPE_TAG.to_string()
    }

    fn build_info(&self, build: &dyn BuildHandle) -> Result<Option<Self::Info>, BoxError>;
}

/// Extracts one fact about a project. Invoked once per project.
pub trait ProjectInfoBuilder: Transferable {
    type Info: Transferable;

    /// Name reported with failures of this builder.
    fn name(&self) -> String {
        Self::TYPE_TAG.to_string()
    }

    fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<Self::Info>, BoxError>;
}

/// Object-safe form of [`BuildInfoBuilder`].
pub trait ErasedBuildInfoBuilder: Encodable + fmt::Debug + Send + Sync {
    fn builder_name(&self) -> String;

    fn invoke(&self, build: &dyn BuildHandle) -> Result<Option<TransferValue>, BoxError>;
}

impl<B: BuildInfoBuilder> ErasedBuildInfoBuilder for B {
    fn builder_name(&self) -> String {
        BuildInfoBuilder::name(self)
    }

    fn invoke(&self, build: &dyn BuildHandle) -> Result<Option<TransferValue>, BoxError> {
        Ok(self.build_info(build)?.map(TransferValue::new))
    }
}

/// Object-safe form of [`ProjectInfoBuilder`].
pub trait ErasedProjectInfoBuilder: Encodable + fmt::Debug + Send + Sync {
    fn builder_name(&self) -> String;

    fn invoke(&self, project: &dyn ProjectHandle) -> Result<Option<TransferValue>, BoxError>;
}

impl<B: ProjectInfoBuilder> ErasedProjectInfoBuilder for B {
    fn builder_name(&self) -> String {
        ProjectInfoBuilder::name(self)
    }

    fn invoke(&self, project: &dyn ProjectHandle) -> Result<Option<TransferValue>, BoxError> {
        Ok(self.project_info(project)?.map(TransferValue::new))
    }
}

/// Runs a builder invocation so that neither an error nor a panic escapes.
///
/// Both are reported as a [`BuilderIssue`] carrying `name`.
pub fn invoke_guarded<F>(name: &str, invocation: F) -> Result<Option<TransferValue>, BuilderIssue>
where
    F: FnOnce() -> Result<Option<TransferValue>, BoxError>,
{
    match catch_unwind(AssertUnwindSafe(invocation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!("Builder '{}' failed: {}", name, err);
            Err(BuilderIssue::new(name, TransferableIssue::from_error(&*err)))
        }
        Err(payload) => {
            let issue = TransferableIssue::from_panic(&*payload);
            tracing::warn!("Builder '{}' panicked: {}", name, issue);
            Err(BuilderIssue::new(name, issue))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    #[derive(Debug, Serialize, Deserialize)]
    struct ProjectName;

    #[derive(Debug, Serialize, Deserialize)]
    struct Name(String);

    impl Transferable for ProjectName {
        const TYPE_TAG: &'static str = "test.ProjectNameBuilder";
    }

    impl Transferable for Name {
        const TYPE_TAG: &'static str = "test.Name";
    }

    impl ProjectInfoBuilder for ProjectName {
        type Info = Name;

        fn project_info(&self, project: &dyn ProjectHandle) -> Result<Option<Name>, BoxError> {
            Ok(Some(Name(project.name().to_string())))
        }
    }

    struct Project {
        path: ProjectPath,
        dir: PathBuf,
    }

    impl ProjectHandle for Project {
        fn path(&self) -> &ProjectPath {
            &self.path
        }

        fn name(&self) -> &str {
            self.path.name()
        }

        fn project_dir(&self) -> &Path {
            &self.dir
        }

        fn build_dir(&self) -> &Path {
            &self.dir
        }

        fn build_script(&self) -> Option<&Path> {
            None
        }

        fn project_id(&self) -> ProjectId {
            ProjectId::default()
        }

        fn tasks(&self) -> Result<Vec<GradleTaskId>, BoxError> {
            Ok(vec![])
        }

        fn property(&self, _name: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_erased_builder_wraps_value() {
        let project = Project {
            path: ProjectPath::parse(":app").unwrap(),
            dir: PathBuf::from("/work/app"),
        };
        let builder: &dyn ErasedProjectInfoBuilder = &ProjectName;
        assert_eq!(builder.builder_name(), "test.ProjectNameBuilder");
        let value = builder.invoke(&project).unwrap().unwrap();
        assert_eq!(value.downcast_ref::<Name>().unwrap().0, "app");
    }

    #[test]
    fn test_invoke_guarded_passes_values_through() {
        let result = invoke_guarded("ok", || Ok(Some(TransferValue::new(Name("x".into())))));
        assert!(result.unwrap().is_some());

        let result = invoke_guarded("none", || Ok(None));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_invoke_guarded_captures_error() {
        let issue = invoke_guarded("failing", || Err("plugin not applied".into())).unwrap_err();
        assert_eq!(issue.name(), "failing");
        assert_eq!(issue.issue().message(), "plugin not applied");
    }

    #[test]
    fn test_invoke_guarded_captures_panic() {
        let issue = invoke_guarded("panicking", || panic!("index out of range")).unwrap_err();
        assert_eq!(issue.name(), "panicking");
        assert_eq!(issue.issue().type_name(), "panic");
        assert_eq!(issue.issue().message(), "index out of range");
    }
}
