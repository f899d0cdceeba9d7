//! Project identity and the project tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FetchError, Result};

/// Colon-separated Gradle project path. The root project is `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath(String);

impl ProjectPath {
    pub const SEPARATOR: char = ':';

    pub fn root() -> Self {
        Self(":".to_string())
    }

    /// Parses a path such as `:`, `:app` or `:libs:core`.
    pub fn parse(path: &str) -> Result<Self> {
        if !path.starts_with(Self::SEPARATOR) {
            return Err(FetchError::consistency(format!(
                "project path '{path}' must start with ':'"
            )));
        }
        if path.len() > 1 && path[1..].split(Self::SEPARATOR).any(str::is_empty) {
            return Err(FetchError::consistency(format!(
                "project path '{path}' contains an empty segment"
            )));
        }
        Ok(Self(path.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last segment; empty for the root project.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(Self::SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(index) => Some(Self(self.0[..index].to_string())),
        }
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self(format!(":{name}"))
        } else {
            Self(format!("{}:{name}", self.0))
        }
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectPath {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = FetchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.0
    }
}

/// Maven-style coordinates of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ProjectId {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

/// A task declared by a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradleTaskId {
    project_path: ProjectPath,
    name: String,
}

impl GradleTaskId {
    pub fn new(project_path: ProjectPath, name: impl Into<String>) -> Self {
        Self {
            project_path,
            name: name.into(),
        }
    }

    pub fn project_path(&self) -> &ProjectPath {
        &self.project_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified task path, e.g. `:app:compileJava` or `:build`.
    pub fn full_name(&self) -> String {
        self.project_path.child(&self.name).0
    }
}

/// Identity of one project node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericProjectProperties {
    /// Short name, e.g. `core` for `:libs:core`.
    pub project_name: String,
    pub project_path: ProjectPath,
    pub project_dir: PathBuf,
    pub project_id: ProjectId,
    pub build_script: Option<PathBuf>,
    pub build_dir: PathBuf,
}

/// A project with its declared tasks and child projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradleProjectTree {
    properties: GenericProjectProperties,
    tasks: Vec<GradleTaskId>,
    children: Vec<GradleProjectTree>,
}

impl GradleProjectTree {
    pub fn new(
        properties: GenericProjectProperties,
        tasks: Vec<GradleTaskId>,
        children: Vec<Self>,
    ) -> Self {
        Self {
            properties,
            tasks,
            children,
        }
    }

    pub fn properties(&self) -> &GenericProjectProperties {
        &self.properties
    }

    pub fn path(&self) -> &ProjectPath {
        &self.properties.project_path
    }

    pub fn project_dir(&self) -> &Path {
        &self.properties.project_dir
    }

    pub fn tasks(&self) -> &[GradleTaskId] {
        &self.tasks
    }

    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Finds the node for `path` in this subtree.
    pub fn find(&self, path: &ProjectPath) -> Option<&Self> {
        if self.path() == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Pre-order iteration over this node and all descendants.
    pub fn walk(&self) -> Vec<&Self> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.iter().rev());
        }
        nodes
    }
}
