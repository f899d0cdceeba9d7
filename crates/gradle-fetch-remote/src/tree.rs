//! Reconstruction of the project hierarchy.
//!
//! Topology comes from the Tooling API descriptors, identity from the
//! per-project custom model. Children are built before their parent and every
//! node is memoized by path, so the result does not depend on the order in
//! which projects were evaluated.

use std::collections::{HashMap, HashSet};

use gradle_fetch_core::{
    FetchError, GenericProjectProperties, GradleProjectTree, ProjectPath, Result,
};

use crate::controller::GradleBuild;
use crate::project_info::BasicProjectInfo;

/// All assembled subtrees, addressable by project path.
#[derive(Debug, Clone, Default)]
pub struct ProjectForest {
    nodes: Vec<GradleProjectTree>,
    by_path: HashMap<ProjectPath, usize>,
    root: Option<usize>,
}

impl ProjectForest {
    /// The subtree rooted at `path`.
    pub fn tree(&self, path: &ProjectPath) -> Option<&GradleProjectTree> {
        self.by_path.get(path).map(|&index| &self.nodes[index])
    }

    pub fn root(&self) -> Option<&GradleProjectTree> {
        self.root.map(|index| &self.nodes[index])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds a [`ProjectForest`] for one evaluated build.
pub struct ProjectTreeAssembler<'a> {
    build: &'a GradleBuild,
    infos: &'a HashMap<ProjectPath, BasicProjectInfo>,
    forest: ProjectForest,
    in_progress: HashSet<ProjectPath>,
}

impl<'a> ProjectTreeAssembler<'a> {
    pub fn new(build: &'a GradleBuild, infos: &'a HashMap<ProjectPath, BasicProjectInfo>) -> Self {
        Self {
            build,
            infos,
            forest: ProjectForest::default(),
            in_progress: HashSet::new(),
        }
    }

    /// Assembles the tree from the root project, then every project not
    /// reachable from it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Consistency`] when a project has no custom info,
    /// a descriptor names an unknown child, or the descriptors form a cycle.
    pub fn assemble(mut self) -> Result<ProjectForest> {
        let root = self.node(&self.build.root_project)?;
        self.forest.root = Some(root);

        for project in &self.build.projects {
            self.node(&project.path)?;
        }

        tracing::debug!("assembled {} project tree nodes", self.forest.len());
        Ok(self.forest)
    }

    fn node(&mut self, path: &ProjectPath) -> Result<usize> {
        if let Some(&index) = self.forest.by_path.get(path) {
            return Ok(index);
        }
        if !self.in_progress.insert(path.clone()) {
            return Err(FetchError::consistency(format!(
                "project {path} is its own ancestor"
            )));
        }

        let descriptor = self.build.project(path).ok_or_else(|| {
            FetchError::consistency(format!("project {path} is not part of the build"))
        })?;

        let mut children = Vec::with_capacity(descriptor.children.len());
        for child in &descriptor.children {
            let index = self.node(child)?;
            children.push(self.forest.nodes[index].clone());
        }

        let info = self.infos.get(path).ok_or_else(|| {
            FetchError::consistency(format!("missing custom info for project {path}"))
        })?;

        let properties = GenericProjectProperties {
            project_name: descriptor.name.clone(),
            project_path: path.clone(),
            project_dir: descriptor.project_dir.clone(),
            project_id: info.project_id.clone(),
            build_script: info.build_script.clone(),
            build_dir: info.build_dir.clone(),
        };
        let tree = GradleProjectTree::new(properties, info.tasks.clone(), children);

        self.in_progress.remove(path);
        let index = self.forest.nodes.len();
        self.forest.nodes.push(tree);
        self.forest.by_path.insert(path.clone(), index);
        Ok(index)
    }
}
