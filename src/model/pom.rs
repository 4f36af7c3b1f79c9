use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::Arc,
};

use crate::model::{
    coordinates::{GroupArtifact, GroupArtifactVersion},
    repository::MavenRepository,
    scope::Scope,
};

/// A fully resolved POM. Dependencies share child `Pom`s, so the graph is a DAG.
#[derive(Debug, Clone)]
pub struct Pom {
    pub source_path: PathBuf,
    pub repository: Option<MavenRepository>,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub dated_snapshot_version: Option<String>,
    pub packaging: String,
    pub name: Option<String>,
    pub parent: Option<Arc<Pom>>,
    pub dependency_management: DependencyManagement,
    pub licenses: Vec<License>,
    pub repositories: Vec<MavenRepository>,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<Dependency>,
}

/// An edge of the resolved graph.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub repository: Option<MavenRepository>,
    pub scope: Scope,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub optional: bool,
    pub requested_version: Option<String>,
    pub exclusions: Vec<GroupArtifact>,
    pub model: Arc<Pom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyManagement {
    pub dependencies: Vec<ManagedDependency>,
}

#[derive(Debug, Clone)]
pub enum ManagedDependency {
    Defined(DefinedDependency),
    /// A BOM pulled in with `<scope>import</scope>`.
    Imported {
        group_artifact: GroupArtifact,
        requested_version: String,
        bom: Arc<Pom>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedDependency {
    pub group_artifact: GroupArtifact,
    pub version: String,
    pub requested_version: String,
    pub scope: Option<Scope>,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub exclusions: Vec<GroupArtifact>,
}

impl DependencyManagement {
    pub fn new(dependencies: Vec<ManagedDependency>) -> Self {
        Self { dependencies }
    }

    /// First matching entry, looking through imported BOMs in declaration order.
    pub fn find(&self, group_artifact: &GroupArtifact) -> Option<&DefinedDependency> {
        self.dependencies.iter().find_map(|managed| match managed {
            ManagedDependency::Defined(defined) if &defined.group_artifact == group_artifact => {
                Some(defined)
            }
            ManagedDependency::Defined(_) => None,
            ManagedDependency::Imported { bom, .. } => bom.find_managed(group_artifact),
        })
    }

    pub fn imported_boms(&self) -> impl Iterator<Item = &Arc<Pom>> {
        self.dependencies.iter().filter_map(|managed| match managed {
            ManagedDependency::Imported { bom, .. } => Some(bom),
            ManagedDependency::Defined(_) => None,
        })
    }
}

impl Dependency {
    pub fn group_artifact(&self) -> GroupArtifact {
        self.model.group_artifact()
    }

    pub fn version(&self) -> &str {
        &self.model.version
    }
}

impl Pom {
    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    pub fn gav(&self) -> GroupArtifactVersion {
        GroupArtifactVersion::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
        )
    }

    /// Managed entry from this POM, its imported BOMs, then its ancestors.
    pub fn find_managed(&self, group_artifact: &GroupArtifact) -> Option<&DefinedDependency> {
        self.dependency_management
            .find(group_artifact)
            .or_else(|| self.parent.as_ref()?.find_managed(group_artifact))
    }

    /// A property as seen from this POM: own properties first, then the parent chain.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .or_else(|| self.parent.as_ref()?.property(key))
    }

    /// Every reachable dependency, breadth first, keeping the first occurrence of each
    /// group and artifact.
    pub fn flatten_dependencies(&self) -> Vec<&Dependency> {
        let mut seen = HashSet::new();
        let mut flattened = Vec::new();
        let mut queue = self.dependencies.iter().collect::<VecDeque<_>>();
        while let Some(dependency) = queue.pop_front() {
            if !seen.insert(dependency.group_artifact()) {
                continue;
            }
            flattened.push(dependency);
            queue.extend(dependency.model.dependencies.iter());
        }
        flattened
    }
}
