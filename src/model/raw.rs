use std::{
    collections::{BTreeMap, HashMap},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use quick_xml::de::from_reader;
use serde::{Deserialize, Serialize};

use crate::model::{
    coordinates::{GroupArtifact, GroupArtifactVersion},
    repository::MavenRepository,
    ParseError,
};

/// A POM exactly as written, before inheritance, interpolation or profile merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub parent: Option<RawParent>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub dependency_management: Vec<RawDependency>,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    #[serde(default)]
    pub repositories: Vec<RawRepository>,
    #[serde(default)]
    pub licenses: Vec<RawLicense>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Timestamped version this POM was fetched under, for snapshots.
    #[serde(skip)]
    pub(crate) snapshot_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependency {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub scope: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub classifier: Option<String>,
    pub optional: Option<String>,
    #[serde(default)]
    pub exclusions: Vec<GroupArtifact>,
}

impl RawDependency {
    pub fn is_optional(&self) -> bool {
        self.optional
            .as_deref()
            .is_some_and(|optional| optional.eq_ignore_ascii_case("true"))
    }

    fn same_artifact(&self, other: &RawDependency) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.type_ == other.type_
            && self.classifier == other.classifier
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepository {
    pub id: String,
    pub url: String,
    pub releases: bool,
    pub snapshots: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLicense {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<String>,
    #[serde(default)]
    pub activation: ProfileActivation,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub dependency_management: Vec<RawDependency>,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    #[serde(default)]
    pub repositories: Vec<RawRepository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileActivation {
    #[serde(default)]
    pub active_by_default: bool,
    pub property: Option<PropertyActivation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyActivation {
    pub name: String,
    pub value: Option<String>,
}

/// Inputs that decide which profiles of a POM are active.
#[derive(Debug, Clone, Copy)]
pub struct ProfileContext<'a> {
    /// Profile ids requested by the user. `!id` deactivates a profile.
    pub active_profiles: &'a [String],
    pub system_properties: &'a HashMap<String, String>,
}

impl PropertyActivation {
    fn is_active(&self, properties: &HashMap<String, String>) -> bool {
        if let Some(name) = self.name.strip_prefix('!') {
            return !properties.contains_key(name);
        }
        let actual = properties.get(&self.name);
        match self.value.as_deref() {
            None => actual.is_some(),
            Some(value) => match value.strip_prefix('!') {
                Some(negated) => actual.map(String::as_str) != Some(negated),
                None => actual.map(String::as_str) == Some(value),
            },
        }
    }
}

impl Profile {
    fn is_deactivated(&self, context: &ProfileContext) -> bool {
        self.id.as_ref().is_some_and(|id| {
            context
                .active_profiles
                .iter()
                .any(|requested| requested.strip_prefix('!') == Some(id.as_str()))
        })
    }

    fn is_explicitly_active(&self, context: &ProfileContext) -> bool {
        if self.is_deactivated(context) {
            return false;
        }
        let requested = self
            .id
            .as_ref()
            .is_some_and(|id| context.active_profiles.contains(id));
        requested
            || self
                .activation
                .property
                .as_ref()
                .is_some_and(|property| property.is_active(context.system_properties))
    }
}

impl RawPom {
    pub fn parse(bytes: &[u8], snapshot_version: Option<String>) -> Result<RawPom, ParseError> {
        let project: ProjectXml = from_reader(bytes)?;
        let mut pom = RawPom::from(project);
        pom.snapshot_version = snapshot_version;
        Ok(pom)
    }

    pub fn snapshot_version(&self) -> Option<&str> {
        self.snapshot_version.as_deref()
    }

    pub fn with_snapshot_version(mut self, snapshot_version: Option<String>) -> Self {
        self.snapshot_version = snapshot_version;
        self
    }

    pub fn packaging(&self) -> &str {
        self.packaging.as_deref().unwrap_or("jar")
    }

    /// Active profiles. Profiles marked `activeByDefault` only apply when no other profile
    /// of this POM is active.
    pub fn active_profiles(&self, context: &ProfileContext) -> Vec<&Profile> {
        let active = self
            .profiles
            .iter()
            .filter(|profile| profile.is_explicitly_active(context))
            .collect::<Vec<_>>();
        if !active.is_empty() {
            return active;
        }
        self.profiles
            .iter()
            .filter(|profile| profile.activation.active_by_default && !profile.is_deactivated(context))
            .collect()
    }

    pub fn active_properties(&self, context: &ProfileContext) -> HashMap<String, String> {
        let mut properties = self
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<HashMap<_, _>>();
        for profile in self.active_profiles(context) {
            properties.extend(
                profile
                    .properties
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }
        properties
    }

    /// Declared dependencies, with active profile entries replacing same-artifact base entries.
    pub fn active_dependencies(&self, context: &ProfileContext) -> Vec<RawDependency> {
        let mut dependencies = self.dependencies.clone();
        for profile in self.active_profiles(context) {
            for dependency in &profile.dependencies {
                match dependencies
                    .iter_mut()
                    .find(|existing| existing.same_artifact(dependency))
                {
                    Some(existing) => *existing = dependency.clone(),
                    None => dependencies.push(dependency.clone()),
                }
            }
        }
        dependencies
    }

    pub fn active_dependency_management(&self, context: &ProfileContext) -> Vec<RawDependency> {
        let mut managed = self.dependency_management.clone();
        for profile in self.active_profiles(context) {
            managed.extend(profile.dependency_management.iter().cloned());
        }
        managed
    }

    pub fn active_repositories(&self, context: &ProfileContext) -> Vec<RawRepository> {
        let mut repositories = self.repositories.clone();
        for profile in self.active_profiles(context) {
            repositories.extend(profile.repositories.iter().cloned());
        }
        repositories
    }
}

/// A parsed POM together with where it came from.
#[derive(Debug, Clone)]
pub struct RawMaven {
    pub source_path: PathBuf,
    pub repository: Option<MavenRepository>,
    pub pom: RawPom,
}

impl PartialEq for RawMaven {
    fn eq(&self, other: &Self) -> bool {
        self.source_path == other.source_path
    }
}

impl Eq for RawMaven {}

impl Hash for RawMaven {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_path.hash(state);
    }
}

impl RawMaven {
    pub fn new(source_path: impl Into<PathBuf>, repository: Option<MavenRepository>, pom: RawPom) -> Self {
        Self {
            source_path: source_path.into(),
            repository,
            pom,
        }
    }

    pub fn parse(
        bytes: &[u8],
        source_path: impl Into<PathBuf>,
        repository: Option<MavenRepository>,
        snapshot_version: Option<String>,
    ) -> Result<Self, ParseError> {
        let source_path = source_path.into();
        let pom = RawPom::parse(bytes, snapshot_version)?;
        if pom.artifact_id.is_none() {
            return Err(ParseError::MissingElement(
                "artifactId",
                source_path.display().to_string(),
            ));
        }
        Ok(Self::new(source_path, repository, pom))
    }

    /// Reads a project POM from disk.
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes, path, None, None)
    }

    /// Coordinates with group and version inherited from the parent declaration when absent.
    pub fn gav(&self) -> GroupArtifactVersion {
        let parent = self.pom.parent.as_ref();
        GroupArtifactVersion {
            group_id: self
                .pom
                .group_id
                .clone()
                .or_else(|| parent.map(|parent| parent.group_id.clone())),
            artifact_id: self.pom.artifact_id.clone(),
            version: self
                .pom
                .version
                .clone()
                .or_else(|| parent.map(|parent| parent.version.clone())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    name: Option<String>,
    parent: Option<ParentXml>,
    #[serde(default)]
    properties: Option<BTreeMap<String, String>>,
    #[serde(default)]
    dependency_management: Option<DependencyManagementXml>,
    #[serde(default)]
    dependencies: Option<DependenciesXml>,
    #[serde(default)]
    repositories: Option<RepositoriesXml>,
    #[serde(default)]
    licenses: Option<LicensesXml>,
    #[serde(default)]
    profiles: Option<ProfilesXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentXml {
    group_id: String,
    artifact_id: String,
    version: String,
    relative_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DependencyManagementXml {
    #[serde(default)]
    dependencies: Option<DependenciesXml>,
}

#[derive(Debug, Default, Deserialize)]
struct DependenciesXml {
    #[serde(default, rename = "dependency")]
    items: Vec<DependencyXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
    classifier: Option<String>,
    optional: Option<String>,
    #[serde(default)]
    exclusions: Option<ExclusionsXml>,
}

#[derive(Debug, Default, Deserialize)]
struct ExclusionsXml {
    #[serde(default, rename = "exclusion")]
    items: Vec<ExclusionXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoriesXml {
    #[serde(default, rename = "repository")]
    items: Vec<RepositoryXml>,
}

#[derive(Debug, Deserialize)]
struct RepositoryXml {
    id: Option<String>,
    url: Option<String>,
    releases: Option<RepositoryPolicyXml>,
    snapshots: Option<RepositoryPolicyXml>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPolicyXml {
    enabled: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LicensesXml {
    #[serde(default, rename = "license")]
    items: Vec<LicenseXml>,
}

#[derive(Debug, Deserialize)]
struct LicenseXml {
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilesXml {
    #[serde(default, rename = "profile")]
    items: Vec<ProfileXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileXml {
    id: Option<String>,
    activation: Option<ActivationXml>,
    #[serde(default)]
    properties: Option<BTreeMap<String, String>>,
    #[serde(default)]
    dependency_management: Option<DependencyManagementXml>,
    #[serde(default)]
    dependencies: Option<DependenciesXml>,
    #[serde(default)]
    repositories: Option<RepositoriesXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivationXml {
    active_by_default: Option<String>,
    property: Option<PropertyActivationXml>,
}

#[derive(Debug, Deserialize)]
struct PropertyActivationXml {
    name: Option<String>,
    value: Option<String>,
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn is_enabled(policy: Option<RepositoryPolicyXml>) -> bool {
    policy
        .and_then(|policy| text(policy.enabled))
        .map_or(true, |enabled| enabled.eq_ignore_ascii_case("true"))
}

fn properties(properties: Option<BTreeMap<String, String>>) -> BTreeMap<String, String> {
    properties
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.trim().to_owned()))
        .collect()
}

fn dependencies(dependencies: Option<DependenciesXml>) -> Vec<RawDependency> {
    dependencies
        .unwrap_or_default()
        .items
        .into_iter()
        .map(RawDependency::from)
        .collect()
}

fn managed_dependencies(management: Option<DependencyManagementXml>) -> Vec<RawDependency> {
    dependencies(management.and_then(|management| management.dependencies))
}

fn repositories(repositories: Option<RepositoriesXml>) -> Vec<RawRepository> {
    repositories
        .unwrap_or_default()
        .items
        .into_iter()
        .filter_map(|repository| {
            Some(RawRepository {
                url: text(repository.url)?,
                id: text(repository.id).unwrap_or_else(|| "unknown".to_owned()),
                releases: is_enabled(repository.releases),
                snapshots: is_enabled(repository.snapshots),
            })
        })
        .collect()
}

impl From<DependencyXml> for RawDependency {
    fn from(dependency: DependencyXml) -> Self {
        Self {
            group_id: text(dependency.group_id),
            artifact_id: text(dependency.artifact_id),
            version: text(dependency.version),
            scope: text(dependency.scope),
            type_: text(dependency.type_),
            classifier: text(dependency.classifier),
            optional: text(dependency.optional),
            exclusions: dependency
                .exclusions
                .unwrap_or_default()
                .items
                .into_iter()
                .map(|exclusion| {
                    GroupArtifact::new(
                        text(exclusion.group_id).unwrap_or_else(|| "*".to_owned()),
                        text(exclusion.artifact_id).unwrap_or_else(|| "*".to_owned()),
                    )
                })
                .collect(),
        }
    }
}

impl From<ProfileXml> for Profile {
    fn from(profile: ProfileXml) -> Self {
        let activation = profile
            .activation
            .map(|activation| ProfileActivation {
                active_by_default: text(activation.active_by_default)
                    .is_some_and(|value| value.eq_ignore_ascii_case("true")),
                property: activation.property.and_then(|property| {
                    Some(PropertyActivation {
                        name: text(property.name)?,
                        value: text(property.value),
                    })
                }),
            })
            .unwrap_or_default();
        Self {
            id: text(profile.id),
            activation,
            properties: properties(profile.properties),
            dependency_management: managed_dependencies(profile.dependency_management),
            dependencies: dependencies(profile.dependencies),
            repositories: repositories(profile.repositories),
        }
    }
}

impl From<ProjectXml> for RawPom {
    fn from(project: ProjectXml) -> Self {
        Self {
            group_id: text(project.group_id),
            artifact_id: text(project.artifact_id),
            version: text(project.version),
            packaging: text(project.packaging),
            name: text(project.name),
            parent: project.parent.map(|parent| RawParent {
                group_id: parent.group_id.trim().to_owned(),
                artifact_id: parent.artifact_id.trim().to_owned(),
                version: parent.version.trim().to_owned(),
                relative_path: text(parent.relative_path),
            }),
            properties: properties(project.properties),
            dependency_management: managed_dependencies(project.dependency_management),
            dependencies: dependencies(project.dependencies),
            repositories: repositories(project.repositories),
            licenses: project
                .licenses
                .unwrap_or_default()
                .items
                .into_iter()
                .map(|license| RawLicense {
                    name: text(license.name),
                    url: text(license.url),
                })
                .collect(),
            profiles: project
                .profiles
                .unwrap_or_default()
                .items
                .into_iter()
                .map(Profile::from)
                .collect(),
            snapshot_version: None,
        }
    }
}
