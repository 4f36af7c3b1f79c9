//! Turns raw POMs into an immutable [`Pom`] graph.
//!
//! Tasks are processed breadth first so every request for an artifact made closer to
//! the root is registered before deeper ones are looked at. Once the queue is drained
//! the graph is assembled bottom up, moving edges to the version conflict resolution
//! settled on.

mod partial;
mod placeholder;
mod task;


use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    downloader::{DownloadError, MavenPomDownloader},
    model::{
        pom::DefinedDependency,
        raw::{ProfileContext, RawDependency},
        Dependency, GroupArtifact, GroupArtifactVersion, License, ManagedDependency,
        MavenRepository, Pom, RawMaven, Scope,
    },
    version::{ResolutionStrategy, VersionRequirement},
};

use self::{
    partial::{DependencyEdge, PartialMaven},
    task::ResolutionTask,
};

pub use placeholder::PlaceholderError;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0} is missing group, artifact or version")]
    MissingCoordinates(String),
    #[error("Cyclic parent chain {}", format_chain(.0))]
    CyclicParent(Vec<GroupArtifactVersion>),
    #[error("Cyclic BOM import {}", format_chain(.0))]
    CyclicImport(Vec<GroupArtifactVersion>),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("{error} in {location}")]
    Property {
        location: String,
        error: PlaceholderError,
    },
    #[error("No available version of {0} satisfies {1}")]
    Unsatisfiable(GroupArtifact, String),
    #[error("Dependency {0} in {1} has no version")]
    MissingVersion(GroupArtifact, String),
    #[error("Invalid exclusion {0}: {1}")]
    InvalidExclusion(GroupArtifact, regex_lite::Error),
}

fn format_chain(chain: &[GroupArtifactVersion]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type ErrorSink = Arc<dyn Fn(&ResolveError) + Send + Sync>;

#[derive(Clone)]
pub struct ResolverOptions {
    /// Profile ids to activate, `!id` to deactivate.
    pub active_profiles: Vec<String>,
    pub strategy: ResolutionStrategy,
    /// Follow optional dependencies of transitive dependencies too.
    pub resolve_optional: bool,
    pub system_properties: HashMap<String, String>,
    pub on_error: ErrorSink,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            active_profiles: Vec::new(),
            strategy: ResolutionStrategy::default(),
            resolve_optional: false,
            system_properties: HashMap::new(),
            on_error: Arc::new(|error| warn!("{}", error)),
        }
    }
}

type NestedKey = (GroupArtifactVersion, BTreeMap<String, String>);

pub struct RawMavenResolver {
    downloader: Arc<MavenPomDownloader>,
    options: ResolverOptions,
    queue: VecDeque<ResolutionTask>,
    partial_results: HashMap<ResolutionTask, PartialMaven>,
    version_selection: HashMap<Scope, HashMap<GroupArtifact, VersionRequirement>>,
    resolved: HashMap<ResolutionTask, Arc<Pom>>,
    /// Parents and imported BOMs, by coordinates and the properties they were resolved with.
    nested: HashMap<NestedKey, Option<Arc<Pom>>>,
    /// Parents and BOMs that enclosing resolvers are in the middle of resolving.
    resolving: Vec<GroupArtifactVersion>,
}

impl RawMavenResolver {
    pub fn new(downloader: Arc<MavenPomDownloader>, options: ResolverOptions) -> Self {
        Self {
            downloader,
            options,
            queue: VecDeque::new(),
            partial_results: HashMap::new(),
            version_selection: HashMap::new(),
            resolved: HashMap::new(),
            nested: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Resolves `root` and everything it depends on. Problems below the root are reported
    /// to `on_error` and the affected branch is left out.
    pub fn resolve(&mut self, root: Arc<RawMaven>) -> Result<Arc<Pom>, ResolveError> {
        self.resolve_with(root, HashMap::new(), Vec::new(), Vec::new())
    }

    fn resolve_with(
        &mut self,
        root: Arc<RawMaven>,
        effective_properties: HashMap<String, String>,
        repositories: Vec<MavenRepository>,
        seen_parents: Vec<GroupArtifactVersion>,
    ) -> Result<Arc<Pom>, ResolveError> {
        if !root.gav().is_complete() {
            return Err(ResolveError::MissingCoordinates(
                root.source_path.display().to_string(),
            ));
        }
        debug!("Resolving {}", root.gav());
        let task = ResolutionTask::root(root, effective_properties, repositories, seen_parents);
        self.queue.push_back(task.clone());
        self.drain();
        self.assemble(&task, &mut Vec::new()).ok_or_else(|| {
            ResolveError::MissingCoordinates(task.raw_maven.source_path.display().to_string())
        })
    }

    fn drain(&mut self) {
        while let Some(task) = self.queue.pop_front() {
            if self.partial_results.contains_key(&task) {
                continue;
            }
            let partial = self.process(&task);
            self.partial_results.insert(task, partial);
        }
    }

    fn process(&mut self, task: &ResolutionTask) -> PartialMaven {
        let raw = task.raw_maven.clone();
        trace!("Processing {} at depth {}", raw.gav(), task.depth);
        let active_profiles = self.options.active_profiles.clone();
        let system_properties = self.options.system_properties.clone();
        let context = ProfileContext {
            active_profiles: &active_profiles,
            system_properties: &system_properties,
        };
        let mut partial = PartialMaven::new(
            raw.clone(),
            raw.pom.active_properties(&context),
            task.effective_properties.clone(),
        );
        partial.coordinates = self.coordinates(&partial);

        let own_repositories = raw
            .pom
            .active_repositories(&context)
            .into_iter()
            .filter_map(|repository| {
                let repository = MavenRepository {
                    releases: repository.releases,
                    snapshots: repository.snapshots,
                    ..MavenRepository::new(
                        self.substitute(&partial, &repository.id)?,
                        self.substitute(&partial, &repository.url)?,
                    )
                };
                let settings = self.downloader.settings();
                Some(settings.apply_credentials(&settings.apply_mirrors(&repository)))
            })
            .collect::<Vec<_>>();
        partial.add_repositories(own_repositories);
        partial.add_repositories(task.repositories.iter().cloned());

        if let Some(parent) = &raw.pom.parent {
            let gav = GroupArtifactVersion {
                group_id: self.substitute(&partial, &parent.group_id),
                artifact_id: self.substitute(&partial, &parent.artifact_id),
                version: self.substitute(&partial, &parent.version),
            };
            partial.parent = self.resolve_parent(task, &partial, gav, parent.relative_path.as_deref());
            if let Some(parent) = partial.parent.clone() {
                partial.add_repositories(parent.repositories.iter().cloned());
            }
        }

        for managed in raw.pom.active_dependency_management(&context) {
            if let Some(managed) = self.managed_dependency(task, &partial, &managed) {
                partial.dependency_management.dependencies.push(managed);
            }
        }

        partial.licenses = raw
            .pom
            .licenses
            .iter()
            .filter_map(|license| {
                Some(License {
                    name: self.substitute(&partial, license.name.as_deref()?)?,
                    url: license
                        .url
                        .as_deref()
                        .and_then(|url| self.substitute(&partial, url)),
                })
            })
            .collect();
        if partial.licenses.is_empty() {
            if let Some(parent) = &partial.parent {
                partial.licenses = parent.licenses.clone();
            }
        }

        for dependency in raw.pom.active_dependencies(&context) {
            if let Some(edge) = self.dependency(task, &partial, &dependency) {
                self.queue.push_back(edge.task.clone());
                partial.dependencies.push(edge);
            }
        }

        if let Some(parent) = partial.parent.clone() {
            let overridden = partial
                .dependencies
                .iter()
                .map(|edge| edge.group_artifact.clone())
                .collect::<HashSet<_>>();
            for dependency in &parent.dependencies {
                let group_artifact = dependency.group_artifact();
                if overridden.contains(&group_artifact) {
                    continue;
                }
                if let Some(scope) = dependency.scope.transitive_of(task.scope) {
                    self.register(scope, group_artifact, dependency.version(), task.depth);
                }
            }
        }

        partial
    }

    /// Coordinates with placeholders expanded, falling back to the literal values.
    fn coordinates(&self, partial: &PartialMaven) -> GroupArtifactVersion {
        let literal = partial.raw_maven.gav();
        let expand = |value: Option<String>| {
            let value = value?;
            if value.contains("${") {
                self.substitute(partial, &value).or(Some(value))
            } else {
                Some(value)
            }
        };
        GroupArtifactVersion {
            group_id: expand(literal.group_id),
            artifact_id: expand(literal.artifact_id),
            version: expand(literal.version),
        }
    }

    fn resolve_parent(
        &mut self,
        task: &ResolutionTask,
        partial: &PartialMaven,
        gav: GroupArtifactVersion,
        relative_path: Option<&str>,
    ) -> Option<Arc<Pom>> {
        if let Some(chain) = self.cycle(task, &gav) {
            self.report(ResolveError::CyclicParent(chain));
            return None;
        }
        let properties = partial.properties_for_parent();
        self.resolve_nested(task, partial, gav, relative_path, properties)
    }

    fn resolve_nested(
        &mut self,
        task: &ResolutionTask,
        partial: &PartialMaven,
        gav: GroupArtifactVersion,
        relative_path: Option<&str>,
        properties: HashMap<String, String>,
    ) -> Option<Arc<Pom>> {
        let key = (gav.clone(), properties.clone().into_iter().collect::<BTreeMap<_, _>>());
        if let Some(memoized) = self.nested.get(&key) {
            return memoized.clone();
        }

        let resolved = match self.downloader.download(
            &gav,
            relative_path,
            Some(&partial.raw_maven),
            &partial.repositories,
        ) {
            Ok(raw) => {
                let mut seen_parents = task.seen_parents.clone();
                seen_parents.push(gav.clone());
                let mut nested = RawMavenResolver::new(self.downloader.clone(), self.options.clone());
                nested.resolving = self.resolving.clone();
                nested.resolving.push(gav.clone());
                nested
                    .resolve_with(raw, properties, partial.repositories.clone(), seen_parents)
                    .map_err(|error| self.report(error))
                    .ok()
            }
            Err(error) => {
                self.report(error.into());
                None
            }
        };
        self.nested.insert(key, resolved.clone());
        resolved
    }

    /// The chain leading back to `gav` when it is already being resolved as a parent or BOM,
    /// either along this task's parent chain or by an enclosing resolver.
    fn cycle(&self, task: &ResolutionTask, gav: &GroupArtifactVersion) -> Option<Vec<GroupArtifactVersion>> {
        let mut chain = if task.seen_parents.contains(gav) {
            task.seen_parents.clone()
        } else if self.resolving.contains(gav) {
            let mut chain = self.resolving.clone();
            chain.extend(task.seen_parents.iter().cloned());
            chain
        } else {
            return None;
        };
        chain.push(gav.clone());
        Some(chain)
    }

    fn managed_dependency(
        &mut self,
        task: &ResolutionTask,
        partial: &PartialMaven,
        managed: &RawDependency,
    ) -> Option<ManagedDependency> {
        let group_artifact = GroupArtifact::new(
            self.substitute(partial, managed.group_id.as_deref()?)?,
            self.substitute(partial, managed.artifact_id.as_deref()?)?,
        );
        let Some(requested_version) = managed.version.clone() else {
            self.report(ResolveError::MissingVersion(
                group_artifact,
                partial.raw_maven.source_path.display().to_string(),
            ));
            return None;
        };
        let version = self.substitute_version(partial, &requested_version)?;
        let scope = managed
            .scope
            .as_deref()
            .map(|scope| Scope::from_name(Some(scope)));

        if scope == Some(Scope::Import) {
            let gav = GroupArtifactVersion::new(
                group_artifact.group_id.clone(),
                group_artifact.artifact_id.clone(),
                version,
            );
            if let Some(chain) = self.cycle(task, &gav) {
                self.report(ResolveError::CyclicImport(chain));
                return None;
            }
            let bom = self.resolve_nested(task, partial, gav, None, HashMap::new())?;
            return Some(ManagedDependency::Imported {
                group_artifact,
                requested_version,
                bom,
            });
        }

        Some(ManagedDependency::Defined(DefinedDependency {
            group_artifact,
            version,
            requested_version,
            scope,
            classifier: self.substitute_optional(partial, managed.classifier.as_deref()),
            type_: self.substitute_optional(partial, managed.type_.as_deref()),
            exclusions: managed.exclusions.clone(),
        }))
    }

    fn dependency(
        &mut self,
        task: &ResolutionTask,
        partial: &PartialMaven,
        dependency: &RawDependency,
    ) -> Option<DependencyEdge> {
        let group_artifact = GroupArtifact::new(
            self.substitute(partial, dependency.group_id.as_deref()?)?,
            self.substitute(partial, dependency.artifact_id.as_deref()?)?,
        );
        if self.is_excluded(task, &group_artifact) {
            return None;
        }
        if dependency.is_optional() && task.depth > 0 && !self.options.resolve_optional {
            trace!("Skipping optional {} of {}", group_artifact, partial.coordinates);
            return None;
        }

        let managed = partial.find_managed(&group_artifact).cloned();
        let requested = dependency
            .version
            .clone()
            .or_else(|| managed.as_ref().map(|managed| managed.version.clone()));
        let Some(requested) = requested else {
            self.report(ResolveError::MissingVersion(
                group_artifact,
                partial.raw_maven.source_path.display().to_string(),
            ));
            return None;
        };
        let requested = self.substitute_version(partial, &requested)?;

        let declared_scope = dependency
            .scope
            .as_deref()
            .map(|scope| Scope::from_name(Some(scope)));
        let scope = declared_scope
            .or_else(|| managed.as_ref().and_then(|managed| managed.scope))
            .unwrap_or(Scope::Compile);
        let scope = scope.transitive_of(task.scope)?;
        if matches!(scope, Scope::System | Scope::Import | Scope::Invalid) {
            debug!("Not following {} in {} scope", group_artifact, scope);
            return None;
        }

        self.register(scope, group_artifact.clone(), &requested, task.depth);
        let Some(version) = self.selected_version(scope, &group_artifact, &partial.repositories) else {
            self.report(ResolveError::Unsatisfiable(group_artifact, requested));
            return None;
        };

        let gav = GroupArtifactVersion::new(
            group_artifact.group_id.clone(),
            group_artifact.artifact_id.clone(),
            version.clone(),
        );
        let raw = match self.downloader.download(&gav, None, Some(&partial.raw_maven), &partial.repositories) {
            Ok(raw) => raw,
            Err(error) => {
                self.report(error.into());
                return None;
            }
        };

        let mut exclusions = task.exclusions.clone();
        exclusions.extend(dependency.exclusions.iter().cloned());
        if let Some(managed) = &managed {
            exclusions.extend(managed.exclusions.iter().cloned());
        }
        let classifier = dependency
            .classifier
            .as_deref()
            .or_else(|| managed.as_ref()?.classifier.as_deref());
        let type_ = dependency
            .type_
            .as_deref()
            .or_else(|| managed.as_ref()?.type_.as_deref());

        Some(DependencyEdge {
            group_artifact,
            version,
            exclusions: dependency.exclusions.clone(),
            task: ResolutionTask {
                scope,
                raw_maven: raw,
                exclusions,
                optional: dependency.is_optional(),
                classifier: self.substitute_optional(partial, classifier),
                type_: self.substitute_optional(partial, type_),
                requested_version: Some(requested),
                depth: task.depth + 1,
                effective_properties: HashMap::new(),
                repositories: partial.repositories.clone(),
                seen_parents: vec![gav],
            },
        })
    }

    fn is_excluded(&self, task: &ResolutionTask, group_artifact: &GroupArtifact) -> bool {
        for exclusion in &task.exclusions {
            match exclusion.matches(&group_artifact.group_id, &group_artifact.artifact_id) {
                Ok(true) => {
                    trace!("{} is excluded by {}", group_artifact, exclusion);
                    return true;
                }
                Ok(false) => {}
                Err(error) => {
                    self.report(ResolveError::InvalidExclusion(exclusion.clone(), error));
                    return true;
                }
            }
        }
        false
    }

    fn register(&mut self, scope: Scope, group_artifact: GroupArtifact, requested: &str, depth: usize) {
        let selections = self.version_selection.entry(scope).or_default();
        let requirement = match selections.remove(&group_artifact) {
            Some(existing) => existing.add_requirement(requested),
            None => VersionRequirement::from_version(requested, self.options.strategy, depth),
        };
        selections.insert(group_artifact, requirement);
    }

    fn selected_version(
        &self,
        scope: Scope,
        group_artifact: &GroupArtifact,
        repositories: &[MavenRepository],
    ) -> Option<String> {
        self.version_selection
            .get(&scope)?
            .get(group_artifact)?
            .resolve(|| self.available_versions(group_artifact, repositories))
    }

    fn available_versions(&self, group_artifact: &GroupArtifact, repositories: &[MavenRepository]) -> Vec<String> {
        let gav = GroupArtifactVersion::without_version(
            group_artifact.group_id.clone(),
            group_artifact.artifact_id.clone(),
        );
        match self.downloader.download_metadata(&gav, repositories) {
            Ok(metadata) => metadata.sorted_versions(),
            Err(error) => {
                debug!("No versions available for {}: {}", group_artifact, error);
                Vec::new()
            }
        }
    }

    fn assemble(&mut self, task: &ResolutionTask, stack: &mut Vec<ResolutionTask>) -> Option<Arc<Pom>> {
        if let Some(pom) = self.resolved.get(task) {
            return Some(pom.clone());
        }
        if stack.contains(task) {
            debug!("Dependency cycle through {}", task.raw_maven.gav());
            return None;
        }
        if !self.partial_results.contains_key(task) {
            self.process_on_demand(task.clone());
        }
        let (edges, parent, repositories) = {
            let partial = self.partial_results.get(task)?;
            (
                partial.dependencies.clone(),
                partial.parent.clone(),
                partial.repositories.clone(),
            )
        };

        stack.push(task.clone());
        let mut dependencies = Vec::new();
        for edge in &edges {
            let target = self.reconcile(&edge.task, &edge.group_artifact, &edge.version, &repositories);
            if let Some(model) = self.assemble(&target, stack) {
                dependencies.push(Dependency {
                    repository: model.repository.clone(),
                    scope: target.scope,
                    classifier: target.classifier.clone(),
                    type_: target.type_.clone(),
                    optional: target.optional,
                    requested_version: target.requested_version.clone(),
                    exclusions: edge.exclusions.clone(),
                    model,
                });
            }
        }

        if let Some(parent) = &parent {
            let overridden = edges
                .iter()
                .map(|edge| edge.group_artifact.clone())
                .collect::<HashSet<_>>();
            for inherited in &parent.dependencies {
                let group_artifact = inherited.group_artifact();
                if overridden.contains(&group_artifact) || self.is_excluded(task, &group_artifact) {
                    continue;
                }
                let Some(scope) = inherited.scope.transitive_of(task.scope) else {
                    continue;
                };
                let dependency = self
                    .inherited(task, inherited, scope, &repositories, stack)
                    .unwrap_or_else(|| Dependency {
                        scope,
                        ..inherited.clone()
                    });
                dependencies.push(dependency);
            }
        }
        stack.pop();

        let partial = self.partial_results.get(task)?;
        let raw = &partial.raw_maven;
        let coordinates = &partial.coordinates;
        let pom = Arc::new(Pom {
            source_path: raw.source_path.clone(),
            repository: raw.repository.clone(),
            group_id: coordinates.group_id.clone().unwrap_or_default(),
            artifact_id: coordinates.artifact_id.clone().unwrap_or_default(),
            version: coordinates.version.clone().unwrap_or_default(),
            dated_snapshot_version: raw.pom.snapshot_version().map(str::to_owned),
            packaging: raw.pom.packaging().to_owned(),
            name: raw.pom.name.clone(),
            parent,
            dependency_management: partial.dependency_management.clone(),
            licenses: partial.licenses.clone(),
            repositories,
            properties: partial.properties.clone(),
            dependencies,
        });
        self.resolved.insert(task.clone(), pom.clone());
        Some(pom)
    }

    /// An inherited dependency moved to the version selected for this graph, if it differs.
    fn inherited(
        &mut self,
        task: &ResolutionTask,
        inherited: &Dependency,
        scope: Scope,
        repositories: &[MavenRepository],
        stack: &mut Vec<ResolutionTask>,
    ) -> Option<Dependency> {
        let group_artifact = inherited.group_artifact();
        let version = self.selected_version(scope, &group_artifact, repositories)?;
        if version == inherited.version() {
            return None;
        }
        debug!(
            "Inherited {} of {} moves from {} to {}",
            group_artifact,
            task.raw_maven.gav(),
            inherited.version(),
            version
        );
        let raw = self.download_version(&group_artifact, &version, task, repositories)?;
        let target = ResolutionTask {
            scope,
            raw_maven: raw.clone(),
            exclusions: task
                .exclusions
                .iter()
                .chain(&inherited.exclusions)
                .cloned()
                .collect(),
            optional: inherited.optional,
            classifier: inherited.classifier.clone(),
            type_: inherited.type_.clone(),
            requested_version: inherited.requested_version.clone(),
            depth: task.depth + 1,
            effective_properties: HashMap::new(),
            repositories: repositories.to_vec(),
            seen_parents: vec![raw.gav()],
        };
        let model = self.assemble(&target, stack)?;
        Some(Dependency {
            repository: model.repository.clone(),
            scope,
            model,
            ..inherited.clone()
        })
    }

    /// The task of `edge` pointed at the version conflict resolution settled on.
    fn reconcile(
        &mut self,
        edge: &ResolutionTask,
        group_artifact: &GroupArtifact,
        version: &str,
        repositories: &[MavenRepository],
    ) -> ResolutionTask {
        let Some(selected) = self.selected_version(edge.scope, group_artifact, repositories) else {
            return edge.clone();
        };
        if selected == version {
            return edge.clone();
        }
        debug!("{} moves from {} to {}", group_artifact, version, selected);
        match self.download_version(group_artifact, &selected, edge, repositories) {
            Some(raw) => edge.retarget(raw),
            None => edge.clone(),
        }
    }

    fn download_version(
        &self,
        group_artifact: &GroupArtifact,
        version: &str,
        task: &ResolutionTask,
        repositories: &[MavenRepository],
    ) -> Option<Arc<RawMaven>> {
        let gav = GroupArtifactVersion::new(
            group_artifact.group_id.clone(),
            group_artifact.artifact_id.clone(),
            version,
        );
        self.downloader
            .download(&gav, None, Some(&task.raw_maven), repositories)
            .map_err(|error| self.report(error.into()))
            .ok()
    }

    fn process_on_demand(&mut self, task: ResolutionTask) {
        trace!("Processing {} on demand", task.raw_maven.gav());
        self.queue.push_back(task);
        self.drain();
    }

    fn substitute(&self, partial: &PartialMaven, text: &str) -> Option<String> {
        match partial.substitute(text, &self.options.system_properties) {
            Ok(value) => Some(value),
            Err(error) => {
                self.report(ResolveError::Property {
                    location: partial.raw_maven.source_path.display().to_string(),
                    error,
                });
                None
            }
        }
    }

    fn substitute_optional(&self, partial: &PartialMaven, text: Option<&str>) -> Option<String> {
        self.substitute(partial, text?)
    }

    /// Versions may point at a property whose value is itself a property, up to three levels.
    fn substitute_version(&self, partial: &PartialMaven, requested: &str) -> Option<String> {
        let mut version = requested.to_owned();
        for _ in 0..3 {
            if !version.contains("${") {
                break;
            }
            version = self.substitute(partial, &version)?;
        }
        Some(version)
    }

    fn report(&self, error: ResolveError) {
        (self.options.on_error)(&error);
    }
}
