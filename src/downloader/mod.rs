//! Fetches POMs and `maven-metadata.xml` from local and remote repositories.

mod listener;
mod retry;

use std::{
    fmt::{Display, Formatter},
    path::Path,
    sync::Arc,
};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    cache::{CacheResult, MavenPomCache},
    http::{HttpError, HttpSender, Request},
    model::{
        GroupArtifactVersion, MavenMetadata, MavenRepository, MavenSettings, RawMaven, RawPom,
        ResolvedGroupArtifactVersion,
    },
    version::is_snapshot,
};

pub use listener::{NoopListener, ResolutionEventListener};
pub use retry::RetryPolicy;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Missing group, artifact or version in {0}")]
    MissingCoordinates(GroupArtifactVersion),
    #[error("Unable to download {gav}. Tried {}", format_attempts(.attempts))]
    Unavailable {
        gav: GroupArtifactVersion,
        attempts: Vec<RepositoryAttempt>,
    },
}

/// What happened when one repository was asked for an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAttempt {
    pub repository: String,
    pub outcome: String,
}

impl RepositoryAttempt {
    fn new(repository: &MavenRepository, outcome: impl Into<String>) -> Self {
        Self {
            repository: repository.uri.clone(),
            outcome: outcome.into(),
        }
    }
}

impl Display for RepositoryAttempt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.repository, self.outcome)
    }
}

fn format_attempts(attempts: &[RepositoryAttempt]) -> String {
    if attempts.is_empty() {
        return "no repositories".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
enum RequestError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl RequestError {
    /// 400 to 404 mean the artifact is not there and asking again will not help.
    fn is_client_side(&self) -> bool {
        matches!(self, RequestError::Status(code) if (400..=404).contains(code))
    }

    fn is_server_reached(&self) -> bool {
        matches!(self, RequestError::Status(_))
    }
}

pub struct MavenPomDownloader {
    http: Arc<dyn HttpSender>,
    cache: Arc<dyn MavenPomCache>,
    retry: RetryPolicy,
    settings: MavenSettings,
    active_profiles: Vec<String>,
    local_repository: Option<MavenRepository>,
    central: Option<MavenRepository>,
    offline: bool,
    project_poms: Vec<Arc<RawMaven>>,
    pinned_snapshot_versions: Vec<ResolvedGroupArtifactVersion>,
    listener: Arc<dyn ResolutionEventListener>,
}

impl MavenPomDownloader {
    pub fn new(http: Arc<dyn HttpSender>, cache: Arc<dyn MavenPomCache>) -> Self {
        Self {
            http,
            cache,
            retry: RetryPolicy::default(),
            settings: MavenSettings::default(),
            active_profiles: Vec::new(),
            local_repository: None,
            central: Some(MavenRepository::maven_central()),
            offline: false,
            project_poms: Vec::new(),
            pinned_snapshot_versions: Vec::new(),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settings(mut self, settings: MavenSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Profile ids that activate repositories declared in the user settings.
    pub fn with_active_profiles(mut self, active_profiles: Vec<String>) -> Self {
        self.active_profiles = active_profiles;
        self
    }

    /// Searched before every other repository.
    pub fn with_local_repository(mut self, repository: Option<MavenRepository>) -> Self {
        self.local_repository = repository;
        self
    }

    /// Searched after every other repository. Defaults to Maven Central.
    pub fn with_central_repository(mut self, repository: Option<MavenRepository>) -> Self {
        self.central = repository;
        self
    }

    /// Only `file:` repositories are consulted when offline.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// POMs of the project being resolved; they shadow anything in repositories.
    pub fn with_project_poms(mut self, project_poms: Vec<Arc<RawMaven>>) -> Self {
        self.project_poms = project_poms;
        self
    }

    pub fn with_pinned_snapshot_versions(mut self, pinned: Vec<ResolvedGroupArtifactVersion>) -> Self {
        self.pinned_snapshot_versions = pinned;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ResolutionEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn settings(&self) -> &MavenSettings {
        &self.settings
    }

    pub fn download(
        &self,
        gav: &GroupArtifactVersion,
        relative_path: Option<&str>,
        containing: Option<&RawMaven>,
        repositories: &[MavenRepository],
    ) -> Result<Arc<RawMaven>, DownloadError> {
        let (Some(group_id), Some(artifact_id), Some(version)) =
            (&gav.group_id, &gav.artifact_id, &gav.version)
        else {
            return Err(self.fail(gav, DownloadError::MissingCoordinates(gav.clone())));
        };

        if let Some(project) = self.project_poms.iter().find(|project| project.gav() == *gav) {
            trace!("Using project POM {} for {}", project.source_path.display(), gav);
            return Ok(project.clone());
        }

        if let (Some(relative_path), Some(containing)) = (relative_path, containing) {
            if let Some(found) = self.find_relative(containing, relative_path, gav) {
                return Ok(found);
            }
        }

        let dated_snapshot_version = self
            .dated_snapshot_version(gav, repositories)
            .filter(|dated| dated != version);

        let mut attempts = Vec::new();
        for repository in self.distinct_normalized_repositories(repositories, Some(version)) {
            self.listener.repository_accessed(&repository);
            let resolved = ResolvedGroupArtifactVersion {
                repository: repository.uri.clone(),
                group_id: group_id.clone(),
                artifact_id: artifact_id.clone(),
                version: version.clone(),
                dated_snapshot_version: dated_snapshot_version.clone(),
            };

            match self.cache.pom(&resolved) {
                CacheResult::Hit(pom) => {
                    trace!("Cache hit for {} in {}", resolved, repository.uri);
                    return Ok(self.downloaded(resolved, repository, pom, containing));
                }
                CacheResult::Negative => {
                    attempts.push(RepositoryAttempt::new(&repository, "Did not find POM (cached)"));
                    continue;
                }
                CacheResult::Miss => {}
            }

            if repository.is_file() {
                match self.read_file_pom(&repository, &resolved) {
                    Ok(Some(pom)) => {
                        self.cache.put_pom(&resolved, Some(&pom));
                        return Ok(self.downloaded(resolved, repository, pom, containing));
                    }
                    Ok(None) => attempts.push(RepositoryAttempt::new(&repository, "Did not find POM")),
                    Err(error) => attempts.push(RepositoryAttempt::new(&repository, error)),
                }
                continue;
            }

            let uri = format!("{}/{}", repository.uri, resolved.pom_path());
            match self.request_as_authenticated_or_anonymous(&repository, &uri) {
                Ok(body) => match RawPom::parse(&body, resolved.dated_snapshot_version.clone()) {
                    Ok(pom) => {
                        debug!("Downloaded {}", uri);
                        self.cache.put_pom(&resolved, Some(&pom));
                        return Ok(self.downloaded(resolved, repository, pom, containing));
                    }
                    Err(error) => attempts.push(RepositoryAttempt::new(
                        &repository,
                        format!("Unparseable POM: {error}"),
                    )),
                },
                Err(error) => {
                    if error.is_client_side() {
                        self.cache.put_pom(&resolved, None);
                    }
                    attempts.push(RepositoryAttempt::new(&repository, error.to_string()));
                }
            }
        }

        Err(self.fail(
            gav,
            DownloadError::Unavailable {
                gav: gav.clone(),
                attempts,
            },
        ))
    }

    /// Versions of `gav` merged across repositories. A version in `gav` selects the
    /// snapshot metadata of that version.
    pub fn download_metadata(
        &self,
        gav: &GroupArtifactVersion,
        repositories: &[MavenRepository],
    ) -> Result<MavenMetadata, DownloadError> {
        if gav.group_artifact().is_none() {
            return Err(DownloadError::MissingCoordinates(gav.clone()));
        }

        let mut merged: Option<MavenMetadata> = None;
        let mut attempts = Vec::new();
        for repository in self.distinct_normalized_repositories(repositories, gav.version.as_deref()) {
            self.listener.repository_accessed(&repository);
            let metadata = match self.cache.metadata(&repository.uri, gav) {
                CacheResult::Hit(metadata) => Some(metadata),
                CacheResult::Negative => {
                    attempts.push(RepositoryAttempt::new(&repository, "Did not find metadata (cached)"));
                    None
                }
                CacheResult::Miss if repository.is_file() => {
                    match self.read_file_metadata(&repository, gav) {
                        Ok(Some(metadata)) => Some(metadata),
                        Ok(None) => {
                            attempts.push(RepositoryAttempt::new(&repository, "Did not find metadata"));
                            None
                        }
                        Err(error) => {
                            attempts.push(RepositoryAttempt::new(&repository, error));
                            None
                        }
                    }
                }
                CacheResult::Miss => self.fetch_metadata(&repository, gav, &mut attempts),
            };
            if let Some(metadata) = metadata {
                merged = Some(match merged {
                    Some(existing) => existing.merge(metadata),
                    None => metadata,
                });
            }
        }

        merged.ok_or_else(|| DownloadError::Unavailable {
            gav: gav.clone(),
            attempts,
        })
    }

    fn fetch_metadata(
        &self,
        repository: &MavenRepository,
        gav: &GroupArtifactVersion,
        attempts: &mut Vec<RepositoryAttempt>,
    ) -> Option<MavenMetadata> {
        let uri = format!("{}/{}", repository.uri, metadata_path(gav)?);
        match self.request_as_authenticated_or_anonymous(repository, &uri) {
            Ok(body) => match MavenMetadata::parse(&body) {
                Ok(metadata) => {
                    self.cache.put_metadata(&repository.uri, gav, Some(&metadata));
                    Some(metadata)
                }
                Err(error) => {
                    attempts.push(RepositoryAttempt::new(repository, format!("Unparseable metadata: {error}")));
                    None
                }
            },
            Err(error) => {
                if error.is_client_side() {
                    self.cache.put_metadata(&repository.uri, gav, None);
                }
                attempts.push(RepositoryAttempt::new(repository, error.to_string()));
                None
            }
        }
    }

    /// Timestamped version of a `-SNAPSHOT`, from pinned versions first, then metadata.
    /// `None` when `gav` is not a snapshot or no build information is available.
    pub fn dated_snapshot_version(
        &self,
        gav: &GroupArtifactVersion,
        repositories: &[MavenRepository],
    ) -> Option<String> {
        let version = gav.version.as_deref().filter(|version| is_snapshot(version))?;
        let pinned = self.pinned_snapshot_versions.iter().find(|pinned| {
            gav.group_id.as_deref() == Some(pinned.group_id.as_str())
                && gav.artifact_id.as_deref() == Some(pinned.artifact_id.as_str())
                && pinned.version == version
        });
        if let Some(pinned) = pinned {
            return pinned.dated_snapshot_version.clone();
        }
        match self.download_metadata(gav, repositories) {
            Ok(MavenMetadata {
                snapshot: Some(snapshot),
                ..
            }) => Some(format!(
                "{}-{}-{}",
                version.trim_end_matches("-SNAPSHOT"),
                snapshot.timestamp,
                snapshot.build_number
            )),
            Ok(_) => None,
            Err(error) => {
                debug!("Using {} without a timestamp: {}", gav, error);
                None
            }
        }
    }

    /// Local repository, the given repositories, repositories from active settings profiles
    /// and central, each mirrored, normalized and deduplicated by URI.
    pub fn distinct_normalized_repositories(
        &self,
        repositories: &[MavenRepository],
        version: Option<&str>,
    ) -> Vec<MavenRepository> {
        let candidates = self
            .local_repository
            .iter()
            .cloned()
            .chain(repositories.iter().cloned())
            .chain(self.settings.active_repositories(&self.active_profiles))
            .chain(self.central.iter().cloned());

        let mut distinct: Vec<MavenRepository> = Vec::new();
        for repository in candidates {
            if self.offline && !repository.is_file() {
                continue;
            }
            if !repository.accepts(version) {
                continue;
            }
            let mirrored = self
                .settings
                .apply_credentials(&self.settings.apply_mirrors(&repository));
            let Some(normalized) = self.normalize_repository(&mirrored) else {
                continue;
            };
            let normalized = self.settings.apply_credentials(&normalized);
            if distinct.iter().all(|existing| existing.uri != normalized.uri) {
                distinct.push(normalized);
            }
        }
        distinct
    }

    /// Prefers HTTPS for `http:` repositories. Any server response counts as reachable.
    /// `None` means the repository cannot be reached at all.
    pub fn normalize_repository(&self, repository: &MavenRepository) -> Option<MavenRepository> {
        if repository.known_to_exist || repository.is_file() {
            return Some(repository.clone());
        }
        match self.cache.normalized_repository(repository) {
            CacheResult::Hit(normalized) => {
                return Some(normalized.with_credentials(
                    repository.username.clone(),
                    repository.password.clone(),
                ))
            }
            CacheResult::Negative => return None,
            CacheResult::Miss => {}
        }

        let mut candidates = Vec::new();
        if let Some(rest) = repository.uri.strip_prefix("http://") {
            candidates.push(format!("https://{rest}"));
        }
        candidates.push(repository.uri.clone());

        let normalized = candidates.into_iter().find_map(|uri| {
            let candidate = repository.with_uri(uri);
            match self.request_as_authenticated_or_anonymous(&candidate, &candidate.uri) {
                Ok(_) => Some(candidate),
                Err(error) if error.is_server_reached() => Some(candidate),
                Err(error) => {
                    debug!("Repository {} is not reachable: {}", candidate.uri, error);
                    None
                }
            }
        });
        if normalized.is_none() {
            warn!("Repository {} is unreachable and will be skipped", repository.uri);
        }
        self.cache
            .put_normalized_repository(repository, normalized.as_ref());
        normalized
    }

    fn request_as_authenticated_or_anonymous(
        &self,
        repository: &MavenRepository,
        uri: &str,
    ) -> Result<Vec<u8>, RequestError> {
        let credentials = match (&repository.username, &repository.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        };
        let Some((username, password)) = credentials else {
            return self.send(self.http.get(uri).build());
        };
        let request = self
            .http
            .get(uri)
            .with_basic_authentication(username, password)
            .build();
        match self.send(request) {
            Err(error) if error.is_client_side() => {
                debug!("{} rejected credentials with {}, retrying anonymously", uri, error);
                self.send(self.http.get(uri).build())
            }
            result => result,
        }
    }

    fn send(&self, request: Request) -> Result<Vec<u8>, RequestError> {
        let response = self.retry.execute(|| self.http.send(request.clone()))?;
        if response.is_successful() {
            Ok(response.body)
        } else {
            Err(RequestError::Status(response.code))
        }
    }

    fn downloaded(
        &self,
        resolved: ResolvedGroupArtifactVersion,
        repository: MavenRepository,
        pom: RawPom,
        containing: Option<&RawMaven>,
    ) -> Arc<RawMaven> {
        self.listener.download_success(&resolved, containing);
        Arc::new(RawMaven::new(resolved.pom_path(), Some(repository), pom))
    }

    fn fail(&self, gav: &GroupArtifactVersion, error: DownloadError) -> DownloadError {
        self.listener.download_error(gav, &error);
        error
    }

    /// Parent lookup next to a project POM on disk.
    fn find_relative(
        &self,
        containing: &RawMaven,
        relative_path: &str,
        gav: &GroupArtifactVersion,
    ) -> Option<Arc<RawMaven>> {
        if containing.repository.is_some() || relative_path.trim().is_empty() {
            return None;
        }
        let mut path = containing.source_path.parent()?.join(relative_path.trim());
        if path.is_dir() {
            path.push("pom.xml");
        }
        if let Some(project) = self
            .project_poms
            .iter()
            .find(|project| project.source_path == path)
        {
            return (project.gav() == *gav).then(|| project.clone());
        }
        if !path.is_file() {
            return None;
        }
        match RawMaven::from_file(&path) {
            Ok(raw) if raw.gav() == *gav => {
                trace!("Found {} at {}", gav, path.display());
                Some(Arc::new(raw))
            }
            Ok(raw) => {
                debug!(
                    "{} declares {} rather than parent {}",
                    path.display(),
                    raw.gav(),
                    gav
                );
                None
            }
            Err(error) => {
                debug!("Ignoring {}: {}", path.display(), error);
                None
            }
        }
    }

    fn read_file_pom(
        &self,
        repository: &MavenRepository,
        resolved: &ResolvedGroupArtifactVersion,
    ) -> Result<Option<RawPom>, String> {
        let Some(root) = repository.file_path() else {
            return Ok(None);
        };
        let dated = root.join(resolved.pom_path());
        let literal = root.join(
            ResolvedGroupArtifactVersion {
                dated_snapshot_version: None,
                ..resolved.clone()
            }
            .pom_path(),
        );
        let Some(path) = [dated, literal].into_iter().find(|path| path.is_file()) else {
            return Ok(None);
        };
        let bytes = std::fs::read(&path).map_err(|error| format!("{}: {}", path.display(), error))?;
        let pom = RawPom::parse(&bytes, resolved.dated_snapshot_version.clone())
            .map_err(|error| format!("Unparseable POM {}: {}", path.display(), error))?;

        let is_local = self
            .local_repository
            .as_ref()
            .is_some_and(|local| local.uri == repository.uri);
        if is_local && pom.packaging() == "jar" && !jar_exists(&path) {
            debug!("Skipping {} because its jar is not installed", path.display());
            return Ok(None);
        }
        Ok(Some(pom))
    }

    fn read_file_metadata(
        &self,
        repository: &MavenRepository,
        gav: &GroupArtifactVersion,
    ) -> Result<Option<MavenMetadata>, String> {
        let (Some(root), Some(group_artifact)) = (repository.file_path(), gav.group_artifact()) else {
            return Ok(None);
        };
        let mut directory = root.join(group_artifact.path());
        if let Some(version) = &gav.version {
            directory.push(version);
        }
        if !directory.is_dir() {
            return Ok(None);
        }
        for name in ["maven-metadata-local.xml", "maven-metadata.xml"] {
            let path = directory.join(name);
            if path.is_file() {
                let bytes = std::fs::read(&path).map_err(|error| format!("{}: {}", path.display(), error))?;
                return MavenMetadata::parse(&bytes)
                    .map(Some)
                    .map_err(|error| format!("Unparseable metadata {}: {}", path.display(), error));
            }
        }
        if gav.version.is_some() {
            return Ok(None);
        }
        version_directories(&directory)
            .map(|versions| (!versions.is_empty()).then_some(MavenMetadata { versions, snapshot: None }))
            .map_err(|error| format!("{}: {}", directory.display(), error))
    }
}

fn metadata_path(gav: &GroupArtifactVersion) -> Option<String> {
    let group_artifact = gav.group_artifact()?;
    Some(match &gav.version {
        Some(version) => format!("{}/{}/maven-metadata.xml", group_artifact.path(), version),
        None => format!("{}/maven-metadata.xml", group_artifact.path()),
    })
}

fn jar_exists(pom_path: &Path) -> bool {
    pom_path.with_extension("jar").is_file()
}

fn version_directories(directory: &Path) -> std::io::Result<Vec<String>> {
    let mut versions = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            versions.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    versions.sort();
    Ok(versions)
}

/// Writes a POM into a `file:` repository layout.
#[cfg(test)]
pub(crate) fn install_pom(root: &Path, group_id: &str, artifact_id: &str, version: &str, xml: &str) -> std::path::PathBuf {
    let directory = root
        .join(group_id.replace('.', "/"))
        .join(artifact_id)
        .join(version);
    std::fs::create_dir_all(&directory).unwrap();
    let path = directory.join(format!("{artifact_id}-{version}.pom"));
    std::fs::write(&path, xml).unwrap();
    path
}
