use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;

use crate::{
    cache::FileSystemPomCache,
    cli::command_handlers::{do_clear_cache, do_lock, do_resolve},
    downloader::MavenPomDownloader,
    http::HttpSender,
    model::{lock::LockFile, MavenRepository, MavenSettings, Pom, RawMaven},
    resolver::ResolverOptions,
};

mod builder;

pub use builder::PomFetchBuilder;

pub struct PomFetch {
    cache: Arc<FileSystemPomCache>,
    http: Arc<dyn HttpSender>,
    settings: MavenSettings,
    local_repository: Option<MavenRepository>,
    root: PathBuf,
    lock_file_name: PathBuf,
    offline: bool,
    options: ResolverOptions,
}

impl PomFetch {
    pub fn builder() -> PomFetchBuilder {
        PomFetchBuilder::default()
    }

    /// Resolves the dependency graph of every POM in `poms`. The POMs can refer to each
    /// other as parents or dependencies without being installed anywhere.
    pub fn resolve(&self, poms: &[PathBuf]) -> Result<Vec<Arc<Pom>>, Box<dyn Error>> {
        let projects = self.load_projects(poms)?;
        let downloader = self.downloader(&projects)?;
        Ok(do_resolve(downloader, projects, &self.options)?)
    }

    /// Resolves `poms` and writes the flattened result to the lock file.
    pub fn lock(&self, poms: &[PathBuf]) -> Result<LockFile, Box<dyn Error>> {
        let resolved = self.resolve(poms)?;
        Ok(do_lock(&resolved, &self.root.join(&self.lock_file_name))?)
    }

    pub fn clear_cache(&self) -> Result<(), Box<dyn Error>> {
        do_clear_cache(&self.cache)
    }

    fn load_projects(&self, poms: &[PathBuf]) -> Result<Vec<Arc<RawMaven>>, Box<dyn Error>> {
        poms.iter()
            .map(|pom| {
                let path = self.root.join(pom);
                debug!("Loading project {}", path.display());
                RawMaven::from_file(&path).map(Arc::new).map_err(|error| {
                    Box::<dyn Error>::from(format!("Unable to read {}: {}", path.display(), error))
                })
            })
            .collect()
    }

    fn downloader(&self, projects: &[Arc<RawMaven>]) -> Result<Arc<MavenPomDownloader>, Box<dyn Error>> {
        let pinned_snapshot_versions = match self.existing_lock_file()? {
            Some(lock_file) => lock_file.pinned_snapshot_versions(),
            None => Vec::new(),
        };
        Ok(Arc::new(
            MavenPomDownloader::new(self.http.clone(), self.cache.clone())
                .with_settings(self.settings.clone())
                .with_active_profiles(self.options.active_profiles.clone())
                .with_local_repository(self.local_repository.clone())
                .offline(self.offline)
                .with_project_poms(projects.to_vec())
                .with_pinned_snapshot_versions(pinned_snapshot_versions),
        ))
    }

    fn existing_lock_file(&self) -> Result<Option<LockFile>, Box<dyn Error>> {
        let path = self.root.join(&self.lock_file_name);
        if !path.exists() {
            return Ok(None);
        }
        debug!("Pinning snapshot versions from {}", path.display());
        Ok(Some(LockFile::from_file(&path)?))
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.root.join(&self.lock_file_name)
    }

    pub fn cache_location(&self) -> &Path {
        self.cache.location()
    }
}
