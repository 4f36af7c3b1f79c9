use std::{collections::HashMap, env, error::Error, path::PathBuf, sync::Arc, time::Duration};

use home::home_dir;
use log::{debug, warn};

use crate::{
    cache::FileSystemPomCache,
    config::PomFetchConfig,
    http::ReqwestSender,
    model::{MavenRepository, MavenSettings},
    resolver::ResolverOptions,
    version::ResolutionStrategy,
    PomFetch,
};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct PomFetchBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    lock_file_name: Option<PathBuf>,
    cache_directory_path: Option<PathBuf>,
    settings_file: Option<PathBuf>,
    local_repository: Option<PathBuf>,
    http_timeout: Option<Duration>,
    strategy: Option<ResolutionStrategy>,
    active_profiles: Vec<String>,
    system_properties: HashMap<String, String>,
    resolve_optional: bool,
    offline: bool,
}

impl PomFetchBuilder {
    /// Project root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the pomfetch lock file.
    ///
    /// Defaults to `pomfetch.lock`.
    pub fn lock_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file_name = Some(path.into());
        self
    }

    /// Location of the pomfetch cache directory.
    ///
    /// Defaults to `$HOME/.pomfetch/cache`.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    /// Maven user settings.
    ///
    /// Defaults to `$HOME/.m2/settings.xml`. A missing file means empty settings.
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// Local Maven repository, searched before any remote one.
    ///
    /// Defaults to the one named in the settings, then `$HOME/.m2/repository`.
    pub fn local_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_repository = Some(path.into());
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Profiles to activate, `!id` to deactivate.
    pub fn active_profiles(mut self, profiles: impl IntoIterator<Item = String>) -> Self {
        self.active_profiles.extend(profiles);
        self
    }

    pub fn system_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_properties.insert(key.into(), value.into());
        self
    }

    pub fn resolve_optional(mut self, resolve_optional: bool) -> Self {
        self.resolve_optional = resolve_optional;
        self
    }

    /// Only use `file:` repositories.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn try_build(self) -> Result<PomFetch, Box<dyn Error>> {
        let Self {
            root,
            lock_file_name,
            cache_directory_path,
            settings_file,
            local_repository,
            http_timeout,
            strategy,
            active_profiles,
            system_properties,
            resolve_optional,
            offline,
        } = self;
        let config = PomFetchConfig::load()?;

        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let lock_file_name = lock_file_name.unwrap_or_else(|| PathBuf::from("pomfetch.lock"));

        let cache_directory = match cache_directory_path.or(config.cache_dir) {
            Some(path) => root.join(path),
            None => default_cache_directory()?,
        };
        let cache = FileSystemPomCache::new(cache_directory)?;

        let settings_file = match settings_file.or(config.settings_file) {
            Some(path) => Some(root.join(path)),
            None => home_dir().map(|home| home.join(".m2/settings.xml")),
        };
        let settings = match settings_file {
            Some(path) if path.exists() => MavenSettings::from_file(&path)?,
            Some(path) => {
                debug!("No Maven settings at {}", path.display());
                MavenSettings::default()
            }
            None => MavenSettings::default(),
        };

        let local_repository = local_repository
            .or(config.local_repository)
            .map(|path| root.join(path))
            .or_else(|| settings.local_repository.clone())
            .or_else(|| home_dir().map(|home| home.join(".m2/repository")));
        if local_repository.is_none() {
            warn!("No local Maven repository found, define $HOME to use one");
        }

        let http = ReqwestSender::new(
            http_timeout
                .or(config.http_timeout)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        )?;

        let options = ResolverOptions {
            active_profiles,
            strategy: strategy.or(config.strategy).unwrap_or_default(),
            resolve_optional,
            system_properties,
            ..ResolverOptions::default()
        };

        Ok(PomFetch {
            cache: Arc::new(cache),
            http: Arc::new(http),
            settings,
            local_repository: local_repository.map(|path| MavenRepository::local(&path)),
            root,
            lock_file_name,
            offline,
            options,
        })
    }
}

fn default_cache_directory() -> Result<PathBuf, Box<dyn Error>> {
    let mut cache_directory =
        home_dir().ok_or("Could not find home dir. Please define $HOME env variable.")?;
    cache_directory.push(".pomfetch/cache");
    Ok(cache_directory)
}
