use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::version::ResolutionStrategy;

pub struct PomFetchConfig {
    pub cache_dir: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub local_repository: Option<PathBuf>,
    pub http_timeout: Option<Duration>,
    pub strategy: Option<ResolutionStrategy>,
}

impl PomFetchConfig {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::from(RawConfig::load(None)?))
    }
}

impl From<RawConfig> for PomFetchConfig {
    fn from(raw_config: RawConfig) -> Self {
        Self {
            cache_dir: raw_config.cache.dir,
            settings_file: raw_config.maven.settings,
            local_repository: raw_config.maven.localrepository,
            http_timeout: raw_config.http.timeout.map(Duration::from_secs),
            strategy: raw_config.resolution.strategy,
        }
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    maven: MavenConfig,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    resolution: ResolutionConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct MavenConfig {
    settings: Option<PathBuf>,
    localrepository: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct HttpConfig {
    /// Seconds.
    timeout: Option<u64>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct ResolutionConfig {
    strategy: Option<ResolutionStrategy>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("POMFETCH")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let config = RawConfig::load(Some(HashMap::new())).unwrap();
        assert_eq!(config, RawConfig::default());
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("POMFETCH_CACHE_DIR".to_owned(), "/cache".to_owned()),
            ("POMFETCH_MAVEN_SETTINGS".to_owned(), "/m2/settings.xml".to_owned()),
            ("POMFETCH_MAVEN_LOCALREPOSITORY".to_owned(), "/m2/repository".to_owned()),
            ("POMFETCH_HTTP_TIMEOUT".to_owned(), "30".to_owned()),
            ("POMFETCH_RESOLUTION_STRATEGY".to_owned(), "newest".to_owned()),
        ]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig {
                    dir: Some("/cache".into())
                },
                maven: MavenConfig {
                    settings: Some("/m2/settings.xml".into()),
                    localrepository: Some("/m2/repository".into()),
                },
                http: HttpConfig { timeout: Some(30) },
                resolution: ResolutionConfig {
                    strategy: Some(ResolutionStrategy::Newest)
                },
            }
        );

        let config = PomFetchConfig::from(config);
        assert_eq!(config.http_timeout, Some(Duration::from_secs(30)));
    }
}
