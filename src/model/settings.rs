use std::path::{Path, PathBuf};

use log::debug;
use quick_xml::de::from_reader;
use serde::Deserialize;

use crate::model::{repository::MavenRepository, ParseError};

/// The parts of a Maven user `settings.xml` that affect where POMs are fetched from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MavenSettings {
    pub local_repository: Option<PathBuf>,
    pub mirrors: Vec<Mirror>,
    pub servers: Vec<Server>,
    pub profiles: Vec<SettingsProfile>,
    pub active_profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    pub id: String,
    pub url: String,
    pub mirror_of: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsProfile {
    pub id: String,
    pub active_by_default: bool,
    pub repositories: Vec<MavenRepository>,
}

impl Mirror {
    /// `mirrorOf` accepts `*`, `external:*`, repository ids and `!id` exclusions, comma separated.
    pub fn matches(&self, repository: &MavenRepository) -> bool {
        if repository.is_file() || repository.id == self.id {
            return false;
        }
        let mut matched = false;
        for pattern in self.mirror_of.split(',').map(str::trim) {
            if let Some(excluded) = pattern.strip_prefix('!') {
                if excluded == repository.id {
                    return false;
                }
                continue;
            }
            matched |= match pattern {
                "*" => true,
                "external:*" => !is_localhost(&repository.uri),
                id => id == repository.id,
            };
        }
        matched
    }
}

fn is_localhost(uri: &str) -> bool {
    let host = uri
        .split_once("://")
        .map_or(uri, |(_, rest)| rest)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    host == "localhost" || host == "127.0.0.1"
}

impl MavenSettings {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let settings: SettingsXml = from_reader(bytes)?;
        Ok(Self::from(settings))
    }

    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        debug!("Reading Maven settings from {}", path.display());
        Self::parse(&std::fs::read(path)?)
    }

    /// Repositories contributed by profiles active through `activeProfiles`, the additional
    /// ids passed in, or `activeByDefault`.
    pub fn active_repositories(&self, requested_profiles: &[String]) -> Vec<MavenRepository> {
        let is_requested = |id: &String| {
            self.active_profiles.contains(id) || requested_profiles.contains(id)
        };
        let explicit = self
            .profiles
            .iter()
            .filter(|profile| is_requested(&profile.id))
            .collect::<Vec<_>>();
        let active = if explicit.is_empty() {
            self.profiles
                .iter()
                .filter(|profile| profile.active_by_default)
                .collect()
        } else {
            explicit
        };
        active
            .into_iter()
            .flat_map(|profile| profile.repositories.iter().cloned())
            .map(|repository| self.apply_credentials(&self.apply_mirrors(&repository)))
            .collect()
    }

    pub fn apply_mirrors(&self, repository: &MavenRepository) -> MavenRepository {
        match self.mirrors.iter().find(|mirror| mirror.matches(repository)) {
            Some(mirror) => MavenRepository {
                id: mirror.id.clone(),
                ..repository.with_uri(mirror.url.clone())
            },
            None => repository.clone(),
        }
    }

    pub fn apply_credentials(&self, repository: &MavenRepository) -> MavenRepository {
        match self.servers.iter().find(|server| server.id == repository.id) {
            Some(server) => {
                repository.with_credentials(server.username.clone(), server.password.clone())
            }
            None => repository.clone(),
        }
    }
}

/// Replaces `${env.NAME}` with the environment variable and `${user.home}` with the home
/// directory. Unknown placeholders are left as written.
fn interpolate(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };
        let key = &rest[start + 2..start + end];
        let replacement = match key.strip_prefix("env.") {
            Some(name) => std::env::var(name).ok(),
            None if key == "user.home" => {
                home::home_dir().map(|home| home.display().to_string())
            }
            None => None,
        };
        match replacement {
            Some(replacement) => result.push_str(&replacement),
            None => result.push_str(&rest[start..start + end + 1]),
        }
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|value| interpolate(value.trim()))
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsXml {
    local_repository: Option<String>,
    #[serde(default)]
    mirrors: Option<MirrorsXml>,
    #[serde(default)]
    servers: Option<ServersXml>,
    #[serde(default)]
    profiles: Option<ProfilesXml>,
    #[serde(default)]
    active_profiles: Option<ActiveProfilesXml>,
}

#[derive(Debug, Default, Deserialize)]
struct MirrorsXml {
    #[serde(default, rename = "mirror")]
    items: Vec<MirrorXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirrorXml {
    id: Option<String>,
    url: Option<String>,
    mirror_of: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServersXml {
    #[serde(default, rename = "server")]
    items: Vec<ServerXml>,
}

#[derive(Debug, Deserialize)]
struct ServerXml {
    id: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilesXml {
    #[serde(default, rename = "profile")]
    items: Vec<ProfileXml>,
}

#[derive(Debug, Deserialize)]
struct ProfileXml {
    id: Option<String>,
    activation: Option<ActivationXml>,
    #[serde(default)]
    repositories: Option<RepositoriesXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivationXml {
    active_by_default: Option<String>,
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
    releases: Option<PolicyXml>,
    snapshots: Option<PolicyXml>,
}

#[derive(Debug, Deserialize)]
struct PolicyXml {
    enabled: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ActiveProfilesXml {
    #[serde(default, rename = "activeProfile")]
    items: Vec<String>,
}

fn enabled(policy: Option<PolicyXml>) -> bool {
    policy
        .and_then(|policy| text(policy.enabled))
        .map_or(true, |enabled| enabled.eq_ignore_ascii_case("true"))
}

impl From<SettingsXml> for MavenSettings {
    fn from(settings: SettingsXml) -> Self {
        let mirrors = settings
            .mirrors
            .unwrap_or_default()
            .items
            .into_iter()
            .filter_map(|mirror| {
                Some(Mirror {
                    id: text(mirror.id)?,
                    url: text(mirror.url)?,
                    mirror_of: text(mirror.mirror_of)?,
                })
            })
            .collect();
        let servers = settings
            .servers
            .unwrap_or_default()
            .items
            .into_iter()
            .filter_map(|server| {
                Some(Server {
                    id: text(server.id)?,
                    username: text(server.username),
                    password: text(server.password),
                })
            })
            .collect();
        let profiles = settings
            .profiles
            .unwrap_or_default()
            .items
            .into_iter()
            .filter_map(|profile| {
                let repositories = profile
                    .repositories
                    .unwrap_or_default()
                    .items
                    .into_iter()
                    .filter_map(|repository| {
                        let url = text(repository.url)?;
                        let id = text(repository.id).unwrap_or_else(|| url.clone());
                        Some(MavenRepository {
                            releases: enabled(repository.releases),
                            snapshots: enabled(repository.snapshots),
                            ..MavenRepository::new(id, url)
                        })
                    })
                    .collect();
                Some(SettingsProfile {
                    id: text(profile.id)?,
                    active_by_default: profile
                        .activation
                        .and_then(|activation| text(activation.active_by_default))
                        .is_some_and(|value| value.eq_ignore_ascii_case("true")),
                    repositories,
                })
            })
            .collect();
        Self {
            local_repository: text(settings.local_repository).map(PathBuf::from),
            mirrors,
            servers,
            profiles,
            active_profiles: settings
                .active_profiles
                .unwrap_or_default()
                .items
                .into_iter()
                .filter_map(|id| text(Some(id)))
                .collect(),
        }
    }
}
