use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const MAVEN_CENTRAL_URI: &str = "https://repo.maven.apache.org/maven2";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MavenRepository {
    pub id: String,
    pub uri: String,
    pub releases: bool,
    pub snapshots: bool,
    /// Skips reachability probing during normalization.
    #[serde(default)]
    pub known_to_exist: bool,
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

impl MavenRepository {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into().trim_end_matches('/').to_owned(),
            releases: true,
            snapshots: true,
            known_to_exist: false,
            username: None,
            password: None,
        }
    }

    pub fn maven_central() -> Self {
        Self {
            snapshots: false,
            known_to_exist: true,
            ..Self::new("central", MAVEN_CENTRAL_URI)
        }
    }

    pub fn local(path: &Path) -> Self {
        Self {
            known_to_exist: true,
            ..Self::new("local", format!("file://{}", path.display()))
        }
    }

    pub fn with_uri(&self, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into().trim_end_matches('/').to_owned(),
            ..self.clone()
        }
    }

    pub fn with_credentials(&self, username: Option<String>, password: Option<String>) -> Self {
        Self {
            username,
            password,
            ..self.clone()
        }
    }

    pub fn is_file(&self) -> bool {
        self.uri.starts_with("file:")
    }

    /// Filesystem root of a `file:` repository.
    pub fn file_path(&self) -> Option<PathBuf> {
        let path = self.uri.strip_prefix("file:")?;
        let path = path.strip_prefix("//").unwrap_or(path);
        Some(PathBuf::from(path))
    }

    /// Whether the repository serves releases or snapshots as appropriate for `version`.
    pub fn accepts(&self, version: Option<&str>) -> bool {
        match version {
            Some(version) if version.ends_with("-SNAPSHOT") => self.snapshots,
            Some(_) => self.releases,
            None => true,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn local_repository_path() {
        let repository = MavenRepository::local(Path::new("/home/user/.m2/repository"));
        assert_eq!(repository.uri, "file:///home/user/.m2/repository");
        assert!(repository.is_file());
        assert_eq!(
            repository.file_path(),
            Some(PathBuf::from("/home/user/.m2/repository"))
        );
    }

    #[test]
    fn snapshot_policy() {
        let central = MavenRepository::maven_central();
        assert!(central.accepts(Some("1.0")));
        assert!(!central.accepts(Some("1.0-SNAPSHOT")));
        assert!(central.accepts(None));
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let repository = MavenRepository::new("example", "https://repo.example.com/maven/");
        assert_eq!(repository.uri, "https://repo.example.com/maven");
    }
}
