use std::fmt::{Display, Formatter};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupArtifact {
    pub group_id: String,
    pub artifact_id: String,
}

impl GroupArtifact {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Repository-relative directory of this artifact, e.g. `org/slf4j/slf4j-api`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.group_id.replace('.', "/"), self.artifact_id)
    }

    /// Treats `self` as an exclusion pattern where `*` matches any run of characters.
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> Result<bool, regex_lite::Error> {
        Ok(glob_matches(&self.group_id, group_id)?
            && glob_matches(&self.artifact_id, artifact_id)?)
    }
}

fn glob_matches(pattern: &str, value: &str) -> Result<bool, regex_lite::Error> {
    if !pattern.contains('*') {
        return Ok(pattern == value);
    }
    let expression = pattern
        .split('*')
        .map(regex_lite::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let regex = Regex::new(&format!("^{expression}$"))?;
    Ok(regex.is_match(value))
}

impl Display for GroupArtifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Coordinates as written in a POM. Any part may be absent or contain placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupArtifactVersion {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
}

impl GroupArtifactVersion {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: Some(group_id.into()),
            artifact_id: Some(artifact_id.into()),
            version: Some(version.into()),
        }
    }

    pub fn without_version(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            artifact_id: Some(artifact_id.into()),
            version: None,
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self.clone()
        }
    }

    pub fn group_artifact(&self) -> Option<GroupArtifact> {
        match (&self.group_id, &self.artifact_id) {
            (Some(group_id), Some(artifact_id)) => {
                Some(GroupArtifact::new(group_id.clone(), artifact_id.clone()))
            }
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.group_id.is_some() && self.artifact_id.is_some() && self.version.is_some()
    }

    pub fn is_snapshot(&self) -> bool {
        self.version
            .as_deref()
            .is_some_and(|version| version.ends_with("-SNAPSHOT"))
    }
}

impl Display for GroupArtifactVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id.as_deref().unwrap_or("?"),
            self.artifact_id.as_deref().unwrap_or("?"),
            self.version.as_deref().unwrap_or("?")
        )
    }
}

/// Coordinates pinned to the repository a POM was found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedGroupArtifactVersion {
    pub repository: String,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dated_snapshot_version: Option<String>,
}

impl ResolvedGroupArtifactVersion {
    pub fn group_artifact(&self) -> GroupArtifact {
        GroupArtifact::new(self.group_id.clone(), self.artifact_id.clone())
    }

    pub fn group_artifact_version(&self) -> GroupArtifactVersion {
        GroupArtifactVersion::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
        )
    }

    /// The version that appears in file names; snapshots use their timestamped form.
    pub fn file_version(&self) -> &str {
        self.dated_snapshot_version
            .as_deref()
            .unwrap_or(&self.version)
    }

    /// Repository-relative path of the POM file.
    pub fn pom_path(&self) -> String {
        format!(
            "{}/{}/{}-{}.pom",
            self.group_artifact().path(),
            self.version,
            self.artifact_id,
            self.file_version()
        )
    }
}

impl Display for ResolvedGroupArtifactVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.file_version()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn exclusion_wildcards() {
        let all = GroupArtifact::new("*", "*");
        assert!(all.matches("org.slf4j", "slf4j-api").unwrap());

        let group = GroupArtifact::new("org.slf4j", "*");
        assert!(group.matches("org.slf4j", "slf4j-simple").unwrap());
        assert!(!group.matches("org.slf4jx", "slf4j-simple").unwrap());

        let prefix = GroupArtifact::new("com.fasterxml.*", "jackson-*");
        assert!(prefix.matches("com.fasterxml.jackson.core", "jackson-databind").unwrap());
        assert!(!prefix.matches("com.fasterxml", "jackson-databind").unwrap());
    }

    #[test]
    fn exclusion_dots_are_literal() {
        let exact = GroupArtifact::new("org.example", "a*");
        assert!(!exact.matches("orgXexample", "abc").unwrap());
    }

    #[test]
    fn snapshot_pom_path_uses_dated_version() {
        let gav = ResolvedGroupArtifactVersion {
            repository: "https://repo.example.com".to_owned(),
            group_id: "org.example".to_owned(),
            artifact_id: "lib".to_owned(),
            version: "1.0-SNAPSHOT".to_owned(),
            dated_snapshot_version: Some("1.0-20240101.120000-3".to_owned()),
        };
        assert_eq!(
            gav.pom_path(),
            "org/example/lib/1.0-SNAPSHOT/lib-1.0-20240101.120000-3.pom"
        );
        assert_eq!(gav.to_string(), "org.example:lib:1.0-20240101.120000-3");
    }

    #[test]
    fn display_marks_missing_parts() {
        let gav = GroupArtifactVersion {
            group_id: None,
            artifact_id: Some("lib".to_owned()),
            version: None,
        };
        assert_eq!(gav.to_string(), "?:lib:?");
        assert!(!gav.is_complete());
    }
}
