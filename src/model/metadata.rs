use quick_xml::de::from_reader;
use serde::{Deserialize, Serialize};

use crate::{model::ParseError, version::compare_versions};

/// Versions known for an artifact plus the latest snapshot build, merged across repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenMetadata {
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub build_number: String,
}

#[derive(Debug, Deserialize)]
struct MetadataXml {
    #[serde(default)]
    versioning: Option<VersioningXml>,
}

#[derive(Debug, Deserialize)]
struct VersioningXml {
    #[serde(default)]
    versions: Option<VersionsXml>,
    #[serde(default)]
    snapshot: Option<SnapshotXml>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionsXml {
    #[serde(default, rename = "version")]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotXml {
    timestamp: Option<String>,
    #[serde(rename = "buildNumber")]
    build_number: Option<String>,
}

impl MavenMetadata {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let xml: MetadataXml = from_reader(bytes)?;
        let Some(versioning) = xml.versioning else {
            return Ok(Self::default());
        };
        let versions = versioning
            .versions
            .unwrap_or_default()
            .items
            .into_iter()
            .map(|version| version.trim().to_owned())
            .filter(|version| !version.is_empty())
            .collect();
        let snapshot = versioning.snapshot.and_then(|snapshot| {
            Some(Snapshot {
                timestamp: snapshot.timestamp?.trim().to_owned(),
                build_number: snapshot.build_number?.trim().to_owned(),
            })
        });
        Ok(Self { versions, snapshot })
    }

    /// Union of versions in first-seen order. The most recent snapshot build wins.
    pub fn merge(mut self, other: MavenMetadata) -> MavenMetadata {
        for version in other.versions {
            if !self.versions.contains(&version) {
                self.versions.push(version);
            }
        }
        self.snapshot = match (self.snapshot.take(), other.snapshot) {
            (Some(ours), Some(theirs)) => {
                if theirs.timestamp > ours.timestamp {
                    Some(theirs)
                } else {
                    Some(ours)
                }
            }
            (ours, theirs) => ours.or(theirs),
        };
        self
    }

    /// Versions sorted oldest to newest by Maven ordering.
    pub fn sorted_versions(&self) -> Vec<String> {
        let mut versions = self.versions.clone();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }
}
