use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{
    coordinates::ResolvedGroupArtifactVersion, pom::Pom, scope::Scope, ParseError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub dependencies: Vec<LockedDependency>,
}

const VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct VersionedLockFile<'a> {
    pub version: i64,
    #[serde(flatten)]
    pub content: &'a LockFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LockedDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dated_snapshot_version: Option<String>,
}

impl LockFile {
    pub fn from_file(file: &Path) -> Result<LockFile, ParseError> {
        LockFile::from_str(&std::fs::read_to_string(file)?)
    }

    pub fn from_str(s: &str) -> Result<LockFile, ParseError> {
        let mut table = toml::from_str::<toml::Table>(s)?;
        match table.remove("version") {
            Some(toml::Value::Integer(VERSION)) => table.try_into::<LockFile>().map_err(Into::into),
            Some(other) => Err(ParseError::UnsupportedLockFileVersion(other)),
            None => Err(ParseError::MissingLockFileVersion),
        }
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&VersionedLockFile {
            version: VERSION,
            content: self,
        })
    }

    /// Flattens resolved graphs, keeping the first occurrence of each group and artifact.
    pub fn from_poms<'a>(poms: impl IntoIterator<Item = &'a Pom>) -> LockFile {
        let mut dependencies: Vec<LockedDependency> = Vec::new();
        for pom in poms {
            for dependency in pom.flatten_dependencies() {
                let model = &dependency.model;
                let duplicate = dependencies.iter().any(|locked| {
                    locked.group_id == model.group_id && locked.artifact_id == model.artifact_id
                });
                if duplicate {
                    continue;
                }
                dependencies.push(LockedDependency {
                    group_id: model.group_id.clone(),
                    artifact_id: model.artifact_id.clone(),
                    version: model.version.clone(),
                    scope: dependency.scope,
                    classifier: dependency.classifier.clone(),
                    type_: dependency.type_.clone(),
                    dated_snapshot_version: model.dated_snapshot_version.clone(),
                });
            }
        }
        LockFile { dependencies }
    }

    /// Snapshot builds recorded in this lock file, for reproducible resolution.
    pub fn pinned_snapshot_versions(&self) -> Vec<ResolvedGroupArtifactVersion> {
        self.dependencies
            .iter()
            .filter_map(|locked| {
                Some(ResolvedGroupArtifactVersion {
                    repository: String::new(),
                    group_id: locked.group_id.clone(),
                    artifact_id: locked.artifact_id.clone(),
                    version: locked.version.clone(),
                    dated_snapshot_version: Some(locked.dated_snapshot_version.clone()?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use toml::toml;

    use crate::model::pom::{tests::pom, Dependency};

    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_save_lock_file() {
        let text = toml::to_string_pretty(&toml! {
            version = 1

            [[dependencies]]
            group_id = "org.example"
            artifact_id = "lib"
            version = "1.0-SNAPSHOT"
            scope = "compile"
            dated_snapshot_version = "1.0-20240101.120000-3"

            [[dependencies]]
            group_id = "junit"
            artifact_id = "junit"
            version = "4.13.2"
            scope = "test"
            classifier = "tests"
            "type" = "test-jar"
        })
        .unwrap();
        let data = LockFile {
            dependencies: vec![
                LockedDependency {
                    group_id: "org.example".to_owned(),
                    artifact_id: "lib".to_owned(),
                    version: "1.0-SNAPSHOT".to_owned(),
                    scope: Scope::Compile,
                    classifier: None,
                    type_: None,
                    dated_snapshot_version: Some("1.0-20240101.120000-3".to_owned()),
                },
                LockedDependency {
                    group_id: "junit".to_owned(),
                    artifact_id: "junit".to_owned(),
                    version: "4.13.2".to_owned(),
                    scope: Scope::Test,
                    classifier: Some("tests".to_owned()),
                    type_: Some("test-jar".to_owned()),
                    dated_snapshot_version: None,
                },
            ],
        };
        let parsed = LockFile::from_str(&text).unwrap();
        assert_eq!(parsed, data);
        assert_eq!(parsed.pinned_snapshot_versions().len(), 1);
        assert_eq!(
            parsed.pinned_snapshot_versions()[0].dated_snapshot_version.as_deref(),
            Some("1.0-20240101.120000-3")
        );
    }

    #[test]
    fn reject_unknown_lock_file_version() {
        let text = toml::to_string_pretty(&toml! {
            version = 7
        })
        .unwrap();
        let error = LockFile::from_str(&text).expect_err("should not parse version 7");
        assert!(matches!(error, ParseError::UnsupportedLockFileVersion(_)));
        LockFile::from_str("dependencies = []").expect_err("should require a version");
    }

    #[test]
    fn lock_from_graph() {
        let leaf = Arc::new(pom("org.example", "leaf", "2.0"));
        let mut middle = pom("org.example", "middle", "1.0");
        middle.dependencies.push(Dependency {
            repository: None,
            scope: Scope::Runtime,
            classifier: None,
            type_: None,
            optional: false,
            requested_version: Some("2.0".to_owned()),
            exclusions: Vec::new(),
            model: leaf,
        });
        let mut root = pom("org.example", "root", "1.0");
        root.dependencies.push(Dependency {
            repository: None,
            scope: Scope::Compile,
            classifier: None,
            type_: None,
            optional: false,
            requested_version: Some("1.0".to_owned()),
            exclusions: Vec::new(),
            model: Arc::new(middle),
        });

        let lock = LockFile::from_poms([&root]);
        let text = lock.to_string().unwrap();
        assert_eq!(LockFile::from_str(&text).unwrap(), lock);
        assert_eq!(
            lock.dependencies
                .iter()
                .map(|locked| (locked.artifact_id.as_str(), locked.scope))
                .collect::<Vec<_>>(),
            vec![("middle", Scope::Compile), ("leaf", Scope::Runtime)]
        );
    }
}
