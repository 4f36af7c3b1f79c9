use std::{collections::HashMap, sync::Arc};

use crate::{
    model::{
        pom::DefinedDependency, DependencyManagement, GroupArtifact, GroupArtifactVersion, License,
        MavenRepository, Pom, RawMaven,
    },
    resolver::{
        placeholder::{substitute, PlaceholderError},
        task::ResolutionTask,
    },
};

/// An edge found while processing a POM, before its target is assembled.
#[derive(Debug, Clone)]
pub(crate) struct DependencyEdge {
    pub group_artifact: GroupArtifact,
    pub version: String,
    /// Exclusions declared on this dependency only.
    pub exclusions: Vec<GroupArtifact>,
    pub task: ResolutionTask,
}

/// Everything learned about one task. Turned into a [`Pom`] during assembly.
#[derive(Debug)]
pub(crate) struct PartialMaven {
    pub raw_maven: Arc<RawMaven>,
    pub coordinates: GroupArtifactVersion,
    pub parent: Option<Arc<Pom>>,
    pub dependency_management: DependencyManagement,
    pub licenses: Vec<License>,
    pub repositories: Vec<MavenRepository>,
    /// Own properties with active profiles merged in.
    pub properties: HashMap<String, String>,
    pub effective_properties: HashMap<String, String>,
    pub dependencies: Vec<DependencyEdge>,
}

impl PartialMaven {
    pub fn new(
        raw_maven: Arc<RawMaven>,
        properties: HashMap<String, String>,
        effective_properties: HashMap<String, String>,
    ) -> Self {
        Self {
            coordinates: raw_maven.gav(),
            raw_maven,
            parent: None,
            dependency_management: DependencyManagement::default(),
            licenses: Vec::new(),
            repositories: Vec::new(),
            properties,
            effective_properties,
            dependencies: Vec::new(),
        }
    }

    pub fn substitute(
        &self,
        text: &str,
        system_properties: &HashMap<String, String>,
    ) -> Result<String, PlaceholderError> {
        substitute(text, |key| self.value(key, system_properties))
    }

    /// Looks up a property as Maven would see it while building this POM's model.
    pub fn value(&self, key: &str, system_properties: &HashMap<String, String>) -> Option<String> {
        if let Some(value) = self.reserved(key) {
            return Some(value);
        }
        self.effective_properties
            .get(key)
            .or_else(|| self.properties.get(key))
            .cloned()
            .or_else(|| {
                self.dependency_management
                    .imported_boms()
                    .find_map(|bom| bom.property(key))
                    .map(str::to_owned)
            })
            .or_else(|| self.parent.as_ref()?.property(key).map(str::to_owned))
            .or_else(|| system_properties.get(key).cloned())
            .or_else(|| std::env::var(key.strip_prefix("env.")?).ok())
    }

    fn reserved(&self, key: &str) -> Option<String> {
        let pom = &self.raw_maven.pom;
        let parent = pom.parent.as_ref();
        match key {
            "groupId" | "project.groupId" | "pom.groupId" => self.raw_maven.gav().group_id,
            "artifactId" | "project.artifactId" | "pom.artifactId" => pom.artifact_id.clone(),
            "version" | "project.version" | "pom.version" => self.raw_maven.gav().version,
            "project.parent.groupId" => parent.map(|parent| parent.group_id.clone()),
            "project.parent.artifactId" => parent.map(|parent| parent.artifact_id.clone()),
            "project.parent.version" => parent.map(|parent| parent.version.clone()),
            "project.packaging" => Some(pom.packaging().to_owned()),
            "project.name" => pom.name.clone(),
            "basedir" | "project.basedir" => self
                .raw_maven
                .source_path
                .parent()
                .map(|directory| directory.display().to_string()),
            _ => None,
        }
    }

    /// Properties handed to the parent POM: this POM's own, overridden by what was handed
    /// to this POM.
    pub fn properties_for_parent(&self) -> HashMap<String, String> {
        let mut properties = self.properties.clone();
        properties.extend(
            self.effective_properties
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        properties
    }

    pub fn find_managed(&self, group_artifact: &GroupArtifact) -> Option<&DefinedDependency> {
        self.dependency_management
            .find(group_artifact)
            .or_else(|| self.parent.as_ref()?.find_managed(group_artifact))
    }

    pub fn add_repositories(&mut self, repositories: impl IntoIterator<Item = MavenRepository>) {
        for repository in repositories {
            if self
                .repositories
                .iter()
                .all(|existing| existing.uri != repository.uri)
            {
                self.repositories.push(repository);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{pom::tests::pom, ManagedDependency, RawPom};

    use super::*;

    use pretty_assertions::assert_eq;

    fn partial() -> PartialMaven {
        let raw = RawMaven::parse(
            br#"<project>
                <parent>
                    <groupId>org.example</groupId>
                    <artifactId>parent</artifactId>
                    <version>3.0</version>
                </parent>
                <artifactId>child</artifactId>
                <packaging>pom</packaging>
            </project>"#,
            "/work/child/pom.xml",
            None,
            None,
        )
        .unwrap();
        PartialMaven::new(
            Arc::new(raw),
            HashMap::from([("own".to_owned(), "own".to_owned()), ("shared".to_owned(), "own".to_owned())]),
            HashMap::from([("shared".to_owned(), "effective".to_owned())]),
        )
    }

    #[test]
    fn reserved_properties_fall_back_to_parent() {
        let partial = partial();
        let system = HashMap::new();
        assert_eq!(partial.value("project.groupId", &system).as_deref(), Some("org.example"));
        assert_eq!(partial.value("version", &system).as_deref(), Some("3.0"));
        assert_eq!(partial.value("project.parent.artifactId", &system).as_deref(), Some("parent"));
        assert_eq!(partial.value("project.packaging", &system).as_deref(), Some("pom"));
        assert_eq!(partial.value("basedir", &system).as_deref(), Some("/work/child"));
    }

    #[test]
    fn lookup_order() {
        let mut partial = partial();
        let mut bom = pom("org.example", "bom", "1.0");
        bom.properties.insert("from.bom".to_owned(), "bom".to_owned());
        bom.properties.insert("own".to_owned(), "bom".to_owned());
        partial.dependency_management = DependencyManagement::new(vec![ManagedDependency::Imported {
            group_artifact: GroupArtifact::new("org.example", "bom"),
            requested_version: "1.0".to_owned(),
            bom: Arc::new(bom),
        }]);
        let mut parent = pom("org.example", "parent", "3.0");
        parent.properties.insert("from.parent".to_owned(), "parent".to_owned());
        partial.parent = Some(Arc::new(parent));
        let system = HashMap::from([
            ("from.system".to_owned(), "system".to_owned()),
            ("from.parent".to_owned(), "system".to_owned()),
        ]);

        assert_eq!(partial.value("shared", &system).as_deref(), Some("effective"));
        assert_eq!(partial.value("own", &system).as_deref(), Some("own"));
        assert_eq!(partial.value("from.bom", &system).as_deref(), Some("bom"));
        assert_eq!(partial.value("from.parent", &system).as_deref(), Some("parent"));
        assert_eq!(partial.value("from.system", &system).as_deref(), Some("system"));
        assert_eq!(partial.value("nowhere", &system), None);
    }

    #[test]
    fn environment_properties() {
        let partial = partial();
        let path = std::env::var("PATH").ok();
        assert_eq!(partial.value("env.PATH", &HashMap::new()), path);
    }

    #[test]
    fn parent_sees_child_overrides() {
        let partial = partial();
        let properties = partial.properties_for_parent();
        assert_eq!(properties.get("own").map(String::as_str), Some("own"));
        assert_eq!(properties.get("shared").map(String::as_str), Some("effective"));
    }

    #[test]
    fn repositories_are_deduplicated() {
        let mut partial = PartialMaven::new(Arc::new(RawMaven::new("pom.xml", None, RawPom::default())), HashMap::new(), HashMap::new());
        partial.add_repositories([MavenRepository::maven_central()]);
        partial.add_repositories([
            MavenRepository::new("other", "https://repo.example.com"),
            MavenRepository::new("central-copy", "https://repo.maven.apache.org/maven2/"),
        ]);
        assert_eq!(partial.repositories.len(), 2);
    }
}
