use std::{
    collections::{BTreeSet, HashMap},
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::model::{GroupArtifact, GroupArtifactVersion, MavenRepository, RawMaven, Scope};

/// One POM to process, reached through one particular edge.
///
/// Equality and hashing only look at the fields that change the outcome of processing:
/// scope, POM, exclusions, optionality, classifier, type and requested version.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionTask {
    pub scope: Scope,
    pub raw_maven: Arc<RawMaven>,
    pub exclusions: BTreeSet<GroupArtifact>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub requested_version: Option<String>,

    pub depth: usize,
    /// Properties handed down by the POM that declared this one as its parent.
    pub effective_properties: HashMap<String, String>,
    pub repositories: Vec<MavenRepository>,
    /// Parent chain walked so far, including this POM.
    pub seen_parents: Vec<GroupArtifactVersion>,
}

impl ResolutionTask {
    pub fn root(
        raw_maven: Arc<RawMaven>,
        effective_properties: HashMap<String, String>,
        repositories: Vec<MavenRepository>,
        mut seen_parents: Vec<GroupArtifactVersion>,
    ) -> Self {
        let gav = raw_maven.gav();
        if !seen_parents.contains(&gav) {
            seen_parents.push(gav);
        }
        Self {
            scope: Scope::None,
            raw_maven,
            exclusions: BTreeSet::new(),
            optional: false,
            classifier: None,
            type_: None,
            requested_version: None,
            depth: 0,
            effective_properties,
            repositories,
            seen_parents,
        }
    }

    /// The same edge pointing at a different POM.
    pub fn retarget(&self, raw_maven: Arc<RawMaven>) -> Self {
        Self {
            seen_parents: vec![raw_maven.gav()],
            raw_maven,
            ..self.clone()
        }
    }

    #[allow(clippy::type_complexity)]
    fn key(
        &self,
    ) -> (
        Scope,
        &RawMaven,
        &BTreeSet<GroupArtifact>,
        bool,
        Option<&str>,
        Option<&str>,
        Option<&str>,
    ) {
        (
            self.scope,
            &self.raw_maven,
            &self.exclusions,
            self.optional,
            self.classifier.as_deref(),
            self.type_.as_deref(),
            self.requested_version.as_deref(),
        )
    }
}

impl PartialEq for ResolutionTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ResolutionTask {}

impl Hash for ResolutionTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
