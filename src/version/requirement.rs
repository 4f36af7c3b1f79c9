use std::{
    str::FromStr,
    sync::{Arc, OnceLock},
};

use serde::Deserialize;

use super::{compare_versions, spec::VersionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Maven semantics: the declaration closest to the root wins.
    #[default]
    #[serde(alias = "nearest-wins")]
    Nearest,
    /// Gradle semantics: the highest requested version wins.
    #[serde(alias = "newest-wins")]
    Newest,
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "nearest-wins" => Ok(ResolutionStrategy::Nearest),
            "newest" | "newest-wins" => Ok(ResolutionStrategy::Newest),
            other => Err(format!("unknown resolution strategy `{other}`")),
        }
    }
}

/// Every version requested for one group and artifact within one scope.
#[derive(Debug, Clone)]
pub enum VersionRequirement {
    Nearest(NearestWins),
    Newest(NewestWins),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    /// Declared by the root POM; always wins.
    Direct(VersionSpec),
    Transitive(VersionSpec),
}

impl Requirement {
    fn spec(&self) -> &VersionSpec {
        match self {
            Requirement::Direct(spec) | Requirement::Transitive(spec) => spec,
        }
    }
}

/// Requests form a persistent list from the farthest back to the nearest, so adding a
/// deeper request never disturbs what earlier holders of the chain observe.
#[derive(Debug, Clone)]
pub struct NearestWins {
    nearer: Option<Arc<NearestWins>>,
    requirement: Requirement,
    selected: OnceLock<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewestWins {
    specs: Vec<VersionSpec>,
    selected: OnceLock<Option<String>>,
}

impl VersionRequirement {
    pub fn from_version(requested: &str, strategy: ResolutionStrategy, depth: usize) -> Self {
        let spec = VersionSpec::parse(requested);
        match strategy {
            ResolutionStrategy::Nearest => {
                let requirement = if depth == 0 {
                    Requirement::Direct(spec)
                } else {
                    Requirement::Transitive(spec)
                };
                VersionRequirement::Nearest(NearestWins {
                    nearer: None,
                    requirement,
                    selected: OnceLock::new(),
                })
            }
            ResolutionStrategy::Newest => VersionRequirement::Newest(NewestWins {
                specs: vec![spec],
                selected: OnceLock::new(),
            }),
        }
    }

    /// Adds a request found deeper in the graph than every request already present.
    pub fn add_requirement(self, requested: &str) -> Self {
        let spec = VersionSpec::parse(requested);
        match self {
            VersionRequirement::Nearest(nearest) => {
                if nearest.has_direct() || nearest.contains(&spec) {
                    return VersionRequirement::Nearest(nearest);
                }
                VersionRequirement::Nearest(NearestWins {
                    nearer: Some(Arc::new(nearest)),
                    requirement: Requirement::Transitive(spec),
                    selected: OnceLock::new(),
                })
            }
            VersionRequirement::Newest(mut newest) => {
                if !newest.specs.contains(&spec) {
                    newest.specs.push(spec);
                    newest.selected = OnceLock::new();
                }
                VersionRequirement::Newest(newest)
            }
        }
    }

    /// The selected version. `available_versions` is only called when a range or dynamic
    /// version has to be decided and nothing is cached yet.
    pub fn resolve<F>(&self, available_versions: F) -> Option<String>
    where
        F: FnOnce() -> Vec<String>,
    {
        match self {
            VersionRequirement::Nearest(nearest) => nearest
                .selected
                .get_or_init(|| nearest.select(available_versions))
                .clone(),
            VersionRequirement::Newest(newest) => newest
                .selected
                .get_or_init(|| newest.select(available_versions))
                .clone(),
        }
    }
}

impl NearestWins {
    /// Links from nearest to farthest.
    fn links(&self) -> Vec<&NearestWins> {
        let mut links = Vec::new();
        let mut link = Some(self);
        while let Some(current) = link {
            links.push(current);
            link = current.nearer.as_deref();
        }
        links.reverse();
        links
    }

    fn has_direct(&self) -> bool {
        self.links()
            .iter()
            .any(|link| matches!(link.requirement, Requirement::Direct(_)))
    }

    fn contains(&self, spec: &VersionSpec) -> bool {
        self.links()
            .iter()
            .any(|link| link.requirement.spec() == spec)
    }

    fn select<F: FnOnce() -> Vec<String>>(&self, available_versions: F) -> Option<String> {
        let mut nearest_soft = None;
        let mut nearest_hard = None;
        for link in self.links() {
            match &link.requirement {
                Requirement::Direct(VersionSpec::Soft(version)) => return Some(version.clone()),
                Requirement::Direct(hard) => return hard.select(&available_versions()),
                Requirement::Transitive(VersionSpec::Soft(version)) => {
                    nearest_soft.get_or_insert(version);
                }
                Requirement::Transitive(hard) => {
                    nearest_hard.get_or_insert(hard);
                }
            }
        }
        match nearest_hard {
            Some(hard) => hard.select(&available_versions()),
            None => nearest_soft.cloned(),
        }
    }
}

impl NewestWins {
    /// Highest available version satisfying any spec. Without a match, the first soft
    /// version requested, as nearest-wins would pick.
    fn select<F: FnOnce() -> Vec<String>>(&self, available_versions: F) -> Option<String> {
        let available = available_versions();
        self.specs
            .iter()
            .filter_map(|spec| spec.select(&available))
            .max_by(|a, b| compare_versions(a, b))
            .or_else(|| {
                self.specs.iter().find_map(|spec| match spec {
                    VersionSpec::Soft(version) => Some(version.clone()),
                    _ => None,
                })
            })
    }
}
