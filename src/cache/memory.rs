use dashmap::DashMap;

use crate::{
    cache::{CacheResult, MavenPomCache},
    model::{
        GroupArtifactVersion, MavenMetadata, MavenRepository, RawPom,
        ResolvedGroupArtifactVersion,
    },
};

#[derive(Debug, Default)]
pub struct InMemoryPomCache {
    poms: DashMap<ResolvedGroupArtifactVersion, Option<RawPom>>,
    metadata: DashMap<(String, GroupArtifactVersion), Option<MavenMetadata>>,
    normalized_repositories: DashMap<String, Option<MavenRepository>>,
}

impl InMemoryPomCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.poms.clear();
        self.metadata.clear();
        self.normalized_repositories.clear();
    }
}

impl MavenPomCache for InMemoryPomCache {
    fn pom(&self, gav: &ResolvedGroupArtifactVersion) -> CacheResult<RawPom> {
        CacheResult::from_entry(self.poms.get(gav).map(|entry| entry.value().clone()))
    }

    fn put_pom(&self, gav: &ResolvedGroupArtifactVersion, pom: Option<&RawPom>) {
        self.poms.insert(gav.clone(), pom.cloned());
    }

    fn metadata(&self, repository: &str, gav: &GroupArtifactVersion) -> CacheResult<MavenMetadata> {
        CacheResult::from_entry(
            self.metadata
                .get(&(repository.to_owned(), gav.clone()))
                .map(|entry| entry.value().clone()),
        )
    }

    fn put_metadata(
        &self,
        repository: &str,
        gav: &GroupArtifactVersion,
        metadata: Option<&MavenMetadata>,
    ) {
        self.metadata
            .insert((repository.to_owned(), gav.clone()), metadata.cloned());
    }

    fn normalized_repository(&self, repository: &MavenRepository) -> CacheResult<MavenRepository> {
        CacheResult::from_entry(
            self.normalized_repositories
                .get(&repository.uri)
                .map(|entry| entry.value().clone()),
        )
    }

    fn put_normalized_repository(
        &self,
        repository: &MavenRepository,
        normalized: Option<&MavenRepository>,
    ) {
        self.normalized_repositories
            .insert(repository.uri.clone(), normalized.cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn gav() -> ResolvedGroupArtifactVersion {
        ResolvedGroupArtifactVersion {
            repository: "https://repo.example.com".to_owned(),
            group_id: "org.example".to_owned(),
            artifact_id: "lib".to_owned(),
            version: "1.0".to_owned(),
            dated_snapshot_version: None,
        }
    }

    #[test]
    fn three_states() {
        let cache = InMemoryPomCache::new();
        assert_eq!(cache.pom(&gav()), CacheResult::Miss);

        cache.put_pom(&gav(), None);
        assert_eq!(cache.pom(&gav()), CacheResult::Negative);

        let pom = RawPom {
            artifact_id: Some("lib".to_owned()),
            ..RawPom::default()
        };
        cache.put_pom(&gav(), Some(&pom));
        assert_eq!(cache.pom(&gav()), CacheResult::Hit(pom));

        cache.clear();
        assert_eq!(cache.pom(&gav()), CacheResult::Miss);
    }

    #[test]
    fn normalized_repositories_keyed_by_uri() {
        let cache = InMemoryPomCache::new();
        let original = MavenRepository::new("example", "http://repo.example.com");
        let secured = original.with_uri("https://repo.example.com");
        cache.put_normalized_repository(&original, Some(&secured));
        assert_eq!(cache.normalized_repository(&original), CacheResult::Hit(secured));

        let unreachable = MavenRepository::new("gone", "https://gone.example.com");
        cache.put_normalized_repository(&unreachable, None);
        assert_eq!(cache.normalized_repository(&unreachable), CacheResult::Negative);
    }
}
