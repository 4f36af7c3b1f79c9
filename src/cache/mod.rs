mod file;
mod memory;

use crate::model::{
    GroupArtifactVersion, MavenMetadata, MavenRepository, RawPom, ResolvedGroupArtifactVersion,
};

pub use file::{CacheError, FileSystemPomCache};
pub use memory::InMemoryPomCache;

/// Lookup outcome that tells "never asked" apart from "known to be absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult<T> {
    Miss,
    Negative,
    Hit(T),
}

impl<T> CacheResult<T> {
    pub fn from_entry(entry: Option<Option<T>>) -> Self {
        match entry {
            None => CacheResult::Miss,
            Some(None) => CacheResult::Negative,
            Some(Some(value)) => CacheResult::Hit(value),
        }
    }
}

/// Storage for downloaded POMs, metadata and repository normalization outcomes.
/// Writing `None` records a negative result.
pub trait MavenPomCache: Send + Sync {
    fn pom(&self, gav: &ResolvedGroupArtifactVersion) -> CacheResult<RawPom>;

    fn put_pom(&self, gav: &ResolvedGroupArtifactVersion, pom: Option<&RawPom>);

    fn metadata(&self, repository: &str, gav: &GroupArtifactVersion) -> CacheResult<MavenMetadata>;

    fn put_metadata(
        &self,
        repository: &str,
        gav: &GroupArtifactVersion,
        metadata: Option<&MavenMetadata>,
    );

    fn normalized_repository(&self, repository: &MavenRepository) -> CacheResult<MavenRepository>;

    fn put_normalized_repository(
        &self,
        repository: &MavenRepository,
        normalized: Option<&MavenRepository>,
    );
}
