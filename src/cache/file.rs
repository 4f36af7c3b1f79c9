use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    cache::{memory::InMemoryPomCache, CacheResult, MavenPomCache},
    flock::FileLock,
    model::{
        GroupArtifactVersion, MavenMetadata, MavenRepository, RawPom,
        ResolvedGroupArtifactVersion,
    },
};

const NORMALIZED_REPOSITORY_FILE: &str = "repository.toml";
/// Maven's default `daily` update policy.
const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// POM cache persisted under a directory, one subdirectory per repository.
///
/// Negative results and POMs from `file:` repositories live in memory only. Metadata on
/// disk is only used while younger than the metadata TTL, a day by default, so newly
/// published versions show up in ranges and `LATEST`/`RELEASE` without clearing the cache.
pub struct FileSystemPomCache {
    location: PathBuf,
    metadata_ttl: Duration,
    memory: InMemoryPomCache,
    _lock: FileLock,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache location {location} does not exist")]
    BadLocation { location: String },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Cannot serialize cache entry: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Cannot read cache entry: {0}")]
    Deserialize(#[from] toml::de::Error),
}

impl FileSystemPomCache {
    pub fn new(location: PathBuf) -> Result<FileSystemPomCache, CacheError> {
        if location.exists() {
            if !location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: location.to_str().unwrap_or("").to_string(),
                });
            }
        } else {
            std::fs::create_dir_all(&location)?;
        }

        let lock = Self::acquire_lock(&location)?;

        Ok(FileSystemPomCache {
            location,
            metadata_ttl: DEFAULT_METADATA_TTL,
            memory: InMemoryPomCache::new(),
            _lock: lock,
        })
    }

    pub fn with_metadata_ttl(mut self, metadata_ttl: Duration) -> Self {
        self.metadata_ttl = metadata_ttl;
        self
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.memory.clear();
        if self.location.exists() {
            info!("Clearing pomfetch cache {}.", &self.location.display());
            for entry in std::fs::read_dir(&self.location)? {
                let path = entry?.path();
                if path.file_name().is_some_and(|name| name == ".lock") {
                    continue;
                }
                if path.is_dir() {
                    std::fs::remove_dir_all(&path)?;
                } else {
                    std::fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }

    fn acquire_lock(location: &Path) -> Result<FileLock, CacheError> {
        let location = location.join(".lock");
        debug!(
            "Acquiring a lock on the cache location: {}",
            location.display()
        );
        let lock = FileLock::new(&location)?;
        info!("Acquired a lock on the cache location");
        Ok(lock)
    }

    fn repository_directory(&self, repository: &str) -> PathBuf {
        let name = repository
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect::<String>();
        self.location.join(name)
    }

    fn pom_path(&self, gav: &ResolvedGroupArtifactVersion) -> PathBuf {
        self.repository_directory(&gav.repository)
            .join(format!("{}.toml", gav.pom_path()))
    }

    fn metadata_path(&self, repository: &str, gav: &GroupArtifactVersion) -> Option<PathBuf> {
        let mut path = self
            .repository_directory(repository)
            .join(gav.group_artifact()?.path());
        if let Some(version) = &gav.version {
            path.push(version);
        }
        path.push("maven-metadata.toml");
        Some(path)
    }

    fn normalized_path(&self, repository: &MavenRepository) -> PathBuf {
        self.repository_directory(&repository.uri)
            .join(NORMALIZED_REPOSITORY_FILE)
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        trace!("Reading cache entry {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&text)?))
    }

    fn write<T: Serialize>(&self, repository: &str, path: &Path, value: &T) -> Result<(), CacheError> {
        let directory = self.repository_directory(repository);
        std::fs::create_dir_all(&directory)?;
        let _lock = FileLock::new(&directory.join(".lock"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        trace!("Writing cache entry {}", path.display());
        std::fs::write(path, toml::to_string(value)?)?;
        Ok(())
    }

    /// Memory first, then disk. Unreadable entries count as misses.
    fn lookup<T, F, P>(&self, memory: CacheResult<T>, path: Option<PathBuf>, remember: F, postprocess: P) -> CacheResult<T>
    where
        T: DeserializeOwned + Clone,
        F: FnOnce(&T),
        P: FnOnce(T) -> T,
    {
        if !matches!(memory, CacheResult::Miss) {
            return memory;
        }
        let Some(path) = path else {
            return CacheResult::Miss;
        };
        match Self::read::<T>(&path) {
            Ok(Some(value)) => {
                let value = postprocess(value);
                remember(&value);
                CacheResult::Hit(value)
            }
            Ok(None) => CacheResult::Miss,
            Err(error) => {
                warn!("Ignoring cache entry {}: {}", path.display(), error);
                CacheResult::Miss
            }
        }
    }
}

impl MavenPomCache for FileSystemPomCache {
    fn pom(&self, gav: &ResolvedGroupArtifactVersion) -> CacheResult<RawPom> {
        let path = (!is_file_repository(&gav.repository)).then(|| self.pom_path(gav));
        self.lookup(
            self.memory.pom(gav),
            path,
            |pom| self.memory.put_pom(gav, Some(pom)),
            |pom: RawPom| pom.with_snapshot_version(gav.dated_snapshot_version.clone()),
        )
    }

    fn put_pom(&self, gav: &ResolvedGroupArtifactVersion, pom: Option<&RawPom>) {
        self.memory.put_pom(gav, pom);
        let Some(pom) = pom else {
            return;
        };
        if is_file_repository(&gav.repository) {
            return;
        }
        if let Err(error) = self.write(&gav.repository, &self.pom_path(gav), pom) {
            warn!("Failed to cache POM {}: {}", gav, error);
        }
    }

    fn metadata(&self, repository: &str, gav: &GroupArtifactVersion) -> CacheResult<MavenMetadata> {
        let path = if is_file_repository(repository) {
            None
        } else {
            self.metadata_path(repository, gav)
                .filter(|path| is_younger_than(path, self.metadata_ttl))
        };
        self.lookup(
            self.memory.metadata(repository, gav),
            path,
            |metadata| self.memory.put_metadata(repository, gav, Some(metadata)),
            |metadata| metadata,
        )
    }

    fn put_metadata(
        &self,
        repository: &str,
        gav: &GroupArtifactVersion,
        metadata: Option<&MavenMetadata>,
    ) {
        self.memory.put_metadata(repository, gav, metadata);
        let (Some(metadata), Some(path)) = (metadata, self.metadata_path(repository, gav)) else {
            return;
        };
        if is_file_repository(repository) {
            return;
        }
        if let Err(error) = self.write(repository, &path, metadata) {
            warn!("Failed to cache metadata for {}: {}", gav, error);
        }
    }

    fn normalized_repository(&self, repository: &MavenRepository) -> CacheResult<MavenRepository> {
        self.lookup(
            self.memory.normalized_repository(repository),
            Some(self.normalized_path(repository)),
            |normalized| {
                self.memory
                    .put_normalized_repository(repository, Some(normalized))
            },
            |normalized| normalized,
        )
    }

    fn put_normalized_repository(
        &self,
        repository: &MavenRepository,
        normalized: Option<&MavenRepository>,
    ) {
        self.memory.put_normalized_repository(repository, normalized);
        let Some(normalized) = normalized else {
            return;
        };
        if let Err(error) = self.write(&repository.uri, &self.normalized_path(repository), normalized) {
            warn!("Failed to cache repository {}: {}", repository.uri, error);
        }
    }
}

fn is_file_repository(repository: &str) -> bool {
    repository.starts_with("file:")
}

fn is_younger_than(path: &Path, ttl: Duration) -> bool {
    let age = std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok());
    match age {
        Some(age) if age < ttl => true,
        Some(_) => {
            debug!("Cached metadata {} has expired", path.display());
            false
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    use pretty_assertions::assert_eq;

    fn gav(repository: &str) -> ResolvedGroupArtifactVersion {
        ResolvedGroupArtifactVersion {
            repository: repository.to_owned(),
            group_id: "org.example".to_owned(),
            artifact_id: "lib".to_owned(),
            version: "1.0".to_owned(),
            dated_snapshot_version: None,
        }
    }

    fn pom() -> RawPom {
        RawPom {
            group_id: Some("org.example".to_owned()),
            artifact_id: Some("lib".to_owned()),
            version: Some("1.0".to_owned()),
            properties: BTreeMap::from([("answer".to_owned(), "42".to_owned())]),
            ..RawPom::default()
        }
    }

    #[test]
    fn poms_survive_a_new_cache_instance() {
        let directory = tempfile::tempdir().unwrap();
        let gav = gav("https://repo.example.com/maven2");
        {
            let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
            cache.put_pom(&gav, Some(&pom()));
        }
        let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
        assert_eq!(cache.pom(&gav), CacheResult::Hit(pom()));
    }

    #[test]
    fn negatives_are_not_persisted() {
        let directory = tempfile::tempdir().unwrap();
        let gav = gav("https://repo.example.com/maven2");
        {
            let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
            cache.put_pom(&gav, None);
            assert_eq!(cache.pom(&gav), CacheResult::Negative);
        }
        let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
        assert_eq!(cache.pom(&gav), CacheResult::Miss);
    }

    #[test]
    fn file_repository_poms_stay_in_memory() {
        let directory = tempfile::tempdir().unwrap();
        let gav = gav("file:///home/user/.m2/repository");
        {
            let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
            cache.put_pom(&gav, Some(&pom()));
            assert_eq!(cache.pom(&gav), CacheResult::Hit(pom()));
        }
        let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
        assert_eq!(cache.pom(&gav), CacheResult::Miss);
    }

    #[test]
    fn metadata_and_repositories_persist() {
        let directory = tempfile::tempdir().unwrap();
        let repository = MavenRepository::new("example", "http://repo.example.com");
        let secured = repository.with_uri("https://repo.example.com");
        let coordinates = GroupArtifactVersion::without_version("org.example", "lib");
        let metadata = MavenMetadata {
            versions: vec!["1.0".to_owned(), "1.1".to_owned()],
            snapshot: None,
        };
        {
            let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
            cache.put_metadata(&repository.uri, &coordinates, Some(&metadata));
            cache.put_normalized_repository(&repository, Some(&secured));
        }
        let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
        assert_eq!(cache.metadata(&repository.uri, &coordinates), CacheResult::Hit(metadata));
        assert_eq!(cache.normalized_repository(&repository), CacheResult::Hit(secured));
    }

    #[test]
    fn expired_metadata_is_refetched() {
        let directory = tempfile::tempdir().unwrap();
        let repository = "https://repo.example.com/maven2";
        let coordinates = GroupArtifactVersion::without_version("org.example", "lib");
        let metadata = MavenMetadata {
            versions: vec!["1.0".to_owned()],
            snapshot: None,
        };
        {
            let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
            cache.put_metadata(repository, &coordinates, Some(&metadata));
            assert_eq!(cache.metadata(repository, &coordinates), CacheResult::Hit(metadata));
        }
        let cache = FileSystemPomCache::new(directory.path().to_path_buf())
            .unwrap()
            .with_metadata_ttl(Duration::ZERO);
        assert_eq!(cache.metadata(repository, &coordinates), CacheResult::Miss);
    }

    #[test]
    fn clear_removes_entries() {
        let directory = tempfile::tempdir().unwrap();
        let gav = gav("https://repo.example.com/maven2");
        let cache = FileSystemPomCache::new(directory.path().to_path_buf()).unwrap();
        cache.put_pom(&gav, Some(&pom()));
        cache.clear().unwrap();
        assert_eq!(cache.pom(&gav), CacheResult::Miss);
    }

    #[test]
    fn reject_file_as_location() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let error = FileSystemPomCache::new(file.path().to_path_buf()).err().unwrap();
        assert!(matches!(error, CacheError::BadLocation { .. }));
    }
}
