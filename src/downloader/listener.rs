use crate::{
    downloader::DownloadError,
    model::{GroupArtifactVersion, MavenRepository, RawMaven, ResolvedGroupArtifactVersion},
};

/// Observer of downloader activity. Every method defaults to doing nothing.
pub trait ResolutionEventListener: Send + Sync {
    fn download_success(&self, _gav: &ResolvedGroupArtifactVersion, _containing: Option<&RawMaven>) {}

    fn download_error(&self, _gav: &GroupArtifactVersion, _error: &DownloadError) {}

    fn repository_accessed(&self, _repository: &MavenRepository) {}
}

pub struct NoopListener;

impl ResolutionEventListener for NoopListener {}
