use thiserror::Error;

pub mod coordinates;
pub mod lock;
pub mod metadata;
pub mod pom;
pub mod raw;
pub mod repository;
pub mod scope;
pub mod settings;

pub use coordinates::{GroupArtifact, GroupArtifactVersion, ResolvedGroupArtifactVersion};
pub use metadata::MavenMetadata;
pub use pom::{Dependency, DependencyManagement, License, ManagedDependency, Pom};
pub use raw::{RawMaven, RawPom};
pub use repository::MavenRepository;
pub use scope::Scope;
pub use settings::MavenSettings;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading {0}")]
    IO(#[from] std::io::Error),
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unsupported lock file version {0}")]
    UnsupportedLockFileVersion(toml::Value),
    #[error("Missing lock file version")]
    MissingLockFileVersion,
    #[error("Missing required element `{0}` in {1}")]
    MissingElement(&'static str, String),
}
