use std::path::PathBuf;

use clap::Parser;

use crate::version::ResolutionStrategy;

/// Resolves the dependency graph of Maven POMs.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// POM files to resolve. May be given several times.
    #[clap(long, global = true, default_value = "pom.xml")]
    pub pom: Vec<PathBuf>,
    #[clap(short, long, global = true, default_value = "pomfetch.lock")]
    pub lockfile_location: PathBuf,
    /// Defaults to $HOME/.pomfetch/cache
    #[clap(short, long, global = true, env = "POMFETCH_CACHE_DIR")]
    pub cache_directory: Option<PathBuf>,
    /// Profiles to activate, `!id` to deactivate.
    #[clap(short = 'P', long = "profile", global = true, value_delimiter = ',')]
    pub profiles: Vec<String>,
    /// `nearest` for Maven semantics, `newest` for Gradle semantics.
    #[clap(long, global = true)]
    pub strategy: Option<ResolutionStrategy>,
    /// Follow optional dependencies of transitive dependencies.
    #[clap(long, global = true)]
    pub resolve_optional: bool,
    /// Only use file repositories.
    #[clap(long, global = true)]
    pub offline: bool,
    /// System properties, `key=value`.
    #[clap(short = 'D', long = "define", global = true, value_parser = parse_property)]
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Parser)]
pub enum Command {
    /// Prints the dependency tree of each POM
    Resolve,
    /// Writes the resolved dependencies of all POMs to the lock file
    Lock,
    /// Deletes the POM cache
    ClearCache,
}

fn parse_property(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) => Ok((key.to_owned(), value.to_owned())),
        None => Ok((value.to_owned(), "true".to_owned())),
    }
}
