use std::error::Error;

use clap::Parser;
use pomfetch::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::render_tree,
    },
    PomFetch,
};

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();

    let mut builder = PomFetch::builder()
        .lock_file_name(&cli_args.lockfile_location)
        .active_profiles(cli_args.profiles)
        .resolve_optional(cli_args.resolve_optional)
        .offline(cli_args.offline);
    if let Some(cache_directory) = &cli_args.cache_directory {
        builder = builder.cache_directory(cache_directory);
    }
    if let Some(strategy) = cli_args.strategy {
        builder = builder.strategy(strategy);
    }
    for (key, value) in cli_args.properties {
        builder = builder.system_property(key, value);
    }
    let pomfetch = builder.try_build()?;

    match cli_args.cmd {
        Command::Resolve => {
            for pom in pomfetch.resolve(&cli_args.pom)? {
                print!("{}", render_tree(&pom));
            }
            Ok(())
        }
        Command::Lock => {
            let lock_file = pomfetch.lock(&cli_args.pom)?;
            log::info!(
                "Locked {} dependencies in {}",
                lock_file.dependencies.len(),
                pomfetch.lock_file_path().display()
            );
            Ok(())
        }
        Command::ClearCache => pomfetch.clear_cache(),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
