pub mod cache;
pub mod cli;
pub mod downloader;
pub mod http;
pub mod model;
pub mod resolver;
pub mod version;

mod api;
mod config;
mod flock;

pub use api::{PomFetch, PomFetchBuilder};
