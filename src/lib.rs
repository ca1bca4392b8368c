mod archive;
mod cache;
mod config;
mod error;
mod fetch;
mod parse;
mod reconcile;
mod types;
mod utils;

#[cfg(test)]
mod test_utils;

pub use archive::ClimateArchive;
pub use config::*;
pub use error::ClimateError;

pub use cache::error::CacheError;
pub use cache::store::CacheStore;

pub use fetch::error::FetchError;
pub use fetch::fetcher::RemoteFetcher;
pub use fetch::source::{BlobSource, HttpSource};

pub use parse::error::ParseError;
pub use parse::parser::parse_blob;

pub use reconcile::merger::merge;

pub use types::blob::*;
pub use types::bucket::*;
pub use types::granularity::Granularity;
pub use types::merged::*;
pub use types::observation::*;
pub use types::parameter::Parameter;
pub use types::station::*;

pub use utils::get_cache_dir;
