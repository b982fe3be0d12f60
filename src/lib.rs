pub mod config;
pub mod deleter;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod journal;
pub mod model;
pub mod paginator;
pub mod prompt;
pub mod range;
pub mod remote;
pub mod sweeper;

pub use error::{RemoteError, Result, SweepError};
