pub mod config;
pub mod db;
pub mod error;
pub mod ident;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod schema;
pub mod verify;
pub mod wait;

pub use config::EtlConfig;
pub use error::{EtlError, Result, Stage};
pub use pipeline::{run, RunOptions};
pub use verify::RunSummary;
