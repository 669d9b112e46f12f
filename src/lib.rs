pub mod config;
pub mod error;
pub mod filter;
pub mod logger;
pub mod region;
pub mod release;
pub mod sync;

pub const PROGRAM_NAME: &str = "smartromsync";

pub use config::{Config, System, Target, TargetKind};
pub use error::SyncError;
pub use release::{ReleaseInfo, Special};
pub use sync::{SyncOptions, SyncStats, SystemSync};
