pub mod blueprint;
pub mod client;
pub mod config;
pub mod constants;
pub mod creator;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod retry;
pub mod scenarios;
pub mod util;

pub use client::{HttpManagerClient, ManagerClient};
pub use creator::ConcurrentResourceCreator;
pub use error::{Result, ScaleTestError};
