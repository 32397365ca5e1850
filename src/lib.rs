pub mod analysis;
pub mod args;
pub mod config;
pub mod derivative;
pub mod detect;
pub mod error;
pub mod filter;
pub mod recording;
pub mod results_log;
pub mod roi;
pub mod score;
pub mod session;
pub mod threshold;
pub mod util;

pub use error::{Error, Result};
