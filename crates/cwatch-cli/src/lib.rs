//! cwatch command-line interface.
//!
//! The `cwatch` binary loads a metrics file, polls every configured metric,
//! and posts a grouped status digest to Microsoft Teams, tagging the
//! watchers of any title with a violating metric.
//!
//! # Commands
//!
//! - `run`: poll forever and post a digest every cycle
//! - `once`: run one cycle and print the card
//! - `check`: validate the metrics file

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod driver;
pub mod error;
pub mod logging;
pub mod output;

pub use cli::{Cli, Commands};
pub use driver::{CycleOutcome, DriverConfig, FetchErrorPolicy, Poller};
pub use error::{CliError, Result};
