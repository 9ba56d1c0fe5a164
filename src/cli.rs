//! Command-line arguments.

use crate::config::DEFAULT_SECRET_VERSION;
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;

/// Send a Pushover notification using credentials kept in Secret Manager.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "abandonship")]
#[command(version = concat!("v", env!("CARGO_PKG_VERSION")))]
#[command(about = "Send a Pushover notification using credentials kept in Secret Manager", long_about = None)]
pub struct InvocationArgs {
    /// Message body
    #[arg(short = 'm', long = "message", value_parser = NonEmptyStringValueParser::new())]
    pub message: String,

    /// Secret name
    #[arg(short = 's', long = "secret", value_parser = NonEmptyStringValueParser::new())]
    pub secret_name: String,

    /// Secret version
    #[arg(short = 'v', long = "secret-version", default_value = DEFAULT_SECRET_VERSION)]
    pub secret_version: String,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,
}
