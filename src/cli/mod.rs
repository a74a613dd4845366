pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, DetectArgs, OutputFormatArg, RepoArgs, TagArgs, ValidateArgs};
pub use output::{OutputFormat, OutputFormatter};
