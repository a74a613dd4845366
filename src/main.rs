use buildscope::cli::commands::{CliArgs, Commands};
use buildscope::cli::handlers::{handle_detect, handle_tag, handle_validate};
use buildscope::util::logging::{init_logging, parse_level, LoggingConfig};
use buildscope::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(logging_config(&args));

    debug!("buildscope v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(detect_args, args.quiet).await,
        Commands::Validate(validate_args) => handle_validate(validate_args, args.quiet).await,
        Commands::Tag(tag_args) => handle_tag(tag_args).await,
    };

    std::process::exit(exit_code);
}

/// `--log-level` wins over `-v`/`-q`, which win over `BUILDSCOPE_LOG_LEVEL`.
fn logging_config(args: &CliArgs) -> LoggingConfig {
    let mut config = LoggingConfig::from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    config
}
