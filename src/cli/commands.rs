use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Change detector for monorepo container images published to GHCR
#[derive(Parser, Debug)]
#[command(
    name = "buildscope",
    about = "Change detector for monorepo container images published to GHCR",
    version,
    author,
    long_about = "buildscope compares two git revisions of a monorepo and decides which \
                  base images and compose services must be rebuilt, which can be retagged \
                  from an earlier commit, and which checks apply to each of them."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Detect what must be built or retagged between two revisions",
        long_about = "Maps changed files to base images and services, propagates base image \
                      changes to dependent services and asks the registry which remaining \
                      services can be retagged instead of rebuilt.\n\n\
                      Examples:\n  \
                      buildscope detect --base-ref origin/master\n  \
                      buildscope detect --base-ref origin/master --format json\n  \
                      buildscope detect --base-ref $BASE_SHA --target-sha $BASE_SHA --fork"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Validate base image and service build files",
        long_about = "Checks every base image build file for exact upstream mirroring and \
                      every build file for variables in FROM instructions.\n\n\
                      Examples:\n  \
                      buildscope validate\n  \
                      buildscope validate --base-images-only --format json"
    )]
    Validate(ValidateArgs),

    #[command(about = "Print the base image directory to registry tag mapping")]
    Tag(TagArgs),
}

/// Repository location and overrides shared by every command.
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    #[arg(
        long,
        value_name = "PATH",
        default_value = ".",
        help = "Path to the repository root"
    )]
    pub repo: PathBuf,

    #[arg(
        long,
        value_name = "ROOT",
        help = "Registry namespace images are published under (overrides BUILDSCOPE_REGISTRY_ROOT)"
    )]
    pub registry_root: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Base image directory relative to the repository (overrides BUILDSCOPE_BASE_IMAGES_DIR)"
    )]
    pub base_images_dir: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[arg(long, value_name = "REF", help = "Revision the change set is measured from")]
    pub base_ref: String,

    #[arg(long, value_name = "REF", default_value = "HEAD", help = "Revision under test")]
    pub head_ref: String,

    #[arg(
        long,
        value_name = "SHA",
        help = "Commit whose published images may be retagged (defaults to the commit the base ref points at)"
    )]
    pub target_sha: Option<String>,

    #[arg(long, help = "The change comes from a fork without registry write access")]
    pub fork: bool,

    #[arg(
        long,
        value_name = "FILE",
        env = "GITHUB_OUTPUT",
        help = "Append step outputs to this file"
    )]
    pub github_output: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format for stdout"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Build every candidate service without asking the registry")]
    pub skip_registry: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[arg(long, help = "Only check base image build files (no compose resolution)")]
    pub base_images_only: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct TagArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
    Github,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
            OutputFormatArg::Github => super::output::OutputFormat::Github,
        }
    }
}
