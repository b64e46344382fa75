//! CLI argument definitions for the relmesh setup tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "relmesh",
    version,
    about = "relmesh - dependency-aware release-mesh builder",
    long_about = "Build merged release meshes from source collections in a scene file.\n\n\
                  Source collections (src_/subsrc_ prefixes) are scheduled child-first,\n\
                  each object is transformed by its authored commands, and the results\n\
                  are merged into one release object per collection."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate the setup tree around an object without touching the scene.
    Check(CheckArgs),

    /// Build release objects for the collections that need one.
    Setup(SetupArgs),

    /// Rename a release object's sub-elements toward an export convention.
    Translate(TranslateArgs),

    /// Inspect or edit the scene's spec registry.
    Specs(SpecsArgs),

    /// Inspect or edit an object's command list.
    Commands(CommandsArgs),
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the scene JSON file.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Object whose setup tree is validated.
    #[arg(long = "object", value_name = "NAME")]
    pub object: String,
}

#[derive(Parser)]
pub struct SetupArgs {
    /// Path to the scene JSON file.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Object that triggers the setup run.
    #[arg(long = "object", value_name = "NAME")]
    pub object: String,

    /// Rebuild every collection in the tree, fresh or not.
    #[arg(long = "all")]
    pub all: bool,

    /// Write the mutated scene here instead of back in place.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Validate and print the execution order without building anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct TranslateArgs {
    /// Path to the scene JSON file.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Release object to translate.
    #[arg(long = "object", value_name = "NAME")]
    pub object: String,

    /// Export target convention.
    #[arg(long = "mode", value_enum)]
    pub mode: TranslateModeArg,

    /// Material postfix for custom mode (e.g. "_VRC").
    #[arg(long = "postfix", value_name = "POSTFIX")]
    pub postfix: Option<String>,

    /// Bone-group profile CSV.
    #[arg(long = "bonegroup", value_name = "PATH")]
    pub bonegroup: Option<PathBuf>,

    /// Shape-key profile CSV.
    #[arg(long = "shapekey", value_name = "PATH")]
    pub shapekey: Option<PathBuf>,

    /// Write the mutated scene here instead of back in place.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct SpecsArgs {
    /// Path to the scene JSON file.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    #[command(subcommand)]
    pub action: SpecsAction,
}

#[derive(Subcommand)]
pub enum SpecsAction {
    /// List every spec and its enabled state.
    List,

    /// Register a new spec (renamed with a numeric suffix on collision).
    Add { name: String },

    /// Remove a user-defined spec.
    Remove { name: String },

    /// Enable a user-defined spec.
    Enable { name: String },

    /// Disable a user-defined spec.
    Disable { name: String },
}

#[derive(Parser)]
pub struct CommandsArgs {
    /// Path to the scene JSON file.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Object whose commands are listed or edited.
    #[arg(long = "object", value_name = "NAME")]
    pub object: String,

    #[command(subcommand)]
    pub action: CommandsAction,
}

#[derive(Subcommand)]
pub enum CommandsAction {
    /// List the commands in index order.
    List {
        /// Only show commands targeting this sub-element kind.
        #[arg(long = "scope", value_enum)]
        scope: Option<ScopeArg>,
    },

    /// Remove the command at the given index, renumbering the rest.
    Remove { index: u32 },
}

/// Sub-element kind filter for `commands list`.
#[derive(Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    VertexGroup,
    ShapeKey,
    Uv,
    Modifier,
    Material,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TranslateModeArg {
    /// Substance Painter (_SP materials).
    Sp,
    /// MikuMikuDance (_MMD materials).
    Mmd,
    /// Game engine export (_GE materials).
    Ge,
    /// Custom postfix, given with --postfix.
    Custom,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
