use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the lines of the sources files
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Show one row per repository, merging lines that only differ in components
        #[arg(required = false, long, conflicts_with = "all")]
        collapsed: bool,

        /// Include comments and unparseable lines
        #[arg(required = false, short, long)]
        all: bool,
    },

    /// Add a repository, reusing existing lines where possible
    #[command(arg_required_else_help = true)]
    Add {
        /// Repository URI
        #[arg(required = true)]
        uri: String,

        /// Distribution (defaults to the configured one)
        #[arg(required = false)]
        dist: Option<String>,

        /// Components
        #[arg(required = false)]
        components: Vec<String>,

        /// Repository type: deb, deb-src, rpm or rpm-src
        #[arg(required = false, short = 't', long = "type")]
        source_type: Option<String>,

        /// Restrict to architectures
        #[arg(required = false, long, value_delimiter = ',')]
        arch: Vec<String>,

        /// Add the repository commented out
        #[arg(required = false, long)]
        disabled: bool,

        /// Trailing comment
        #[arg(required = false, long)]
        comment: Option<String>,

        /// Write the line to this file instead of the main sources list
        #[arg(required = false, short, long, value_hint = ValueHint::FilePath)]
        file: Option<String>,

        /// Insert before this line number instead of appending
        #[arg(required = false, short, long)]
        position: Option<usize>,

        /// Go through the merged view: move components away from the
        /// opposite-state line and take it over if needed
        #[arg(required = false, long)]
        collapsed: bool,
    },

    /// Enable a commented-out repository line
    #[command(arg_required_else_help = true)]
    Enable {
        /// Line numbers as shown by `list`
        #[arg(required = true)]
        lines: Vec<usize>,
    },

    /// Comment out a repository line
    #[command(arg_required_else_help = true)]
    Disable {
        /// Line numbers as shown by `list`
        #[arg(required = true)]
        lines: Vec<usize>,
    },

    /// Remove lines, or components of a repository
    #[command(arg_required_else_help = true)]
    #[clap(name = "remove", visible_alias = "rm")]
    Remove {
        /// Line numbers as shown by `list`
        #[arg(required = true)]
        lines: Vec<usize>,

        /// Only remove these components from the repository of each line
        #[arg(required = false, long, value_delimiter = ',')]
        components: Vec<String>,
    },

    /// Parse a sources.list line and show how it is understood
    #[command(arg_required_else_help = true)]
    Check {
        /// The line to check
        #[arg(required = true)]
        line: String,
    },

    /// Show repositories that belong together, like a release and its updates
    Relations,

    /// Copy every sources file to a backup
    Backup {
        /// Backup extension, defaults to the current date and time
        #[arg(required = false, short, long)]
        ext: Option<String>,
    },

    /// Restore sources files from a backup
    #[command(arg_required_else_help = true)]
    Restore {
        /// Extension given to or returned by `backup`
        #[arg(required = true)]
        ext: String,

        /// Don't ask for confirmation
        #[arg(required = false, short, long)]
        yes: bool,
    },

    /// Print the configuration file to stdout
    Config,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,

    /// View env
    Env,
}
