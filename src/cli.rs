use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pkgup",
    about = "pkgup - plan npm dependency updates with peer dependency validation",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and apply dependency updates
    Update {
        /// Packages to update, as `name` or `name@versionOrTag`
        #[arg(value_name = "PACKAGES")]
        packages: Vec<String>,

        /// Update every dependency declared in package.json
        #[arg(long)]
        all: bool,

        /// Use the `next` dist-tag instead of `latest`
        #[arg(long)]
        next: bool,

        /// Apply the plan even when peer dependency checks fail
        #[arg(long)]
        force: bool,

        /// Only schedule migrations; leave package.json untouched
        #[arg(long)]
        migrate_only: bool,

        /// Version to migrate from (requires a single package)
        #[arg(long, value_name = "VERSION", requires = "migrate_only")]
        from: Option<String>,

        /// Version to migrate to (defaults to the installed version)
        #[arg(long, value_name = "VERSION", requires = "from")]
        to: Option<String>,

        /// Registry base URL to fetch package metadata from
        #[arg(long, value_name = "URL")]
        registry: Option<String>,
    },

    /// Report available updates without applying anything
    Check {
        /// Prefer the `next` dist-tag when a package publishes one
        #[arg(long)]
        next: bool,

        /// Registry base URL to fetch package metadata from
        #[arg(long, value_name = "URL")]
        registry: Option<String>,
    },
}
