use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rehost", about = "Migrate Forge mod archives to Fabric", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Migrate every archive in the input directory
    Migrate(MigrateArgs),
    /// Rename the symbols of a single archive
    Remap(RemapArgs),
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Run configuration in TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Reference archive; repeat for more
    #[arg(long)]
    pub classpath: Vec<PathBuf>,
    /// Translation table in tiny format
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Keep table entries for classes missing from the classpath
    #[arg(long)]
    pub no_prune: bool,
}

#[derive(Args)]
pub struct RemapArgs {
    #[arg(long)]
    pub mappings: PathBuf,
    #[arg(long)]
    pub input: PathBuf,
    #[arg(long)]
    pub output: PathBuf,
    #[arg(long)]
    pub classpath: Vec<PathBuf>,
    #[arg(long, default_value = "srg")]
    pub from: String,
    #[arg(long, default_value = "intermediary")]
    pub to: String,
}
