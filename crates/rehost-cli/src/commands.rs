use anyhow::Context;
use colored::Colorize;
use rehost_core::{MigrationConfig, Migrator, Reporter};
use rehost_mapping::{load_tiny, TranslationTable};
use rehost_remap::TableRemapper;
use tracing::warn;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Migrate(args) => cmd_migrate(args),
        Command::Remap(args) => cmd_remap(args),
    }
}

fn migrate_config(args: MigrateArgs) -> anyhow::Result<MigrationConfig> {
    let mut config = match &args.config {
        Some(path) => MigrationConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MigrationConfig::default(),
    };
    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(work_dir) = args.work_dir {
        config.work_dir = work_dir;
    }
    if !args.classpath.is_empty() {
        config.classpath = args.classpath;
    }
    if args.mappings.is_some() {
        config.mappings = args.mappings;
    }
    if args.no_prune {
        config.prune_mappings = false;
    }
    Ok(config)
}

fn cmd_migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let config = migrate_config(args)?;
    let table = match &config.mappings {
        Some(path) => load_tiny(path, &config.source_namespace, &config.target_namespace)
            .with_context(|| format!("loading translation table {}", path.display()))?,
        None => {
            warn!("no translation table configured, symbols keep their names");
            TranslationTable::new(
                config.source_namespace.as_str(),
                config.target_namespace.as_str(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            )
        }
    };
    // pruning against an empty classpath would drop the whole table
    let prune = config.prune_mappings && !config.classpath.is_empty();
    let mut engine = TableRemapper::new(table).with_pruning(prune);

    let reporter = Reporter::new();
    let mut migrator = Migrator::new(config, &reporter);
    let migrated = migrator.run(&mut engine).context("migration aborted")?;
    let discovered = migrator.discovered();

    let summary = format!("migrated {migrated} of {discovered} archives");
    if migrated == discovered {
        println!("{} {}", "✓".green().bold(), summary);
    } else {
        println!("{} {}", "!".yellow().bold(), summary);
    }
    for failure in reporter.failures() {
        println!("  {} {} ({}): {}", "failed:".red(), failure.archive.bold(), failure.phase, failure.cause);
    }
    let advisories = reporter.advisories().len() + reporter.skipped().len();
    if advisories > 0 {
        println!("  {} {advisories} warnings, see log", "note:".cyan());
    }
    Ok(())
}

fn cmd_remap(args: RemapArgs) -> anyhow::Result<()> {
    let table = load_tiny(&args.mappings, &args.from, &args.to)
        .with_context(|| format!("loading translation table {}", args.mappings.display()))?;
    rehost_remap::remap(table, &args.input, &args.output, &args.classpath)
        .with_context(|| format!("remapping {}", args.input.display()))?;
    println!(
        "{} Remapped {} -> {}",
        "✓".green().bold(),
        args.input.display(),
        args.output.display().to_string().bold()
    );
    Ok(())
}
