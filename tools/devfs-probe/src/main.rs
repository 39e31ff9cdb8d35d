//! devfs-probe - exercise devfs path resolution against a device manifest
//!
//! Commands:
//! - `devfs-probe resolve <path> --kind mtd` - Resolve a path as one driver kind
//! - `devfs-probe list [dir]` - List a directory of the registry
//! - `devfs-probe check` - Resolve every entry as every kind and verify counts
//! - `devfs-probe families` - Show which driver families are compiled in

mod manifest;
mod stub;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use kaal_devfs::status::{to_status, OK};
use kaal_devfs::{resolve_typed, Capability, NodeRegistry};
use std::path::PathBuf;

use crate::manifest::Manifest;

#[derive(Parser, Debug)]
#[command(name = "devfs-probe")]
#[command(version)]
#[command(about = "Probe devfs driver resolution against a device manifest", long_about = None)]
struct Cli {
    /// Device manifest (TOML)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a path as one driver kind and print the status code
    Resolve {
        /// Device path
        path: String,

        /// Expected driver kind (block, char, mtd, mqueue, socket)
        #[arg(short, long, default_value = "mtd", value_parser = parse_kind)]
        kind: Capability,
    },

    /// List the entries below a directory
    List {
        /// Directory path
        #[arg(default_value = "/")]
        dir: String,
    },

    /// Resolve every manifest entry as every kind and verify reference counts
    Check,

    /// Show which driver families are compiled in
    Families,
}

fn parse_kind(name: &str) -> Result<Capability, String> {
    Capability::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Capability::ALL.iter().map(|c| c.name()).collect();
        format!("unknown kind '{}' (expected one of {})", name, known.join(", "))
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let manifest = match &cli.manifest {
        Some(path) => Manifest::load(path)?,
        None => Manifest::default(),
    };
    let registry = manifest.populate()?;

    match cli.command {
        Commands::Resolve { path, kind } => resolve(&registry, &path, kind),
        Commands::List { dir } => list(&registry, &dir),
        Commands::Check => check(&registry, &manifest),
        Commands::Families => {
            families();
            Ok(())
        }
    }
}

fn status_label(status: i32) -> String {
    if status == OK {
        format!("{}", status).green().to_string()
    } else {
        format!("{}", status).red().to_string()
    }
}

fn resolve(registry: &NodeRegistry, path: &str, kind: Capability) -> Result<()> {
    let result = resolve_typed(registry, path, kind);
    let message = result.as_ref().err().map(|err| err.to_string());
    let (status, node) = to_status(result);

    println!("{} {} as {}", "🔎".cyan(), path.bold(), kind);
    println!("  status: {}", status_label(status));

    match node {
        Some(node) => {
            println!("  driver: {}", stub::describe(node.payload()));
            println!("  refs:   {}", registry.refs(path).unwrap_or(0));
            registry.release(node);
        }
        None => {
            if let Some(message) = message {
                println!("  error:  {}", message);
            }
        }
    }

    if status != OK {
        bail!("resolution of {} failed with status {}", path, status);
    }
    Ok(())
}

fn list(registry: &NodeRegistry, dir: &str) -> Result<()> {
    let entries = registry.list(dir)?;

    println!("{} {}", "📁".blue(), dir.bold());
    for entry in entries {
        let kind = match entry.capability {
            Some(capability) => capability.name().green(),
            None => "dir".blue(),
        };
        let suffix = if entry.has_children { "/" } else { "" };
        println!("  {:<8} {}{}", kind, entry.name, suffix);
    }
    Ok(())
}

fn check(registry: &NodeRegistry, manifest: &Manifest) -> Result<()> {
    let mut failures = 0;

    for entry in &manifest.drivers {
        let registered = entry.capability()?;

        for kind in Capability::ALL {
            let (status, node) = to_status(resolve_typed(registry, &entry.path, kind));
            let expected_ok = kind == registered && kind.is_enabled();
            drop(node);

            let refs = registry.refs(&entry.path).unwrap_or(0);
            let ok = (status == OK) == expected_ok && refs == 0;
            if !ok {
                failures += 1;
            }

            log::debug!("{} as {}: status {} refs {}", entry.path, kind, status, refs);
            let mark = if ok { "✓".green() } else { "✗".red() };
            println!(
                "  {} {:<24} {:<7} {:>4}",
                mark,
                entry.path,
                kind.name(),
                status_label(status)
            );
        }
    }

    if failures > 0 {
        bail!("{} resolutions misbehaved", failures);
    }
    println!("{} {} entries checked", "✓".green(), manifest.drivers.len());
    Ok(())
}

fn families() {
    println!("{} Driver families", "🧩".cyan());
    for capability in Capability::ALL {
        let state = if capability.is_enabled() {
            "enabled".green()
        } else {
            "compiled out".yellow()
        };
        println!("  {:<7} {}", capability.name(), state);
    }
}
