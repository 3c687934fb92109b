use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quire::build::{build_site, plan_site};
use quire::config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quire", version, about = "Plans the pages of a Markdown blog")]
struct Cli {
    /// Log per-post details.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the site and write the page manifest.
    Build {
        /// The project directory (or any directory inside it).
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Where to write the manifest. Defaults to `public/pages.json` in
        /// the project directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plan the site and print every route, one per line.
    Routes {
        /// The project directory (or any directory inside it).
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        true => "debug",
        false => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Build { project, output } => {
            let config = load_config(&project)?;
            let output = output.unwrap_or_else(|| config.project_root.join("public/pages.json"));
            build_site(&config, &output)?;
        }
        Command::Routes { project } => {
            let config = load_config(&project)?;
            for page in plan_site(&config)? {
                println!("{}", page.route());
            }
        }
    }
    Ok(())
}

fn load_config(project: &Path) -> Result<Config> {
    let project = project
        .canonicalize()
        .with_context(|| format!("Resolving project directory `{}`", project.display()))?;
    Config::from_directory(&project)
}
