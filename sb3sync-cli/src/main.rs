//! sb3sync CLI
//!
//! Command-line interface for converting packed projects to a structured
//! directory tree and compiling them back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sb3sync_core::{
    disassemble, init_structure, inspect, is_project_archive, reassemble, unpack,
    DisassembleOptions, Platform, ProjectConfig, ALLOWLIST_VERSION,
};
use sb3sync_server::{run_server, ServerConfig};

#[derive(Parser)]
#[command(name = "sb3sync")]
#[command(about = "Convert .sb3/.pmp projects to a git-friendly directory tree and back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disassemble a project archive into a structured directory
    Convert {
        /// Project archive (.sb3/.pmp) or an already unpacked archive directory
        src: PathBuf,

        /// Structured project root to write
        dst: PathBuf,

        /// Clear sprites, stage, extensions and fonts before converting
        #[arg(long)]
        clear: bool,
    },

    /// Compile a structured directory into a project archive
    Compile {
        /// Structured project root
        src: PathBuf,

        /// Archive to write (a directory gets project.sb3 inside it)
        dst: PathBuf,

        /// Stamp the archive for TurboWarp
        #[arg(long)]
        turbowarp: bool,
    },

    /// Compile the current directory using its sb3sync.json settings
    Fastcompile {
        /// Stamp the archive for TurboWarp
        #[arg(long)]
        turbowarp: bool,
    },

    /// Initialize an empty structured project
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show what a project archive contains
    Info {
        /// Archive, unpacked archive directory or project.json
        path: PathBuf,
    },

    /// Start the upload server
    Server {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Structured root that uploads are converted into
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show information about this tool
    About,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sb3sync=info".parse()?)
                .add_directive("sb3sync_core=info".parse()?)
                .add_directive("sb3sync_server=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { src, dst, clear } => {
            tokio::task::spawn_blocking(move || cmd_convert(&src, &dst, clear)).await??;
        }
        Commands::Compile { src, dst, turbowarp } => {
            tokio::task::spawn_blocking(move || cmd_compile(&src, &dst, turbowarp)).await??;
        }
        Commands::Fastcompile { turbowarp } => {
            tokio::task::spawn_blocking(move || cmd_fastcompile(turbowarp)).await??;
        }
        Commands::Init { path } => {
            cmd_init(path)?;
        }
        Commands::Info { path } => {
            cmd_info(&path)?;
        }
        Commands::Server { host, port, output } => {
            cmd_server(host, port, output).await?;
        }
        Commands::About => {
            cmd_about();
        }
    }

    Ok(())
}

/// Disassemble an archive or unpacked directory
fn cmd_convert(src: &Path, dst: &Path, clear: bool) -> Result<()> {
    let config = ProjectConfig::load(dst).context("Failed to read sb3sync.json")?;
    let options = DisassembleOptions {
        clear: clear || config.clear_on_convert,
    };

    // Archives are unpacked into a scratch directory first
    let scratch;
    let archive_root = if src.is_file() {
        if !is_project_archive(src) {
            anyhow::bail!("{} is not a .sb3 or .pmp project", src.display());
        }
        scratch = tempfile::Builder::new()
            .prefix("sb3sync-unpack-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        unpack(src, scratch.path()).context("Failed to unpack project archive")?;
        scratch.path().to_path_buf()
    } else {
        src.to_path_buf()
    };

    let report = disassemble(dst, &archive_root, &options)
        .with_context(|| format!("Failed to convert {}", src.display()))?;

    println!("Converted {} into {}", src.display(), dst.display());
    println!(
        "  stage: {}  sprites: {}  fonts: {}  extensions: {}",
        if report.stage { "yes" } else { "no" },
        report.sprites,
        report.fonts,
        report.extensions
    );
    println!(
        "  assets copied: {}  missing: {}",
        report.assets.copied, report.assets.missing
    );
    if report.failed_targets > 0 {
        println!("  {} targets skipped, see log for details", report.failed_targets);
    }
    Ok(())
}

fn platform_for(turbowarp: bool, config: &ProjectConfig) -> Platform {
    if turbowarp {
        Platform::TurboWarp
    } else {
        config.platform
    }
}

/// Reassemble a structured directory
fn cmd_compile(src: &Path, dst: &Path, turbowarp: bool) -> Result<()> {
    let config = ProjectConfig::load(src).context("Failed to read sb3sync.json")?;
    let platform = platform_for(turbowarp, &config);

    let report = reassemble(src, dst, Some(platform.meta()))
        .with_context(|| format!("Failed to compile {}", src.display()))?;

    println!(
        "Compiled {} ({} sprites, {} assets) for {:?}",
        report.archive_path.display(),
        report.sprites,
        report.assets.copied + report.assets.deduplicated,
        platform
    );
    if report.assets.missing > 0 {
        println!("  {} asset files were missing, see log for details", report.assets.missing);
    }
    Ok(())
}

/// Compile the current directory to its configured output
fn cmd_fastcompile(turbowarp: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let config = ProjectConfig::load(&cwd).context("Failed to read sb3sync.json")?;
    let output = cwd.join(&config.output);
    cmd_compile(&cwd, &output, turbowarp)
}

/// Initialize a new structured project
fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let project_dir = match path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    tracing::info!("Initializing project at {}", project_dir.display());
    init_structure(&project_dir).context("Failed to initialize project")?;

    println!("Initialized sb3sync project at {}", project_dir.display());
    println!("\nProject structure:");
    println!("  sb3sync.json      - Project configuration");
    println!("  sprites/          - One directory per sprite");
    println!("  stage/            - Stage metadata, backdrops and sounds");
    println!("\nNext steps:");
    println!("  sb3sync convert game.sb3 {}", project_dir.display());
    Ok(())
}

/// Print a read-only summary
fn cmd_info(path: &Path) -> Result<()> {
    let summary = inspect(path).with_context(|| format!("Failed to read {}", path.display()))?;

    println!("{}", path.display());
    println!("  targets:    {}", summary.targets);
    println!("  stage:      {}", summary.stages);
    println!("  sprites:    {}", summary.sprites);
    println!("  costumes:   {}", summary.costumes);
    println!("  sounds:     {}", summary.sounds);
    println!("  extensions: {}", summary.extensions);
    println!("  fonts:      {}", summary.fonts);
    Ok(())
}

/// Start the upload server
async fn cmd_server(host: String, port: u16, output: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    println!("Starting sb3sync server on {}:{}...", host, port);
    println!("Uploads are converted into {}", output.display());
    run_server(ServerConfig {
        host,
        port,
        output_root: output,
    })
    .await
}

fn cmd_about() {
    println!("sb3sync {}", env!("CARGO_PKG_VERSION"));
    println!("Converts .sb3/.pmp projects to a structured directory tree and back.");
    println!();
    println!("  convert      archive -> structured directory");
    println!("  compile      structured directory -> archive");
    println!("  fastcompile  compile the current directory");
    println!("  --turbowarp  stamp compiled archives for TurboWarp");
    println!();
    println!("Metadata allowlist version {}", ALLOWLIST_VERSION);
}
