//! Command line tool for Godot `.pck` packages.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gdpck_rs::{
    change_version, merge, rip, scan_dir_with, size_suffix, split, ArchivePacker, ArchiveReader,
    PackConfig, PckError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit code when a failed operation could not restore the user's file
const EXIT_DATA_LOSS: u8 = 2;

/// Inspect, extract, pack and transform Godot packages
#[derive(Parser)]
#[command(name = "gdpck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log every entry and step
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show package information
    Info {
        /// Package or executable with an embedded package
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List package entries, optionally filtered by a `?`/`*` pattern
    List {
        path: PathBuf,

        pattern: Option<String>,

        /// Case sensitive pattern matching
        #[arg(long)]
        match_case: bool,
    },

    /// Extract entries (all of them when no file is named)
    Extract {
        archive: PathBuf,

        /// Output directory
        dest: PathBuf,

        /// Entry paths to extract, e.g. res://icon.png
        files: Vec<String>,

        /// Leave existing files untouched
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Pack a directory into a package
    Pack {
        /// Directory to pack
        src_dir: PathBuf,

        /// Package to write, or the executable to embed into with --embed
        dest: PathBuf,

        /// Pack version, e.g. 1.3.4.2 (pack format, major, minor, revision)
        version: Option<String>,

        /// Append the package to an executable instead of writing it standalone
        #[arg(long)]
        embed: bool,

        /// With --embed, copy this executable to DEST first instead of modifying DEST
        #[arg(long, requires = "embed")]
        host: Option<PathBuf>,

        /// Payload alignment in bytes
        #[arg(long)]
        alignment: Option<u64>,

        /// Mount prefix for packed paths
        #[arg(long)]
        prefix: Option<String>,

        /// Skip files whose packed path matches this pattern (repeatable)
        #[arg(long, short = 'x')]
        exclude: Vec<String>,

        /// TOML file with pack settings; flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Delete the executable backup after embedding
        #[arg(long)]
        remove_backup: bool,
    },

    /// Pull the embedded package out of an executable
    Rip {
        exe: PathBuf,

        /// Write the package here; without it the package is stripped from EXE
        output: Option<PathBuf>,

        /// Delete the executable backup after stripping
        #[arg(long)]
        remove_backup: bool,
    },

    /// Embed a standalone package into an executable
    Merge {
        pck: PathBuf,

        exe: PathBuf,

        /// Delete the executable backup after merging
        #[arg(long)]
        remove_backup: bool,
    },

    /// Split an executable into an executable + package pair
    Split {
        exe: PathBuf,

        /// Name of the new executable; EXE is split in place when omitted
        new_exe: Option<PathBuf>,

        /// Delete the executable backup after splitting
        #[arg(long)]
        remove_backup: bool,
    },

    /// Rewrite the version fields of a package in place
    ChangeVersion {
        path: PathBuf,

        /// New version, e.g. 1.3.4.2
        version: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let data_loss = err
                .downcast_ref::<PckError>()
                .is_some_and(PckError::is_data_loss);
            if data_loss {
                error!("{:#}", err);
                eprintln!("error: {:#}", err);
                eprintln!("error: the original file may be missing or truncated, check its backup");
                ExitCode::from(EXIT_DATA_LOSS)
            } else {
                eprintln!("error: {:#}", err);
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Info { path, json } => info(path, json),
        Commands::List {
            path,
            pattern,
            match_case,
        } => list(path, pattern, match_case),
        Commands::Extract {
            archive,
            dest,
            files,
            no_overwrite,
        } => extract(archive, dest, files, !no_overwrite),
        Commands::Pack {
            src_dir,
            dest,
            version,
            embed,
            host,
            alignment,
            prefix,
            exclude,
            config,
            remove_backup,
        } => {
            let mut settings = match &config {
                Some(path) => PackConfig::load(path)?,
                None => PackConfig::default(),
            };
            if version.is_some() {
                settings.version = version;
            }
            if alignment.is_some() {
                settings.alignment = alignment;
            }
            if prefix.is_some() {
                settings.prefix = prefix;
            }
            settings.exclude.extend(exclude);
            if remove_backup {
                settings.remove_backup = Some(true);
            }

            let options = settings.pack_options()?;
            let files = scan_dir_with(&src_dir, &settings.scan_options())
                .with_context(|| format!("scanning {}", src_dir.display()))?;
            let embed_into = embed.then(|| host.as_deref().unwrap_or(&dest));

            ArchivePacker::new(options)
                .pack(&dest, &files, embed_into)
                .with_context(|| format!("packing into {}", dest.display()))?;
            Ok(())
        }
        Commands::Rip {
            exe,
            output,
            remove_backup,
        } => {
            rip(&exe, output.as_deref(), remove_backup)
                .with_context(|| format!("ripping {}", exe.display()))?;
            Ok(())
        }
        Commands::Merge {
            pck,
            exe,
            remove_backup,
        } => {
            merge(&pck, &exe, remove_backup)
                .with_context(|| format!("merging {} into {}", pck.display(), exe.display()))?;
            Ok(())
        }
        Commands::Split {
            exe,
            new_exe,
            remove_backup,
        } => {
            split(&exe, new_exe.as_deref(), remove_backup)
                .with_context(|| format!("splitting {}", exe.display()))?;
            Ok(())
        }
        Commands::ChangeVersion { path, version } => {
            change_version(&path, &version)
                .with_context(|| format!("changing version of {}", path.display()))?;
            Ok(())
        }
    }
}

fn info(path: PathBuf, json: bool) -> Result<()> {
    let reader = ArchiveReader::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let info = reader.info()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Path:           {}", info.path.display());
    println!("Pack format:    {} ({:?})", info.version.pack_format, info.layout);
    println!("Engine version: {}", info.version.engine());
    println!("Version string: {}", info.version);
    if info.embedded {
        println!("Embedded:       yes, at offset {}", info.header_start);
    } else {
        println!("Embedded:       no");
    }
    println!("Entries:        {}", info.entry_count);
    println!("Total size:     {}", size_suffix(info.total_size, 2));
    Ok(())
}

fn list(path: PathBuf, pattern: Option<String>, match_case: bool) -> Result<()> {
    let reader = ArchiveReader::open(&path).with_context(|| format!("opening {}", path.display()))?;

    let entries = match &pattern {
        Some(pattern) => reader.filter(pattern, match_case),
        None => reader.entries().iter().collect(),
    };

    for entry in &entries {
        println!("{:>12}  {}", size_suffix(entry.size, 2), entry.path);
    }
    println!(
        "{} of {} entries, {}",
        entries.len(),
        reader.entry_count(),
        size_suffix(entries.iter().map(|e| e.size).sum(), 2)
    );
    Ok(())
}

fn extract(archive: PathBuf, dest: PathBuf, files: Vec<String>, overwrite: bool) -> Result<()> {
    let mut reader =
        ArchiveReader::open(&archive).with_context(|| format!("opening {}", archive.display()))?;

    let summary = if files.is_empty() {
        reader.extract_all(&dest, overwrite)
    } else {
        reader.extract(&files, &dest, overwrite)
    }
    .with_context(|| format!("extracting to {}", dest.display()))?;

    for path in &summary.missing {
        eprintln!("not in package: {}", path);
    }
    println!(
        "Extracted {} files to {} ({} skipped, {} missing)",
        summary.extracted,
        dest.display(),
        summary.skipped.len(),
        summary.missing.len()
    );
    Ok(())
}
