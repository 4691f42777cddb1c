//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! CLI over the storegate file API.
//!
//! Examples:
//! ```bash
//! storegate-cli exists   ~/docs/a.txt
//! storegate-cli put      ~/docs/a.txt "hello"
//! storegate-cli cat      ~/docs/a.txt
//! storegate-cli append   ~/logs/today.log "line"
//! storegate-cli cp       ~/docs/a.txt ~/backup/a.txt --overwrite
//! storegate-cli mv       ~/docs/a.txt ~/archive/a.txt
//! storegate-cli rm       ~/archive/a.txt
//! storegate-cli stat     ~/docs/a.txt
//! storegate-cli touch    ~/docs/a.txt
//! storegate-cli attrib   ~/docs/a.txt --read-only
//! storegate-cli ls       ~/docs
//! storegate-cli url      ~/docs/a.txt
//! storegate-cli upload   ./big.iso ~/media/big.iso
//! ```
//!
//! Configuration comes from `STOREGATE_*` variables (or a `.env` file); the
//! reference file-backed store lives under `STOREGATE_STORE_ROOT`.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storegate::{
    runtime::run_on_global_rt, FileAttributes, FileSystemConfig, FileSystemObjectStore, GatewayConfig, ObjectStore,
    UnifiedFile,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// Local root that `~/` resolves against (overrides STOREGATE_LOCAL_ROOT).
    #[arg(long, value_name = "DIR")]
    local_root: Option<PathBuf>,

    /// Root directory of the file-backed object store (overrides STOREGATE_STORE_ROOT).
    #[arg(long, value_name = "DIR")]
    store_root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Exit 0 if the file exists, 1 otherwise.
    Exists { path: String },

    /// Print a file to stdout.
    Cat { path: String },

    /// Create or replace a file. Reads stdin when no text is given.
    Put { path: String, text: Option<String> },

    /// Append a line of text, creating the file if needed.
    Append { path: String, text: String },

    /// Copy a file.
    Cp {
        src: String,
        dest: String,
        #[arg(long)]
        overwrite: bool,
    },

    /// Move a file (copy then delete).
    Mv { src: String, dest: String },

    /// Delete a file. Missing files are ignored.
    Rm { path: String },

    /// Show size, timestamps and attributes.
    Stat {
        path: String,
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Set the last write time to now.
    Touch { path: String },

    /// Show or change attributes.
    Attrib {
        path: String,
        /// Set the read-only attribute.
        #[arg(long, conflicts_with = "writable")]
        read_only: bool,
        /// Clear the read-only attribute.
        #[arg(long)]
        writable: bool,
    },

    /// List files in a directory (local and remote merged).
    Ls { dir: String },

    /// Print a URL for the file.
    Url { path: String },

    /// Upload a local file with a multipart session.
    Upload { source: PathBuf, dest: String },
}

fn build_gateway(cli: &Cli) -> Result<UnifiedFile> {
    let mut cfg = GatewayConfig::from_env()?;
    if let Some(root) = &cli.local_root {
        cfg.local_root = root.clone();
    }
    let store_root = cli
        .store_root
        .clone()
        .or_else(GatewayConfig::store_root_from_env)
        .context("no object store configured: pass --store-root or set STOREGATE_STORE_ROOT")?;

    let mut fs_cfg = FileSystemConfig::default();
    if let Some(min) = cfg.min_part_size {
        fs_cfg.min_part_size = min;
    }
    if let Some(max) = cfg.max_part_size {
        fs_cfg.max_part_size = max;
    }
    if let Ok(secret) = std::env::var("STOREGATE_SIGNING_SECRET") {
        fs_cfg.signing_secret = secret;
    }
    let store = FileSystemObjectStore::with_config(store_root, cfg.container.clone(), fs_cfg);
    let setup = store.clone();
    run_on_global_rt(async move { setup.create_container().await })?;

    info!("local root {}, container {}", cfg.local_root.display(), cfg.container);
    Ok(UnifiedFile::new(cfg, Arc::new(store)))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let gw = build_gateway(&cli)?;

    match cli.cmd {
        Command::Exists { path } => {
            let found = gw.exists(&path);
            safe_println!("{}", found);
            if !found {
                std::process::exit(1);
            }
        }
        Command::Cat { path } => {
            let data = gw.read_all_bytes(&path)?;
            io::stdout().write_all(&data)?;
        }
        Command::Put { path, text } => {
            let data = match text {
                Some(t) => t.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            gw.write_all_bytes(&path, &data)?;
        }
        Command::Append { path, text } => gw.append_all_text(&path, &format!("{}\n", text))?,
        Command::Cp { src, dest, overwrite } => gw.copy(&src, &dest, overwrite)?,
        Command::Mv { src, dest } => gw.move_file(&src, &dest)?,
        Command::Rm { path } => gw.delete(&path)?,
        Command::Stat { path, json } => {
            let snap = gw.metadata(&path)?;
            if json {
                safe_println!("{}", serde_json::to_string_pretty(&snap)?);
                return Ok(());
            }
            if !snap.exists {
                safe_println!("{}: not found", snap.path);
                std::process::exit(1);
            }
            safe_println!("path:        {}", snap.path);
            safe_println!("backend:     {:?}", snap.backend);
            safe_println!("size:        {}", snap.size);
            safe_println!("created:     {}", snap.creation_time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()));
            safe_println!("last write:  {}", snap.last_write_time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()));
            safe_println!("attributes:  {}", snap.attributes);
        }
        Command::Touch { path } => gw.set_last_write_time(&path, Utc::now())?,
        Command::Attrib { path, read_only, writable } => {
            let mut attrs = gw.get_attributes(&path)?;
            if read_only || writable {
                if read_only {
                    attrs.insert(FileAttributes::READ_ONLY);
                } else {
                    attrs.remove(FileAttributes::READ_ONLY);
                }
                gw.set_attributes(&path, attrs)?;
            }
            safe_println!("{}", attrs);
        }
        Command::Ls { dir } => {
            for entry in gw.list(&dir)? {
                safe_println!("{}", entry);
            }
        }
        Command::Url { path } => safe_println!("{}", gw.public_url(&path)?),
        Command::Upload { source, dest } => {
            let t0 = Instant::now();
            let info = gw.upload_multipart(&source, &dest)?;
            let dt = t0.elapsed();
            safe_println!(
                "uploaded {} bytes in {} parts ({}) in {:.2?}",
                info.total_bytes,
                info.parts,
                info.e_tag,
                dt
            );
        }
    }

    Ok(())
}
