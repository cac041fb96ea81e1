//! Command-line front-end for the `picdb` image database engine.
//!
//! Subcommands map 1:1 onto the core operations: `list`, `create`,
//! `read`, `insert`, `delete`, `gc`. Every error kind from
//! `picdb::Error` maps to a distinct positive process exit code via
//! [`picdb::Error::exit_code`]; `clap` handles its own usage errors
//! (exit code 2) before any of this runs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod logging;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use picdb::{CreateConfig, Database, Listing, OpenMode, ResizeConfig, Variant};

#[derive(Parser)]
#[command(name = "picdb", version, about = "Single-file image database engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every picture stored in a database.
    List {
        /// Path to the database file.
        db: PathBuf,
        /// Emit a structured JSON document instead of the text listing.
        #[arg(long)]
        json: bool,
    },

    /// Create a new, empty database file.
    Create {
        /// Path to the database file to create (truncated if it exists).
        db: PathBuf,
        /// Row capacity.
        #[arg(long = "max_files", default_value_t = 10)]
        max_files: u32,
        /// Thumbnail bounding box, e.g. `-thumb_res 64 64` (default 64x64).
        #[arg(long = "thumb_res", num_args = 2, value_names = ["X", "Y"])]
        thumb_res: Option<Vec<u16>>,
        /// Small bounding box, e.g. `-small_res 256 256` (default 256x256).
        #[arg(long = "small_res", num_args = 2, value_names = ["X", "Y"])]
        small_res: Option<Vec<u16>>,
    },

    /// Read a picture out of a database, materializing a derived variant
    /// first if necessary.
    Read {
        /// Path to the database file.
        db: PathBuf,
        /// Picture identifier.
        id: String,
        /// `thumb`/`thumbnail`, `small`, or `orig`/`original`.
        #[arg(default_value = "orig")]
        resolution: String,
        /// Write the decoded bytes here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Insert a JPEG file into a database under an identifier.
    Insert {
        /// Path to the database file.
        db: PathBuf,
        /// Picture identifier (must be unique among live entries).
        id: String,
        /// Path to the JPEG file to insert.
        file: PathBuf,
    },

    /// Delete a picture from a database. Tombstones the row; blob bytes
    /// remain in the file until `gc`.
    Delete {
        /// Path to the database file.
        db: PathBuf,
        /// Picture identifier to remove.
        id: String,
    },

    /// Compact a database: rewrites it via a sibling temp file, dropping
    /// tombstoned rows and their unreferenced blob bytes.
    Gc {
        /// Path to the database file to compact, in place.
        db: PathBuf,
        /// Path to a sibling temp file used during compaction.
        tmp: PathBuf,
    },

    /// Emit a shell completion script to stdout.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    logging::initialize();
    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("picdb: {err:#}");
            let code = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<picdb::Error>())
                .map_or(1, picdb::Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::List { db, json } => list(&db, json),
        Command::Create {
            db,
            max_files,
            thumb_res,
            small_res,
        } => create(&db, max_files, thumb_res, small_res),
        Command::Read {
            db,
            id,
            resolution,
            out,
        } => read(&db, &id, &resolution, out.as_deref()),
        Command::Insert { db, id, file } => insert(&db, &id, &file),
        Command::Delete { db, id } => delete(&db, &id),
        Command::Gc { db, tmp } => gc(&db, &tmp),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "picdb", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn list(db_path: &Path, json: bool) -> Result<()> {
    let db = Database::open(db_path, OpenMode::Read)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let listing = Listing::from_database(&db);
    if json {
        println!("{}", listing.to_json().context("serializing listing")?);
    } else {
        print!("{}", listing.to_text());
    }
    Ok(())
}

fn create(
    db_path: &Path,
    max_files: u32,
    thumb_res: Option<Vec<u16>>,
    small_res: Option<Vec<u16>>,
) -> Result<()> {
    let as_pair = |v: Option<Vec<u16>>, default: (u16, u16)| -> (u16, u16) {
        v.map_or(default, |v| (v[0], v[1]))
    };
    let res_resized = ResizeConfig {
        thumb: as_pair(thumb_res, ResizeConfig::DEFAULT.thumb),
        small: as_pair(small_res, ResizeConfig::DEFAULT.small),
    };
    let config = CreateConfig {
        max_files,
        res_resized,
    };
    let db = Database::create(db_path, config)
        .with_context(|| format!("creating {}", db_path.display()))?;
    db.close();
    println!("created {}", db_path.display());
    Ok(())
}

fn read(db_path: &Path, id: &str, resolution: &str, out: Option<&Path>) -> Result<()> {
    let variant: Variant = resolution.parse()?;
    let mut db = Database::open(db_path, OpenMode::ReadWrite)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let bytes = db.read(id, variant)?;

    match out {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            std::io::stdout()
                .write_all(&bytes)
                .context("writing to stdout")?;
        }
    }
    Ok(())
}

fn insert(db_path: &Path, id: &str, file: &Path) -> Result<()> {
    let blob = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut db = Database::open(db_path, OpenMode::ReadWrite)
        .with_context(|| format!("opening {}", db_path.display()))?;
    db.insert(id, &blob)?;
    println!("inserted {id}");
    Ok(())
}

fn delete(db_path: &Path, id: &str) -> Result<()> {
    let mut db = Database::open(db_path, OpenMode::ReadWrite)
        .with_context(|| format!("opening {}", db_path.display()))?;
    db.delete(id)?;
    println!("deleted {id}");
    Ok(())
}

fn gc(db_path: &Path, tmp_path: &Path) -> Result<()> {
    let mut db = Database::open(db_path, OpenMode::ReadWrite)
        .with_context(|| format!("opening {}", db_path.display()))?;
    db.garbage_collect(db_path, tmp_path)?;
    println!("compacted {}", db_path.display());
    Ok(())
}
