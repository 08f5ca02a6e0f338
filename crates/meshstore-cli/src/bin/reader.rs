use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use meshstore::Store;

#[derive(Parser)]
#[command(name = "meshstore-reader", about = "Point and range reads against a mesh population store")]
struct Cli {
    /// Store file path. Falls back to MESHSTORE_FILE_PATH (and `.env`).
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read one cell.
    Point {
        /// Datetime in `YYYY-MM-DD HH:MM:SS`.
        #[arg(long)]
        at: String,
        /// Mesh key (9-digit decimal, or the documented 10-digit exception).
        #[arg(long)]
        mesh: u32,
    },
    /// Read a time-series range for one mesh.
    Range {
        #[arg(long)]
        mesh: u32,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Emit little-endian uint32-per-hour bytes instead of text.
        #[arg(long)]
        raw: bool,
    },
}

fn main() -> Result<()> {
    meshstore_cli::init();
    let cli = Cli::parse();
    let store_path = meshstore_cli::resolve_store_path(cli.store)?;
    let mut store = Store::open(&store_path)?;

    match cli.command {
        Command::Point { at, mesh } => {
            let value = store.read_point_at(&at, mesh)?;
            println!("{value}");
        }
        Command::Range { mesh, from, to, raw } => {
            let series = store.read_range_at(mesh, &from, &to)?;
            if raw {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for v in series {
                    out.write_all(&(v as u32).to_le_bytes())?;
                }
            } else {
                for v in series {
                    println!("{v}");
                }
            }
        }
    }
    Ok(())
}
