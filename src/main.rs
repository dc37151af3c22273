use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use places_etl::{
    discover_inputs, export_file_name, init_tracing_once, remove_duplicates, with_csv_extension,
    DedupeSchedule, PlacesETL, StoreTarget,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "places-etl")]
#[command(about = "Load place listings from CSV into a store, dedupe them, export them back to CSV")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Also append log output to this file
    #[arg(long, global = true, env = "PLACES_ETL_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// Store backend
    #[arg(long, value_enum, default_value_t = Backend::Document, global = true)]
    store: Backend,

    /// Document store directory
    #[arg(long, default_value = "./data", global = true)]
    store_dir: PathBuf,

    /// Document collection name
    #[arg(long, default_value = "items", global = true)]
    collection: String,

    /// SQLite database file
    #[arg(long, default_value = "./data/data.sqlite", global = true)]
    db: PathBuf,

    /// SQLite table name
    #[arg(long, default_value = "csv_data", global = true)]
    table: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Document,
    Relational,
}

#[derive(Clone, Copy, ValueEnum)]
enum DedupeArg {
    PerFile,
    AfterLoad,
    Never,
}

#[derive(Subcommand)]
enum Command {
    /// Load CSV files into the store
    Load {
        /// Directory scanned for input files
        #[arg(long, default_value = "./csv_data")]
        input_dir: PathBuf,

        /// Load only this file instead of scanning the directory
        #[arg(long)]
        file: Option<PathBuf>,

        /// File name suffix to pick up (case-insensitive)
        #[arg(long, default_value = "csv")]
        suffix: String,

        /// Records per bulk insert (default: 1000 document, 10000 relational)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Rows with fewer columns are skipped
        #[arg(long, default_value_t = places_etl::DEFAULT_MIN_COLUMNS)]
        min_columns: usize,

        /// When to remove duplicates (default: per-file for document, never for relational)
        #[arg(long, value_enum)]
        dedupe: Option<DedupeArg>,
    },

    /// Remove duplicate records (same name + address) from the store
    Dedupe,

    /// Export stored records to CSV
    Export {
        /// Directory for `<index>_output.csv`
        #[arg(long, default_value = "./output_csv")]
        output_dir: PathBuf,

        /// Index used in the output file name
        #[arg(long, default_value_t = 1)]
        index: usize,

        /// Explicit output file (overrides --output-dir/--index)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Maximum rows to export
        #[arg(long, default_value_t = places_etl::DEFAULT_EXPORT_CAP, conflicts_with = "all")]
        cap: u64,

        /// Export every stored record
        #[arg(long)]
        all: bool,

        /// Random order (default for relational). With --all on the document
        /// store the whole collection is held in memory
        #[arg(long, conflicts_with = "ordered")]
        shuffle: bool,

        /// Store order (default for document)
        #[arg(long)]
        ordered: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_once(cli.log_file.as_deref());

    let target = match cli.store.store {
        Backend::Document => StoreTarget::Document { dir: cli.store.store_dir, collection: cli.store.collection },
        Backend::Relational => StoreTarget::Relational { path: cli.store.db, table: cli.store.table },
    };
    let mut etl = PlacesETL::new().store(target).progress(!cli.no_progress);
    if let Some(p) = &cli.log_file {
        etl = etl.log_file(p);
    }

    match cli.command {
        Command::Load { input_dir, file, suffix, batch_size, min_columns, dedupe } => {
            etl = etl.input_dir(&input_dir).file_suffix(&suffix).min_columns(min_columns);
            if let Some(n) = batch_size {
                etl = etl.batch_capacity(n);
            }
            if let Some(d) = dedupe {
                etl = etl.dedupe(match d {
                    DedupeArg::PerFile => DedupeSchedule::PerFile,
                    DedupeArg::AfterLoad => DedupeSchedule::AfterLoad,
                    DedupeArg::Never => DedupeSchedule::Never,
                });
            }
            let files = match file {
                Some(f) => vec![with_csv_extension(&f)],
                None => discover_inputs(&input_dir, &suffix),
            };
            let mut store = etl.open_store()?;
            let summary = etl.load_files(store.as_mut(), &files);
            println!(
                "Loaded {} records from {} files ({} failed), removed {} duplicates",
                summary.records_flushed,
                summary.files.len(),
                summary.failed.len(),
                summary.duplicates_deleted
            );
        }
        Command::Dedupe => {
            let mut store = etl.open_store()?;
            match remove_duplicates(store.as_mut()) {
                Ok(s) => println!("Removed {} duplicates across {} keys", s.deleted, s.groups),
                Err(e) => tracing::error!("Error when remove duplicates. Details: {e:#}"),
            }
        }
        Command::Export { output_dir, index, output, cap, all, shuffle, ordered } => {
            etl = etl.export_cap(if all { None } else { Some(cap) });
            if shuffle || ordered {
                etl = etl.randomize_export(shuffle);
            }
            let out = match output {
                Some(p) => with_csv_extension(&p),
                None => export_file_name(&output_dir, index),
            };
            let mut store = etl.open_store()?;
            match etl.export_from(store.as_mut(), &out) {
                Ok(s) => println!("Exported {} rows to {}", s.rows, s.path.display()),
                Err(e) => tracing::error!("Error when export to csv. Details: {e:#}"),
            }
        }
    }
    Ok(())
}
