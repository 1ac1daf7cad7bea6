use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bible-versification")]
#[command(about = "Inspect and maintain Bible versification databases", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "versifications.vdb",
        help = "Versification database file"
    )]
    pub db: PathBuf,

    #[arg(long, global = true, help = "Log directory")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Write a JSON report to this path")]
    pub report: Option<PathBuf>,

    #[arg(long, global = true, help = "Compress the JSON report with gzip")]
    pub gzip_report: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List versifications and mappings in the database.
    List {
        #[arg(help = "Scheme names or mapping keys to show; empty lists everything")]
        names: Vec<String>,
    },

    /// Map one verse reference through a mapping.
    Map {
        #[arg(help = "Mapping key, e.g. KJV/LXX, KJV/LXX/2 or KJV/LXX/-1")]
        mapping: String,
        #[arg(help = "OSIS book ID, e.g. Gen")]
        book: String,
        #[arg(help = "Chapter number")]
        chapter: u32,
        #[arg(help = "Verse label, e.g. 7 or 6a")]
        verse: String,
    },

    /// Compare two versifications or two mappings.
    Compare {
        #[arg(help = "Left scheme name or mapping key")]
        left: String,
        #[arg(help = "Right scheme name or mapping key")]
        right: String,
    },

    /// Compose a chain of mappings and store the result.
    Join {
        #[arg(required = true, help = "Mapping keys to compose, left to right")]
        keys: Vec<String>,
    },

    /// Rename a versification scheme.
    Rename {
        #[arg(help = "Current scheme name or alias")]
        name: String,
        #[arg(help = "New scheme name")]
        new_name: String,
    },

    /// Remove versifications or mappings from the database.
    Remove {
        #[arg(required = true, help = "Scheme names or mapping keys")]
        names: Vec<String>,
    },

    /// Save the registry, or a subset of it, to a new database file.
    Export {
        #[arg(help = "Destination file")]
        out_file: PathBuf,
        #[arg(help = "Scheme names or mapping keys to keep; empty exports everything")]
        names: Vec<String>,
    },

    /// Merge another versification database into this one.
    Import {
        #[arg(help = "Database file to merge")]
        file: PathBuf,
    },

    /// Guess which versification a list of references belongs to.
    Detect {
        #[arg(help = "Text file with one 'Book chapter:verse' reference per line")]
        refs_file: PathBuf,
        #[arg(
            long,
            default_value_t = 10,
            help = "Maximum number of candidate schemes to report"
        )]
        limit: usize,
        #[arg(long, help = "Score schemes only on the books that were observed")]
        limit_books: bool,
    },

    /// Run the registry self-checks.
    Verify,

    /// Write the JSON Schemas for the report files.
    Schema {
        #[arg(long, default_value = "schema", help = "Schema output directory")]
        out: PathBuf,
    },
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
