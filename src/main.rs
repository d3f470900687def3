use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tagcure::cli::{run_list, run_tag, run_tags, FrequencyOrder, ListOptions, TagOptions, TagSort};
use tagcure::config::{CasePolicy, LoadOptions};
use tagcure::logging::{init_logging, log_file_path, LOG_ENV};

#[derive(Parser)]
#[command(name = "tagcure")]
#[command(about = "Tag index and filter for image directories with .txt sidecars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    load: LoadArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct LoadArgs {
    /// Fold tags to lowercase when loading and comparing
    #[arg(long, global = true)]
    ignore_case: bool,

    /// Image extension to include (repeatable, replaces the defaults)
    #[arg(long = "ext", global = true)]
    extensions: Vec<String>,

    /// Only scan the top level of the directory
    #[arg(long, global = true)]
    no_recursive: bool,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        let mut options = LoadOptions {
            recursive: !self.no_recursive,
            ..Default::default()
        };
        if self.ignore_case {
            options = options.with_case_policy(CasePolicy::Insensitive);
        }
        if !self.extensions.is_empty() {
            options = options.with_extensions(&self.extensions);
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List images matching tag criteria
    List {
        /// Path to image directory
        path: PathBuf,
        /// Require this tag (repeatable)
        #[arg(short, long)]
        include: Vec<String>,
        /// Reject images with this tag (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
        /// Require at least one of these comma-separated tags (repeatable)
        #[arg(short, long)]
        any: Vec<String>,
    },
    /// List all tags with usage counts
    Tags {
        /// Path to image directory
        path: PathBuf,
        /// Sort order
        #[arg(long, value_enum, default_value_t = TagSort::Count)]
        sort: TagSort,
    },
    /// Add or remove tags on one or more images
    Tag {
        /// Path to image directory
        library: PathBuf,
        /// Images to tag (relative to the directory)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Tags to add
        #[arg(short, long)]
        add: Vec<String>,
        /// Tags to remove
        #[arg(short, long)]
        remove: Vec<String>,
        /// Reorder each image's tags by how many images use them
        #[arg(long, value_enum)]
        sort_by_frequency: Option<FrequencyOrder>,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize logging - guard must be held for logs to flush
    let _guard = init_logging().ok();
    let verbose = std::env::var(LOG_ENV).is_ok();
    let start = Instant::now();

    let cli = Cli::parse();

    let result = run_command(cli);

    if verbose {
        eprintln!("Completed in {:.2?}", start.elapsed());
        if let Some(path) = log_file_path() {
            eprintln!("Log: {}", path.display());
        }
    }

    result
}

fn run_command(cli: Cli) -> Result<ExitCode> {
    let load = cli.load.options();

    match cli.command {
        Commands::List {
            path,
            include,
            exclude,
            any,
        } => {
            let options = ListOptions {
                include,
                exclude,
                any,
                load,
            };
            let files = run_list(&path, options)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    if file.tags.is_empty() {
                        println!("{}", file.path);
                    } else {
                        println!("{} ({})", file.path, file.tags.join(", "));
                    }
                }
                println!("{} images", files.len());
            }
        }
        Commands::Tags { path, sort } => {
            let stats = run_tags(&path, sort, &load)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                for stat in &stats {
                    println!("{:>6}  {}", stat.count, stat.tag);
                }
                println!("{} tags", stats.len());
            }
        }
        Commands::Tag {
            library,
            files,
            add,
            remove,
            sort_by_frequency,
        } => {
            let options = TagOptions {
                add,
                remove,
                sort: sort_by_frequency,
                load,
            };
            let reports = run_tag(&library, &files, options)?;
            let failed = reports.iter().filter(|r| !r.is_ok()).count();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    if !report.is_ok() {
                        eprintln!("{}: {}", report.path, report.errors.join("; "));
                    } else if report.tags.is_empty() {
                        println!("{}: no tags", report.path);
                    } else {
                        println!("{}: {}", report.path, report.tags.join(", "));
                    }
                }
            }

            if failed > 0 {
                eprintln!("{} of {} images failed", failed, reports.len());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
