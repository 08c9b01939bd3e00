use clap::{Parser, Subcommand, ValueEnum};
use shardpipe::{Deadline, Pipeline, Record};
use std::process;
use std::time::Duration;

/// shardpipe CLI — partition record batches into shard files and index them
#[derive(Parser)]
#[command(name = "shardpipe", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Bound each storage/search operation (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a resource folder with its split key
    Create {
        /// Resource name
        resource: String,
        /// Field used to route records into shards (immutable after creation)
        split_key: String,
    },

    /// List all resources
    List,

    /// Recursively delete a resource
    Delete {
        /// Resource name
        resource: String,
    },

    /// List a resource's files (shard files and index markers)
    Files {
        /// Resource name
        resource: String,
    },

    /// Read a shard file back as records
    Read {
        /// Resource name
        resource: String,
        /// Shard file name (e.g. sales-east)
        filename: String,
    },

    /// Partition a batch of records into shard files
    Submit {
        /// Resource name
        resource: String,
        /// Read the JSON array of records from a file
        #[arg(long)]
        data_file: Option<String>,
        /// Read the JSON array of records from stdin
        #[arg(long)]
        data_stdin: bool,
    },

    /// Build (if needed) and query the index for a shard file
    Index {
        /// Resource name
        resource: String,
        /// Shard file name
        filename: String,
    },

    /// Delete the index for a shard file and clear its marker
    Teardown {
        /// Resource name
        resource: String,
        /// Shard file name
        filename: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::open(&cli.data_dir)?;
    let deadline = match cli.timeout_ms {
        Some(ms) => Deadline::within(Duration::from_millis(ms)),
        None => Deadline::none(),
    };

    match cli.command {
        Command::Create {
            resource,
            split_key,
        } => {
            pipeline.create_resource(&resource, &split_key)?;
            print_output(
                &serde_json::json!({ "ok": true, "resource": resource, "split_key": split_key }),
                &cli.format,
            );
        }

        Command::List => {
            let resources = pipeline.list_resources()?;
            print_output(&serde_json::json!(resources), &cli.format);
        }

        Command::Delete { resource } => {
            pipeline.delete_resource(&resource)?;
            print_output(
                &serde_json::json!({ "ok": true, "deleted": resource }),
                &cli.format,
            );
        }

        Command::Files { resource } => {
            let files = pipeline.resource(&resource)?.files()?;
            print_output(&serde_json::json!(files), &cli.format);
        }

        Command::Read { resource, filename } => {
            let records = pipeline.resource(&resource)?.read_shard(&filename)?;
            print_output(&serde_json::json!(records), &cli.format);
        }

        Command::Submit {
            resource,
            data_file,
            data_stdin,
        } => {
            let records = read_batch(data_file, data_stdin)?;
            let report = pipeline.resource(&resource)?.partition(&records, deadline)?;

            let written: Vec<_> = report
                .written
                .iter()
                .map(|w| serde_json::json!({ "key_value": w.key_value, "shard_file": w.shard_file }))
                .collect();
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "key_value": f.key_value,
                        "shard_file": f.shard_file,
                        "error": f.error.to_string(),
                    })
                })
                .collect();
            let rejected: Vec<_> = report
                .rejected
                .iter()
                .map(|r| serde_json::json!({ "position": r.position, "error": r.error.to_string() }))
                .collect();

            print_output(
                &serde_json::json!({
                    "ok": report.is_complete(),
                    "written": written,
                    "failed": failed,
                    "rejected": rejected,
                }),
                &cli.format,
            );
        }

        Command::Index { resource, filename } => {
            let result = pipeline
                .resource(&resource)?
                .ensure_indexed(&filename, deadline)?;
            print_output(&serde_json::to_value(&result)?, &cli.format);
        }

        Command::Teardown { resource, filename } => {
            pipeline.resource(&resource)?.teardown(&filename, deadline)?;
            print_output(
                &serde_json::json!({ "ok": true, "resource": resource, "filename": filename }),
                &cli.format,
            );
        }
    }

    Ok(())
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value).unwrap());
        }
    }
}

fn read_batch(
    data_file: Option<String>,
    data_stdin: bool,
) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let raw = if let Some(path) = data_file {
        std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read data file '{path}': {e}"))?
    } else if data_stdin {
        use std::io::Read;
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        return Err("Provide the batch via --data-file or --data-stdin".into());
    };

    let records: Vec<Record> = serde_json::from_str(&raw)
        .map_err(|e| format!("Batch must be a JSON array of objects: {e}"))?;
    Ok(records)
}
