use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facewire_core::datastore::{DEFAULT_MYSQL_CHARSET, DEFAULT_MYSQL_PORT, DEFAULT_POSTGRES_PORT};
use facewire_core::types::{
    DEFAULT_DET_PROB_THRESHOLD, DEFAULT_PAGE_SIZE, DEFAULT_PREDICTION_COUNT,
    DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_THRESHOLD,
};
use facewire_core::{
    switch_datastore, Config, DatastoreConfig, DeleteAllConfirmation, DetectionValidation,
    DetectionValidationPlan, Encoding, FullWorkflow, FullWorkflowPlan, ImageUpload, ListQuery,
    MySqlConfig, PostgresConfig, RecognitionClient, RecognizeOptions, RegisterOptions,
    SearchOptions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facewire", about = "Face recognition API client", version)]
struct Cli {
    /// TOML config file; FACEWIRE_* variables still apply on top
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the recognition API
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Timeout in seconds for listing and metadata calls
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Timeout in seconds for register, recognize, search and delete-all
    #[arg(long, global = true)]
    long_timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face image under a subject
    Register {
        subject: String,
        image: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DET_PROB_THRESHOLD)]
        det_prob_threshold: f32,
        /// Send the image as base64 JSON instead of multipart
        #[arg(long)]
        base64: bool,
    },
    /// Recognize faces in an image
    Recognize {
        image: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DET_PROB_THRESHOLD)]
        det_prob_threshold: f32,
        #[arg(long, default_value_t = DEFAULT_PREDICTION_COUNT)]
        prediction_count: u32,
        /// Maximum faces to return (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// List stored faces, one page at a time
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
        #[arg(long)]
        subject: Option<String>,
    },
    /// Delete one face by image id, or every face of a subject (not `all`; see delete-all)
    Delete { target: String },
    /// Delete several faces by image id
    DeleteMany {
        #[arg(required = true)]
        image_ids: Vec<String>,
    },
    /// Delete every stored face
    DeleteAll {
        /// Must be exactly YES
        #[arg(long)]
        confirm: String,
    },
    /// Rename a subject
    Rename { old: String, new: String },
    /// Find registered faces similar to the one in an image
    Search {
        image: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SEARCH_THRESHOLD)]
        threshold: f32,
        /// Maximum matches to return (0 = all)
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = DEFAULT_DET_PROB_THRESHOLD)]
        det_prob_threshold: f32,
    },
    /// Show or switch the service's backing datastore
    Datastore {
        #[command(subcommand)]
        command: DatastoreCommand,
    },
    /// Run register, recognize and search (and optionally delete) in sequence
    Workflow {
        subject: String,
        image: PathBuf,
        /// Image to recognize; defaults to the registered image
        #[arg(long)]
        recognize_image: Option<PathBuf>,
        /// Image to search with; defaults to the registered image
        #[arg(long)]
        search_image: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_SEARCH_THRESHOLD)]
        search_threshold: f32,
        /// Delete the registered face at the end
        #[arg(long)]
        delete: bool,
    },
    /// Check that faces are accepted and face-less images rejected
    ValidateDetection {
        #[arg(long)]
        face_image: Option<PathBuf>,
        #[arg(long)]
        no_face_image: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_DET_PROB_THRESHOLD)]
        det_prob_threshold: f32,
        #[arg(long)]
        base64: bool,
        /// Delete faces registered by the trials
        #[arg(long)]
        cleanup: bool,
    },
    /// Reshape instance configs into the input/output layout
    Migrate {
        /// A JSON file, or a directory walked recursively
        path: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarise the instance monitor CSV
    Monitor {
        #[arg(default_value = "instance_monitor.csv")]
        csv: PathBuf,
        /// Only report this instance
        #[arg(long)]
        instance: Option<String>,
    },
}

#[derive(Subcommand)]
enum DatastoreCommand {
    /// Show the active datastore
    Show,
    /// Switch to the embedded file store
    Embedded,
    /// Switch to MySQL
    Mysql {
        #[command(flatten)]
        conn: ConnectionArgs,
        #[arg(long, default_value_t = DEFAULT_MYSQL_PORT)]
        port: u16,
        #[arg(long, default_value = DEFAULT_MYSQL_CHARSET)]
        charset: String,
    },
    /// Switch to PostgreSQL
    Postgres {
        #[command(flatten)]
        conn: ConnectionArgs,
        #[arg(long, default_value_t = DEFAULT_POSTGRES_PORT)]
        port: u16,
    },
}

#[derive(Args)]
struct ConnectionArgs {
    #[arg(long)]
    host: String,
    #[arg(long)]
    database: String,
    #[arg(long)]
    username: String,
    #[arg(long, env = "FACEWIRE_DB_PASSWORD", hide_env_values = true)]
    password: String,
}

fn encoding(base64: bool) -> Encoding {
    if base64 {
        Encoding::Base64Json
    } else {
        Encoding::Multipart
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }
    if let Some(secs) = cli.long_timeout {
        config.long_timeout_secs = secs;
    }
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn image(path: &Path) -> Result<ImageUpload> {
    ImageUpload::from_path(path).with_context(|| format!("cannot use image {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Offline tools need no client.
    match &cli.command {
        Commands::Migrate { path, dry_run } => {
            if path.is_dir() {
                let summary = facewire_tools::migrate_dir(path, *dry_run)?;
                print_json(&summary)?;
                if !summary.errors.is_empty() {
                    bail!("{} file(s) could not be migrated", summary.errors.len());
                }
            } else {
                let outcome = facewire_tools::migrate_file(path, *dry_run)?;
                print_json(&serde_json::json!({ "path": path, "outcome": outcome }))?;
            }
            return Ok(());
        }
        Commands::Monitor { csv, instance } => {
            let samples = facewire_tools::read_samples(csv)?;
            let mut summary = facewire_tools::summarize(&samples);
            if let Some(id) = instance {
                summary.retain(|s| &s.instance_id == id);
                if summary.is_empty() {
                    bail!("no samples for instance {id}");
                }
            }
            return print_json(&summary);
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let client = RecognitionClient::new(&config)?;

    match cli.command {
        Commands::Register {
            subject,
            image: path,
            det_prob_threshold,
            base64,
        } => {
            let options = RegisterOptions {
                det_prob_threshold,
                encoding: encoding(base64),
            };
            print_json(&client.register(&subject, &image(&path)?, options)?)?;
        }
        Commands::Recognize {
            image: path,
            det_prob_threshold,
            prediction_count,
            limit,
        } => {
            let options = RecognizeOptions {
                det_prob_threshold,
                prediction_count,
                limit,
            };
            print_json(&client.recognize(&image(&path)?, options)?)?;
        }
        Commands::List {
            page,
            size,
            subject,
        } => {
            print_json(&client.list(&ListQuery {
                page,
                size,
                subject,
            })?)?;
        }
        Commands::Delete { target } => match client.delete(&target) {
            Ok(face) => print_json(&face)?,
            Err(e) if e.is_not_found() => {
                tracing::warn!(%target, "nothing to delete");
                print_json(&serde_json::json!({ "status": "not_found", "target": target }))?;
            }
            Err(e) => return Err(e.into()),
        },
        Commands::DeleteMany { image_ids } => {
            print_json(&client.delete_many(&image_ids)?)?;
        }
        Commands::DeleteAll { confirm } => {
            let confirmation = DeleteAllConfirmation::from_token(&confirm)?;
            print_json(&client.delete_all(confirmation)?)?;
        }
        Commands::Rename { old, new } => {
            print_json(&client.rename(&old, &new)?)?;
        }
        Commands::Search {
            image: path,
            threshold,
            limit,
            det_prob_threshold,
        } => {
            let options = SearchOptions {
                threshold,
                limit,
                det_prob_threshold,
            };
            print_json(&client.search(&image(&path)?, options)?)?;
        }
        Commands::Datastore { command } => run_datastore(&client, command)?,
        Commands::Workflow {
            subject,
            image,
            recognize_image,
            search_image,
            search_threshold,
            delete,
        } => {
            let mut plan = FullWorkflowPlan::new(subject, image);
            plan.recognize_image = recognize_image;
            plan.search_image = search_image;
            plan.search.threshold = search_threshold;
            plan.delete_after = delete;
            print_json(&FullWorkflow::new(&client).run(&plan)?)?;
        }
        Commands::ValidateDetection {
            face_image,
            no_face_image,
            det_prob_threshold,
            base64,
            cleanup,
        } => {
            let plan = DetectionValidationPlan {
                face_image,
                no_face_image,
                det_prob_threshold,
                encoding: encoding(base64),
                cleanup,
            };
            let report = DetectionValidation::new(&client).run(&plan)?;
            print_json(&report)?;
            if report.has_failures() {
                bail!("detection validation failed");
            }
        }
        Commands::Migrate { .. } | Commands::Monitor { .. } => {}
    }

    Ok(())
}

fn run_datastore(client: &RecognitionClient, command: DatastoreCommand) -> Result<()> {
    let requested = match command {
        DatastoreCommand::Show => {
            let current = client.datastore_config()?;
            return print_json(&current.to_redacted_json());
        }
        DatastoreCommand::Embedded => DatastoreConfig::Embedded,
        DatastoreCommand::Mysql {
            conn,
            port,
            charset,
        } => DatastoreConfig::MySql(MySqlConfig {
            host: conn.host,
            port,
            database: conn.database,
            username: conn.username,
            password: conn.password,
            charset,
        }),
        DatastoreCommand::Postgres { conn, port } => DatastoreConfig::PostgreSql(PostgresConfig {
            host: conn.host,
            port,
            database: conn.database,
            username: conn.username,
            password: conn.password,
        }),
    };

    let switch = switch_datastore(client, &requested)?;
    print_json(&serde_json::json!({
        "message": switch.ack.message,
        "confirmed": switch.confirmed(),
        "reported": switch.reported.to_redacted_json(),
    }))?;
    if !switch.confirmed() {
        bail!("service reports {} instead of {}", switch.reported.kind(), requested.kind());
    }
    Ok(())
}
