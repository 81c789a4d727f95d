//! couchkit CLI - ck command
//!
//! Usage:
//!   ck dbs                                  List databases
//!   ck create-db <name> [--shards N]        Create a database
//!   ck delete-db <name> --confirm <phrase>  Delete a database
//!   ck version                              Print server version
//!   ck uuids [--count N]                    Request server UUIDs
//!   ck updates [--since SEQ]                Database-level events
//!   ck replicate --source A --target B      Trigger ad-hoc replication
//!   ck replicator save --source A --target B [--continuous]
//!   ck replicator list
//!   ck replicator find <id> [--rev REV]
//!   ck replicator remove <id> <rev>

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use couchkit::{Client, ClientConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ck")]
#[command(about = "CouchDB command-line client", long_about = None)]
#[command(version)]
struct Cli {
    /// CouchDB server URL
    #[arg(
        long,
        global = true,
        env = "COUCHDB_URL",
        default_value = "http://localhost:5984"
    )]
    url: String,

    /// Basic-auth username
    #[arg(long, global = true, env = "COUCHDB_USER")]
    user: Option<String>,

    /// Basic-auth password
    #[arg(long, global = true, env = "COUCHDB_PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all databases
    Dbs,
    /// Create a database if it does not exist
    CreateDb {
        name: String,
        /// Number of range partitions
        #[arg(long)]
        shards: Option<u32>,
    },
    /// Delete a database (requires --confirm "delete database")
    DeleteDb {
        name: String,
        #[arg(long)]
        confirm: String,
    },
    /// Print the server version
    Version,
    /// Request server-generated UUIDs
    Uuids {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Show database-level events across the server
    Updates {
        #[arg(long)]
        since: Option<String>,
    },
    /// Trigger an ad-hoc replication (POST /_replicate)
    Replicate(ReplicateArgs),
    /// Manage persistent replications in the _replicator database
    Replicator {
        #[command(subcommand)]
        action: ReplicatorAction,
    },
}

#[derive(Args)]
struct ReplicateArgs {
    #[arg(long)]
    source: String,
    #[arg(long)]
    target: String,
    #[arg(long)]
    continuous: bool,
    /// Cancel a matching in-flight replication
    #[arg(long)]
    cancel: bool,
    #[arg(long)]
    create_target: bool,
    /// Filter function name, "designdoc/filtername"
    #[arg(long)]
    filter: Option<String>,
    /// Restrict to explicit document ids (repeatable)
    #[arg(long = "doc-id")]
    doc_ids: Vec<String>,
    #[arg(long)]
    proxy: Option<String>,
    /// Resume from an update sequence
    #[arg(long)]
    since_seq: Option<String>,
}

#[derive(Subcommand)]
enum ReplicatorAction {
    /// Persist a replication document, starting the job
    Save {
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        continuous: bool,
        #[arg(long)]
        create_target: bool,
        /// Document id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Replicator database name
        #[arg(long, default_value = couchkit::DEFAULT_REPLICATOR_DB)]
        db: String,
    },
    /// List replication documents
    List {
        #[arg(long, default_value = couchkit::DEFAULT_REPLICATOR_DB)]
        db: String,
    },
    /// Fetch a replication document
    Find {
        id: String,
        #[arg(long)]
        rev: Option<String>,
        #[arg(long, default_value = couchkit::DEFAULT_REPLICATOR_DB)]
        db: String,
    },
    /// Delete a replication document, stopping the job
    Remove {
        id: String,
        rev: String,
        #[arg(long, default_value = couchkit::DEFAULT_REPLICATOR_DB)]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::new(cli.url.clone());
    if let (Some(user), Some(password)) = (cli.user.clone(), cli.password.clone()) {
        config = config.credentials(user, password);
    }
    let client = Client::new(config)?;

    match cli.command {
        Commands::Dbs => {
            for db in client.all_dbs().await? {
                println!("{db}");
            }
        }
        Commands::CreateDb { name, shards } => {
            match shards {
                Some(q) => client.create_database_with_shards(&name, q).await?,
                None => client.create_database(&name).await?,
            }
            println!("ok: {name}");
        }
        Commands::DeleteDb { name, confirm } => {
            client.delete_database(&name, &confirm).await?;
            println!("deleted: {name}");
        }
        Commands::Version => {
            println!("{}", client.server_version().await?);
        }
        Commands::Uuids { count } => {
            for uuid in client.uuids(count).await? {
                println!("{uuid}");
            }
        }
        Commands::Updates { since } => {
            let updates = client.db_updates(since.as_deref()).await?;
            for event in updates.results {
                println!("{}\t{}", event.kind, event.db_name);
            }
        }
        Commands::Replicate(args) => {
            let mut replication = client
                .replication()
                .source(args.source)
                .target(args.target);
            if args.continuous {
                replication = replication.continuous(true);
            }
            if args.cancel {
                replication = replication.cancel(true);
            }
            if args.create_target {
                replication = replication.create_target(true);
            }
            if let Some(filter) = args.filter {
                replication = replication.filter(filter);
            }
            if !args.doc_ids.is_empty() {
                replication = replication.doc_ids(args.doc_ids);
            }
            if let Some(proxy) = args.proxy {
                replication = replication.proxy(proxy);
            }
            if let Some(seq) = args.since_seq {
                replication = replication.since_seq(seq);
            }
            let result = replication.trigger().await?;
            println!(
                "ok: {} session: {}",
                result.ok,
                result.session_id.or(result.local_id).unwrap_or_default()
            );
        }
        Commands::Replicator { action } => run_replicator(&client, action).await?,
    }

    Ok(())
}

async fn run_replicator(client: &Client, action: ReplicatorAction) -> Result<()> {
    match action {
        ReplicatorAction::Save {
            source,
            target,
            continuous,
            create_target,
            id,
            db,
        } => {
            let mut replicator = client
                .replicator()
                .replicator_db(db)
                .source(source)
                .target(target);
            if continuous {
                replicator = replicator.continuous(true);
            }
            if create_target {
                replicator = replicator.create_target(true);
            }
            if let Some(id) = id {
                replicator = replicator.doc_id(id);
            }
            let response = replicator.save().await?;
            println!(
                "saved: {} rev: {}",
                response.id.unwrap_or_default(),
                response.rev.unwrap_or_default()
            );
        }
        ReplicatorAction::List { db } => {
            let docs = client.replicator().replicator_db(db).find_all().await?;
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        ReplicatorAction::Find { id, rev, db } => {
            let mut replicator = client.replicator().replicator_db(db).doc_id(id);
            if let Some(rev) = rev {
                replicator = replicator.doc_rev(rev);
            }
            let doc = replicator.find().await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        ReplicatorAction::Remove { id, rev, db } => {
            let response = client
                .replicator()
                .replicator_db(db)
                .doc_id(id)
                .doc_rev(rev)
                .remove()
                .await?;
            println!("removed: {}", response.id.unwrap_or_default());
        }
    }
    Ok(())
}
