/*
Ingest Example

Creates a table, streams generated rows into it through a raw data cable and reads them back.

Usage:
    cargo run --example ingest -- \
        --endpoint http://localhost:6543 \
        --table demo_events \
        --rows 1000
*/

use std::error::Error;

use clap::{Args, Parser};
use scopedb::cable::SendCompletion;
use scopedb::workers::base::Worker;
use scopedb::{CableConfig, Client, ClientConfig};
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "ingest", version, about, arg_required_else_help = true)]
struct AppArgs {
    #[clap(flatten)]
    server_args: ServerArgs,

    #[clap(flatten)]
    cable_args: CableArgs,

    /// Name of the table created and filled by the example
    #[arg(long)]
    table: String,

    /// Number of rows to ingest
    #[arg(long, default_value = "100")]
    rows: u64,

    /// Drop the table once the rows have been read back
    #[arg(long)]
    drop_table: bool,
}

#[derive(Debug, Args)]
struct ServerArgs {
    /// Base URL of the ScopeDB server
    #[arg(long)]
    endpoint: String,

    /// Per request timeout (in milliseconds)
    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct CableArgs {
    /// Estimated batch size that triggers a flush (in bytes)
    #[arg(long, default_value = "65536")]
    batch_size_bytes: usize,

    /// Maximum time a record waits before its batch is flushed (in milliseconds)
    #[arg(long, default_value = "1000")]
    batch_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = main_impl().await {
        error!("{e}");
        std::process::exit(1);
    }

    Ok(())
}

async fn main_impl() -> Result<(), Box<dyn Error>> {
    scopedb_telemetry::tracing::init_tracing("ingest")?;

    let args = AppArgs::parse();

    let mut config = ClientConfig::new(args.server_args.endpoint);
    config.request_timeout_ms = args.server_args.request_timeout_ms;
    let client = Client::new(config)?;
    client.health_check().await?;

    let table = client.table(&args.table);
    let identifier = table.identifier();

    client
        .statement(format!(
            "CREATE TABLE IF NOT EXISTS {identifier} (id int, source string, payload variant)"
        ))
        .execute()
        .await?;
    info!(table = %identifier, "table is ready");

    let cable_config = CableConfig {
        batch_size_bytes: args.cable_args.batch_size_bytes,
        batch_interval_ms: args.cable_args.batch_interval_ms,
        ..CableConfig::default()
    };
    let cable = client
        .raw_data_batch_cable(
            format!(
                "SELECT $0[\"id\"]::int AS id, $0[\"source\"]::string AS source, $0[\"payload\"] AS payload \
                 INSERT INTO {identifier} (id, source, payload)"
            ),
            cable_config,
        )
        .start()
        .await?;

    let mut completions: Vec<SendCompletion> = Vec::with_capacity(args.rows as usize);
    for id in 0..args.rows {
        let row = json!({
            "id": id,
            "source": "ingest-example",
            "payload": {"even": id % 2 == 0, "square": id * id},
        });
        completions.push(cable.send_value(row).await);
    }
    cable.close().await?;

    let mut failed = 0;
    for completion in completions {
        if let Err(err) = completion.await {
            error!(error = %err, "row was not ingested");
            failed += 1;
        }
    }
    info!(rows = args.rows, failed, "ingestion finished");

    let result_set = client
        .statement(format!("FROM {identifier} SELECT count(*)"))
        .execute()
        .await?;
    for row in result_set.into_values()? {
        info!(?row, "rows stored in the table");
    }

    let schema = table.table_schema().await?;
    for field in schema.fields() {
        info!(column = field.name(), data_type = ?field.data_type(), "table column");
    }

    if args.drop_table {
        table.drop().await?;
    }

    Ok(())
}
