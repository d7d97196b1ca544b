use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use cabinet_core::{Cabinet, CabinetConfig};
use cabinet_protocol::{
    CabinetApi, LoadRequest, PutRequest, QueryRequest, RecordView, RegisterRequest, WireTable,
};
use cabinet_server::{CabinetServer, ServerConfig};
use cabinet_store::Payload;
use cabinet_types::{ErrorKind, Metadata, Persistence, Predicate, Ticket};
use colored::Colorize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::*;
use crate::client::HttpClient;
use crate::output::{print_json, render_table};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let client = || HttpClient::new(cli.server.as_str(), CLIENT_TIMEOUT);
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Destroy(args) => cmd_destroy(args).await,
        Command::Get(args) => cmd_get(&client(), args, format).await,
        Command::Query(args) => cmd_query(&client(), args, format).await,
        Command::Put(args) => cmd_put(&client(), args, format).await,
        Command::Register(args) => cmd_register(&client(), args, format).await,
        Command::List => cmd_list(&client(), format).await,
        Command::Open => cmd_open(&client(), format).await,
        Command::Close => cmd_close(&client(), format).await,
        Command::Load(args) => cmd_load(&client(), args, format).await,
        Command::Status => cmd_status(&client(), format).await,
    }
}

// ---- Local commands ----

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(&args)?;
    info!(
        location = %config.cabinet.location.display(),
        datasets = config.datasets.len(),
        "starting cabinet server"
    );
    CabinetServer::new(config)?.serve().await?;
    Ok(())
}

fn server_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(location) = &args.location {
        config.cabinet.location = location.clone();
    }
    if let Some(name) = &args.name {
        config.cabinet.name = Some(name.clone());
    }
    Ok(config)
}

async fn cmd_destroy(args: DestroyArgs) -> anyhow::Result<()> {
    let cabinet = Cabinet::new(CabinetConfig::new(&args.location))?;
    cabinet.destroy(args.yes).await.map_err(|e| match e.kind() {
        ErrorKind::DestroyNotConfirmed => anyhow!("{e}; pass --yes to confirm"),
        _ => e.into(),
    })?;
    println!(
        "{} Destroyed cabinet at {}",
        "✓".green().bold(),
        args.location.display().to_string().bold()
    );
    Ok(())
}

// ---- Client commands ----

async fn cmd_get(client: &HttpClient, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ticket = Ticket::parse(&args.ticket)?;
    let table = if args.stream {
        client.get_stream(ticket).await?
    } else {
        Arc::unwrap_or_clone(client.get(ticket).await?)
    };
    match format {
        OutputFormat::Json => print_json(&WireTable::from(&table)),
        OutputFormat::Text => {
            println!("{}", render_table(&table, args.limit));
            Ok(())
        }
    }
}

async fn cmd_query(
    client: &HttpClient,
    args: QueryArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let predicate = Predicate::parse_assignments(&args.terms)?;
    let mut request = QueryRequest::new(&predicate);
    if args.require_match {
        request = request.require_match();
    }
    let response = client.query(request).await?;
    if format == OutputFormat::Json {
        return print_json(&response);
    }
    if response.tickets.is_empty() {
        println!("{}", "No matching tickets.".yellow());
    }
    for ticket in &response.tickets {
        println!("{ticket}");
    }
    Ok(())
}

async fn cmd_put(client: &HttpClient, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let payload = payload_from_json(serde_json::from_str(&text)?)?;
    debug!(kind = payload.kind_name(), "sending payload");
    let persistence = args.ephemeral.then_some(Persistence::Ephemeral);
    let response = client.put(PutRequest { payload, persistence }).await?;
    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Text => {
            println!("{} Stored {}", "✓".green().bold(), response.ticket.to_string().yellow());
            println!("  Register it with: cabinet register {} key=value...", response.ticket);
            Ok(())
        }
    }
}

async fn cmd_register(
    client: &HttpClient,
    args: RegisterArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ticket = Ticket::parse(&args.ticket)?;
    let metadata = Metadata::parse_assignments(&args.metadata)?;
    let view = client.register(RegisterRequest::new(ticket, &metadata)).await?;
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            println!("{} Registered {}", "✓".green().bold(), view.ticket.to_string().yellow());
            print_record(&view);
            Ok(())
        }
    }
}

async fn cmd_list(client: &HttpClient, format: OutputFormat) -> anyhow::Result<()> {
    let response = client.list().await?;
    if format == OutputFormat::Json {
        return print_json(&response);
    }
    println!("{}", "Named datasets:".bold());
    if response.datasets.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for definition in &response.datasets {
        println!("  {}  {}", definition.name.cyan(), definition.loader);
    }
    println!("{}", "Tickets:".bold());
    if response.tickets.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for ticket in &response.tickets {
        println!("  {ticket}");
    }
    Ok(())
}

async fn cmd_open(client: &HttpClient, format: OutputFormat) -> anyhow::Result<()> {
    let report = client.open().await?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!(
                "{} Opened: {} records restored",
                "✓".green().bold(),
                report.restored.to_string().bold()
            );
            if report.skipped > 0 {
                println!("  {} unreadable records skipped", report.skipped.to_string().yellow());
            }
            Ok(())
        }
    }
}

async fn cmd_close(client: &HttpClient, format: OutputFormat) -> anyhow::Result<()> {
    let report = client.close().await?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!("{} Closed", "✓".green().bold());
            println!("  Written: {}", report.written);
            println!("  Removed: {}", report.removed);
            println!("  Evicted: {}", report.evicted);
            Ok(())
        }
    }
}

async fn cmd_load(client: &HttpClient, args: LoadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let persistence = args.ephemeral.then_some(Persistence::Ephemeral);
    let response = client
        .load(LoadRequest {
            name: args.name.clone(),
            persistence,
        })
        .await?;
    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Text => {
            let verb = if response.reused { "Reused" } else { "Loaded" };
            println!(
                "{} {} {} as {}",
                "✓".green().bold(),
                verb,
                args.name.cyan(),
                response.ticket.to_string().yellow()
            );
            Ok(())
        }
    }
}

async fn cmd_status(client: &HttpClient, format: OutputFormat) -> anyhow::Result<()> {
    let status = client.status().await?;
    if format == OutputFormat::Json {
        return print_json(&status);
    }
    let state = if status.open { "open".green() } else { "closed".yellow() };
    match &status.name {
        Some(name) => println!("Cabinet {} ({})", name.bold(), status.id.to_string().cyan()),
        None => println!("Cabinet {}", status.id.to_string().cyan()),
    }
    println!("  State: {state}");
    println!("  Location: {}", status.location);
    println!(
        "  Records: {} ({} registered, {} persistent)",
        status.records, status.registered, status.persistent
    );
    println!("  Named datasets: {}", status.definitions);
    Ok(())
}

fn print_record(view: &RecordView) {
    println!("  Status: {}, {}", view.status, view.persistence);
    for (key, value) in &view.metadata {
        println!("  {} = {}", key.cyan(), value);
    }
}

/// Accept either a tagged payload object or a bare array of row objects.
fn payload_from_json(value: Value) -> anyhow::Result<Payload> {
    match value {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(anyhow!("row {i} is not a JSON object: {other}")),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(Payload::Rows { records })
        }
        other => serde_json::from_value(other)
            .context("expected a payload object with a \"kind\" field or an array of rows"),
    }
}
