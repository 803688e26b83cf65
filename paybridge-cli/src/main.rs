//! PayBridge developer CLI
//!
//! Drives a complete redirect flow against a scripted payment SDK and prints
//! how the caller was settled.
//!
//! # Example
//!
//! ```bash
//! # Two pending polls, then chargeable
//! paybridge simulate --statuses pending,pending,chargeable
//!
//! # The customer closes the browser without returning
//! RUST_LOG=debug paybridge simulate --return cancelled
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{bail, eyre, WrapErr};
use paybridge_core::testing::{ScriptedQuery, ScriptedSdk};
use paybridge_core::{
    build_return_url, ErrorCatalog, InitOptions, PayBridgeError, PollPolicy, RedirectSession,
    RedirectSurface, ReturnOutcome, Source, SourceFlow, SourceParams, SourceType, SurfaceError,
    DEFAULT_MAX_POLL_RETRIES, DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_RETRY_DELAY_MS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RETURN_URL: &str = "paybridge-cli://redirect";

#[derive(Parser, Debug)]
#[command(name = "paybridge")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a source and walks it through the redirect and status polling.
    Simulate(SimulateArgs),
    /// Prints the default error catalog as JSON.
    ErrorCodes,
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// Publishable key handed to the scripted SDK, must start with `pk_`
    #[arg(long, env = "PAYBRIDGE_PUBLISHABLE_KEY", default_value = "pk_test_cli")]
    publishable_key: String,

    /// Flow of the created source (`redirect`, `receiver`, `code_verification`, `none`)
    #[arg(long, default_value = "redirect")]
    flow: SourceFlow,

    /// Scripted status query results, in order. `error` makes a query fail.
    #[arg(long, value_delimiter = ',', default_value = "pending,chargeable")]
    statuses: Vec<String>,

    /// What the redirect return carries
    #[arg(long = "return", value_enum, default_value_t = ReturnMode::Matching)]
    return_mode: ReturnMode,

    /// Re-queries while the source stays pending
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_RETRIES)]
    max_retries: u32,

    /// Delay between two status queries
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS)]
    retry_delay_ms: u64,

    /// Timeout of a single status query
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_MS)]
    query_timeout_ms: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReturnMode {
    /// The return URL carries the created source's identifiers.
    Matching,
    /// The app resumes without a return URL.
    Cancelled,
    /// The return URL carries another client secret.
    WrongSecret,
    /// The return URL carries another source id.
    WrongSource,
}

/// Surface that only reports the URL it would open.
struct ConsoleSurface;

impl RedirectSurface for ConsoleSurface {
    fn is_available(&self) -> bool {
        true
    }

    fn open_url(&self, url: String) -> Result<(), SurfaceError> {
        info!(url, "opening redirect");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Simulate(args) => simulate(args).await,
        Command::ErrorCodes => print_error_codes(),
    }
}

fn print_error_codes() -> eyre::Result<()> {
    let entries = ErrorCatalog::default()
        .entries()
        .into_iter()
        .map(|(kind, descriptor)| {
            serde_json::to_value(descriptor).map(|value| (kind.to_string(), value))
        })
        .collect::<Result<serde_json::Map<_, _>, serde_json::Error>>()?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

async fn simulate(args: SimulateArgs) -> eyre::Result<()> {
    let policy = PollPolicy {
        max_retries: args.max_retries,
        retry_delay_ms: args.retry_delay_ms,
        query_timeout_ms: args.query_timeout_ms,
    };
    let script = args.statuses.iter().map(|entry| ScriptedQuery::parse(entry));
    let sdk = Arc::new(ScriptedSdk::new(args.flow).answering(script));
    let session = RedirectSession::new(sdk.clone(), Arc::new(ConsoleSurface), Some(policy));
    session.init(
        InitOptions {
            publishable_key: Some(args.publishable_key),
        },
        HashMap::new(),
    )?;

    let mut params = SourceParams::new(SourceType::Ideal);
    params.amount = Some(1_099);
    params.currency = Some("eur".to_string());
    params.return_url = Some(RETURN_URL.to_string());

    let caller = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.create_source_with_redirect(params).await })
    };

    while !session.has_pending_request() {
        if caller.is_finished() {
            return report(caller.await?);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let callback_url = return_leg(&sdk, args.return_mode)?;
    match session.handle_redirect_return(callback_url).await {
        ReturnOutcome::Abandoned { reason } => {
            bail!("polling abandoned ({reason}); the caller is never settled")
        }
        outcome => info!(?outcome, queries = sdk.query_count(), "redirect return handled"),
    }
    report(caller.await?)
}

/// Builds the callback URL for `mode` from the source the SDK created last.
fn return_leg(sdk: &ScriptedSdk, mode: ReturnMode) -> eyre::Result<Option<String>> {
    let source = sdk
        .last_created()
        .ok_or_else(|| eyre!("the sdk has not created a source"))?;
    let (source_id, client_secret) = match mode {
        ReturnMode::Cancelled => return Ok(None),
        ReturnMode::Matching => (source.id, source.client_secret),
        ReturnMode::WrongSecret => (source.id, "src_client_secret_forged".to_string()),
        ReturnMode::WrongSource => ("src_someone_else".to_string(), source.client_secret),
    };
    let url = build_return_url(RETURN_URL, &source_id, &client_secret)
        .wrap_err("failed to build the return url")?;
    Ok(Some(url))
}

fn report(result: Result<Source, PayBridgeError>) -> eyre::Result<()> {
    match result {
        Ok(source) => {
            println!("{}", serde_json::to_string_pretty(&source)?);
            Ok(())
        }
        Err(error) => bail!("{error}"),
    }
}
