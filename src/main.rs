mod consts;
mod deleter;
mod events;
mod lister;
mod pool;
mod s3;
mod store;
mod syncer;
use crate::deleter::delete_orphans;
use crate::events::{merge_results, ListEvent, SyncEvent};
use crate::lister::list_bounded;
use crate::s3::{get_bucket_region, S3Store};
use crate::syncer::sync_keys;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{stderr, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt::time::OffsetTime, prelude::*};

/// Synchronize the contents of one S3 bucket to another as discrete,
/// independently invocable tasks
///
/// Each task reads a JSON event from a file (or standard input) and writes
/// its result, if any, to standard output as JSON, so that an external
/// workflow can chain list pages into copy and delete batches.
#[derive(Clone, Debug, Parser)]
#[command(version)]
struct Arguments {
    /// Set logging level
    #[arg(
        short,
        long,
        default_value = "INFO",
        value_name = "ERROR|WARN|INFO|DEBUG|TRACE"
    )]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// List one size-bounded page of object keys from the bucket the event
    /// selects, resuming from the event's continuation token
    ListBucket {
        /// File to read the JSON event from; standard input by default
        event: Option<PathBuf>,
    },

    /// Copy the listed keys from the source bucket to the destination
    /// bucket, omitting keys that are already current
    CopyKeys {
        /// File to read the JSON event from; standard input by default
        event: Option<PathBuf>,
    },

    /// Delete listed keys from the destination bucket that are no longer
    /// present in the source bucket
    DeleteOrphans {
        /// File to read the JSON event from; standard input by default
        event: Option<PathBuf>,
    },

    /// Print the region the given bucket lives in
    BucketRegion { bucket: String },

    /// Merge a JSON array of result objects into a single object
    MergeResults {
        /// File to read the JSON array from; standard input by default
        event: Option<PathBuf>,
    },
}

// See
// <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/time/struct.OffsetTime.html#method.local_rfc_3339>
// for an explanation of the main + #[tokio::main]run thing
fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    let timer =
        OffsetTime::local_rfc_3339().context("failed to determine local timezone offset")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(stderr().is_terminal())
                .with_writer(stderr),
        )
        .with(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), args.log_level)
                .with_target("aws_config", Level::DEBUG.min(args.log_level))
                .with_default(Level::INFO.min(args.log_level)),
        )
        .init();
    run(args)
}

#[tokio::main]
async fn run(args: Arguments) -> anyhow::Result<()> {
    match args.command {
        Command::ListBucket { event } => {
            let event: ListEvent = read_event(event.as_deref())?;
            let bucket = event.bucket()?.to_owned();
            let store = S3Store::new(event.source_region.clone()).await;
            tracing::info!(bucket = %bucket, region = ?store.region(), "Preparing to list bucket");
            let page = list_bounded(
                &store,
                &bucket,
                event.prefix(),
                event.token(),
                event.max_keys(),
            )
            .await?;
            emit(&page)
        }
        Command::CopyKeys { event } => {
            let event: SyncEvent = read_event(event.as_deref())?;
            let store = S3Store::new(event.source_region.clone()).await;
            sync_keys(store, &event.source, &event.destination, event.list_result.keys).await?;
            Ok(())
        }
        Command::DeleteOrphans { event } => {
            let event: SyncEvent = read_event(event.as_deref())?;
            let store = S3Store::new(event.source_region.clone()).await;
            delete_orphans(store, &event.source, &event.destination, event.list_result.keys)
                .await?;
            Ok(())
        }
        Command::BucketRegion { bucket } => {
            tracing::info!(bucket = %bucket, "Looking up bucket location");
            let region = get_bucket_region(&bucket).await?;
            println!("{region}");
            Ok(())
        }
        Command::MergeResults { event } => {
            let parts: Vec<Map<String, Value>> = read_event(event.as_deref())?;
            emit(&merge_results(parts))
        }
    }
}

/// Read and deserialize a JSON event from `path`, or from standard input if
/// no path was given
fn read_event<T: DeserializeOwned>(path: Option<&Path>) -> anyhow::Result<T> {
    let content = match path {
        Some(path) => fs_err::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from standard input")?;
            buf
        }
    };
    serde_json::from_str(&content).context("failed to deserialize input event")
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(value).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}
