//! The export and import commands.

use std::path::PathBuf;

use tracing::info;

use metagame_common::{project_all, Event};

use crate::client::ApiClient;
use crate::config::EVENTS_ITEM_TYPE;
use crate::error::Result;
use crate::fetch::{fetch_all, HttpPageSource};
use crate::store::ProfileStore;
use crate::submit::{submit, HttpBatchSink, SubmitSummary};

/// Fetch every event of a profile and write them to the store
pub async fn export_profile(
    client: &ApiClient,
    store: &ProfileStore,
    space: &str,
    profile: &str,
    per_page: usize,
) -> Result<PathBuf> {
    store.profile_dir(space, profile)?;

    let source = HttpPageSource::new(client.clone(), client.events_url(space, profile));
    let events: Vec<Event> = fetch_all(&source, per_page).await?;
    info!("Retrieved {} events", events.len());

    store.write(space, profile, EVENTS_ITEM_TYPE, &events).await
}

/// Load an exported profile and re-create its events through the bulk-create
/// endpoint. Nothing is rolled back if a later batch fails.
pub async fn import_profile(
    client: &ApiClient,
    store: &ProfileStore,
    space: &str,
    profile: &str,
    batch_size: usize,
) -> Result<SubmitSummary> {
    store.profile_dir(space, profile)?;

    let events: Vec<Event> = store.load(space, profile, EVENTS_ITEM_TYPE).await?;
    let records = project_all(&events)?;
    info!(
        "Importing {} events in batches of {}",
        records.len(),
        batch_size
    );

    let sink = HttpBatchSink::new(client.clone(), client.bulk_create_events_url(space, profile));
    submit(&sink, &records, batch_size).await
}
