//! Persistent store on a fjall keyspace
//!
//! Rows are JSON documents under `<table>:<id>`. Secondary indexes are
//! append-only lists spread over one key per entry, `<index>:<n>`, with the
//! entry count under `<index>:len`, so appending touches two keys and listing
//! reads only the entries of that index.
//!
//! Every insert stages its row, counter and index keys in a [`WriteSet`] and
//! commits them as one fjall write batch under the async write lock.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use fjall::{Database, Keyspace};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task;

use super::WeatherStore;
use crate::models::{
    AccuracyMetric, NewForecast, NewLocation, NewObservation, ProviderAccuracy, RowId,
    StoredAccuracyMetric, StoredForecast, StoredLocation, StoredObservation,
};
use crate::{Result, WeatherCompareError};

const KEYSPACE: &str = "weather";
const COUNTER_KEY: &str = "meta:next_id";

fn location_key(id: RowId) -> String {
    format!("location:{id}")
}

fn forecast_key(id: RowId) -> String {
    format!("forecast:{id}")
}

fn observation_key(id: RowId) -> String {
    format!("observation:{id}")
}

fn metric_key(id: RowId) -> String {
    format!("metric:{id}")
}

fn metric_pair_key(forecast_id: RowId, observation_id: RowId) -> String {
    format!("metric_pair:{forecast_id}:{observation_id}")
}

fn location_index(location_id: RowId, table: &str) -> String {
    format!("index:location:{location_id}:{table}")
}

/// Exact-match bucket for a coordinate pair; `-0.0` and `0.0` share one
fn coordinates_index(latitude: f64, longitude: f64) -> String {
    let bits = |v: f64| {
        let normalized = if v == 0.0 { 0.0_f64 } else { v };
        normalized.to_bits()
    };
    format!("index:coords:{:016x}:{:016x}", bits(latitude), bits(longitude))
}

fn storage_error(e: impl std::fmt::Display) -> WeatherCompareError {
    WeatherCompareError::storage(e.to_string())
}

fn read<T: DeserializeOwned>(rows: &Keyspace, key: &str) -> Result<Option<T>> {
    let Some(bytes) = rows.get(key.as_bytes()).map_err(storage_error)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| storage_error(format!("corrupt row {key}: {e}")))
}

fn index_len(rows: &Keyspace, index: &str) -> Result<u64> {
    Ok(read(rows, &format!("{index}:len"))?.unwrap_or(0))
}

fn index_ids(rows: &Keyspace, index: &str) -> Result<Vec<RowId>> {
    (0..index_len(rows, index)?)
        .map(|n| {
            let key = format!("{index}:{n}");
            read(rows, &key)?.ok_or_else(|| storage_error(format!("missing index entry {key}")))
        })
        .collect()
}

fn load_indexed<T: DeserializeOwned>(
    rows: &Keyspace,
    index: &str,
    row_key: fn(RowId) -> String,
) -> Result<Vec<T>> {
    index_ids(rows, index)?
        .into_iter()
        .map(|id| {
            let key = row_key(id);
            read(rows, &key)?.ok_or_else(|| storage_error(format!("dangling index entry {key}")))
        })
        .collect()
}

/// Keys staged for one atomic commit
struct WriteSet {
    entries: Vec<(String, Vec<u8>)>,
    next_id: Option<RowId>,
}

impl WriteSet {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: None,
        }
    }

    fn put<T: Serialize>(&mut self, key: String, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(storage_error)?;
        self.entries.push((key, bytes));
        Ok(())
    }

    /// Allocate the next row id; the counter is written on commit
    fn allocate_id(&mut self, rows: &Keyspace) -> Result<RowId> {
        let current = match self.next_id {
            Some(id) => id,
            None => read::<RowId>(rows, COUNTER_KEY)?.unwrap_or(0),
        };
        let id = current + 1;
        self.next_id = Some(id);
        Ok(id)
    }

    fn append(&mut self, rows: &Keyspace, index: &str, id: RowId) -> Result<()> {
        let len = index_len(rows, index)?;
        self.put(format!("{index}:{len}"), &id)?;
        self.put(format!("{index}:len"), &(len + 1))
    }

    fn commit(mut self, handles: &Handles) -> Result<()> {
        if let Some(id) = self.next_id {
            self.put(COUNTER_KEY.to_string(), &id)?;
        }
        let mut batch = handles.db.batch();
        for (key, value) in self.entries {
            batch.insert(&handles.rows, key.into_bytes(), value);
        }
        batch.commit().map_err(storage_error)
    }
}

#[derive(Clone)]
struct Handles {
    db: Database,
    rows: Keyspace,
}

pub struct FjallStore {
    handles: Handles,
    write_lock: Mutex<()>,
}

impl FjallStore {
    /// Open (or create) the database directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::builder(&path).open().map_err(storage_error)?;
        let rows = db
            .keyspace(KEYSPACE, fjall::KeyspaceCreateOptions::default)
            .map_err(storage_error)?;
        Ok(Self {
            handles: Handles { db, rows },
            write_lock: Mutex::new(()),
        })
    }

    /// Run a blocking keyspace operation off the async runtime
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Handles) -> Result<T> + Send + 'static,
    {
        let handles = self.handles.clone();
        task::spawn_blocking(move || op(&handles))
            .await
            .map_err(|e| storage_error(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl WeatherStore for FjallStore {
    #[tracing::instrument(name = "store_insert_location", level = "debug", skip_all)]
    async fn insert_location(&self, location: NewLocation) -> Result<StoredLocation> {
        let _guard = self.write_lock.lock().await;
        self.blocking(move |h| {
            let mut writes = WriteSet::new();
            let row = StoredLocation {
                id: writes.allocate_id(&h.rows)?,
                session_id: location.session_id,
                location: location.location,
                created_at: Utc::now(),
            };
            writes.put(location_key(row.id), &row)?;
            writes.append(
                &h.rows,
                &coordinates_index(row.location.latitude, row.location.longitude),
                row.id,
            )?;
            writes.commit(h)?;
            Ok(row)
        })
        .await
    }

    async fn get_location(&self, id: RowId) -> Result<Option<StoredLocation>> {
        self.blocking(move |h| read(&h.rows, &location_key(id))).await
    }

    async fn find_location_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        session_id: Option<&str>,
    ) -> Result<Option<StoredLocation>> {
        let session_id = session_id.map(str::to_string);
        self.blocking(move |h| {
            let candidates: Vec<StoredLocation> = load_indexed(
                &h.rows,
                &coordinates_index(latitude, longitude),
                location_key,
            )?;
            Ok(candidates.into_iter().find(|l| {
                session_id.as_deref().is_none_or(|s| l.session_id == s)
                    && l.location.same_coordinates(latitude, longitude)
            }))
        })
        .await
    }

    #[tracing::instrument(name = "store_insert_forecast", level = "debug", skip_all)]
    async fn insert_forecast(&self, forecast: NewForecast) -> Result<StoredForecast> {
        let _guard = self.write_lock.lock().await;
        self.blocking(move |h| {
            let mut writes = WriteSet::new();
            let row = StoredForecast {
                id: writes.allocate_id(&h.rows)?,
                location_id: forecast.location_id,
                provider_id: forecast.provider_id,
                forecast: forecast.forecast,
                forecast_timestamp: forecast.forecast_timestamp,
                created_at: Utc::now(),
            };
            writes.put(forecast_key(row.id), &row)?;
            writes.append(&h.rows, &location_index(row.location_id, "forecasts"), row.id)?;
            writes.commit(h)?;
            Ok(row)
        })
        .await
    }

    #[tracing::instrument(name = "store_insert_observation", level = "debug", skip_all)]
    async fn insert_observation(&self, observation: NewObservation) -> Result<StoredObservation> {
        let _guard = self.write_lock.lock().await;
        self.blocking(move |h| {
            let mut writes = WriteSet::new();
            let row = StoredObservation {
                id: writes.allocate_id(&h.rows)?,
                location_id: observation.location_id,
                observation: observation.observation,
                observed_timestamp: observation.observed_timestamp,
                created_at: Utc::now(),
            };
            writes.put(observation_key(row.id), &row)?;
            writes.append(
                &h.rows,
                &location_index(row.location_id, "observations"),
                row.id,
            )?;
            writes.commit(h)?;
            Ok(row)
        })
        .await
    }

    async fn list_forecasts_by_location(&self, location_id: RowId) -> Result<Vec<StoredForecast>> {
        self.blocking(move |h| {
            load_indexed(&h.rows, &location_index(location_id, "forecasts"), forecast_key)
        })
        .await
    }

    async fn list_observations_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<StoredObservation>> {
        self.blocking(move |h| {
            load_indexed(
                &h.rows,
                &location_index(location_id, "observations"),
                observation_key,
            )
        })
        .await
    }

    async fn find_accuracy_metric(
        &self,
        forecast_id: RowId,
        observation_id: RowId,
    ) -> Result<Option<StoredAccuracyMetric>> {
        self.blocking(move |h| {
            match read::<RowId>(&h.rows, &metric_pair_key(forecast_id, observation_id))? {
                Some(id) => read(&h.rows, &metric_key(id)),
                None => Ok(None),
            }
        })
        .await
    }

    #[tracing::instrument(name = "store_insert_metric", level = "debug", skip_all)]
    async fn insert_accuracy_metric(&self, metric: AccuracyMetric) -> Result<StoredAccuracyMetric> {
        let _guard = self.write_lock.lock().await;
        self.blocking(move |h| {
            let forecast: StoredForecast = read(&h.rows, &forecast_key(metric.forecast_id))?
                .ok_or_else(|| {
                    WeatherCompareError::not_found(format!(
                        "Forecast {} does not exist",
                        metric.forecast_id
                    ))
                })?;

            let mut writes = WriteSet::new();
            let row = StoredAccuracyMetric {
                id: writes.allocate_id(&h.rows)?,
                metric,
                created_at: Utc::now(),
            };
            writes.put(metric_key(row.id), &row)?;
            writes.put(
                metric_pair_key(row.metric.forecast_id, row.metric.observation_id),
                &row.id,
            )?;
            writes.append(
                &h.rows,
                &location_index(forecast.location_id, "metrics"),
                row.id,
            )?;
            writes.commit(h)?;
            Ok(row)
        })
        .await
    }

    async fn list_accuracy_metrics_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<ProviderAccuracy>> {
        self.blocking(move |h| {
            let metrics: Vec<StoredAccuracyMetric> =
                load_indexed(&h.rows, &location_index(location_id, "metrics"), metric_key)?;

            metrics
                .into_iter()
                .map(|stored| {
                    let forecast: StoredForecast =
                        read(&h.rows, &forecast_key(stored.metric.forecast_id))?.ok_or_else(
                            || storage_error(format!("metric {} lost its forecast", stored.id)),
                        )?;
                    Ok(ProviderAccuracy {
                        stored,
                        provider_id: forecast.provider_id,
                    })
                })
                .collect()
        })
        .await
    }
}
