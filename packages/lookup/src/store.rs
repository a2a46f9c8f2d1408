//! Feature store abstraction and the `DuckDB`-backed implementation.
//!
//! The engine only talks to a [`FeatureStore`]. [`IndexedStore`] loads all
//! features and sources from `DuckDB` once, builds the R-tree indexes, and
//! answers queries from memory. [`IndexedStore::reload`] rebuilds the
//! snapshot and swaps it in atomically; in-flight lookups keep using the
//! snapshot they started with.
//!
//! A file-backed store ([`IndexedStore::open`]) only holds the `DuckDB`
//! file open, read-only, while a snapshot is being loaded. Imports in
//! another process can write between loads and are picked up by the next
//! reload.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use duckdb::Connection;
use septic_locator_database::{DbError, feature_db};
use septic_locator_septic_models::{LatLng, NearbyFeature, Source};
use septic_locator_spatial::{CoverageIndex, FeatureIndex};

/// Errors a [`FeatureStore`] can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(#[source] DbError),

    /// The store exists but its tables were never created.
    #[error("Store schema missing: table {table} does not exist")]
    MissingSchema {
        /// The table that was expected.
        table: &'static str,
    },

    /// The store could not answer (timeout, poisoned lock, failed load).
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::MissingSchema { table } => Self::MissingSchema { table },
            DbError::NotFound { .. } => Self::MissingSchema {
                table: feature_db::FEATURES_TABLE,
            },
            other => Self::Database(other),
        }
    }
}

impl StoreError {
    /// Whether this error means the deployment never created the schema.
    #[must_use]
    pub const fn is_missing_schema(&self) -> bool {
        matches!(self, Self::MissingSchema { .. })
    }
}

/// Read access to septic features and their data sources.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Registered sources whose coverage extent contains `point`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    async fn covering_sources(&self, point: LatLng) -> Result<Vec<Source>, StoreError>;

    /// Features within `radius_meters` of `point`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    async fn find_nearest(
        &self,
        point: LatLng,
        radius_meters: f64,
    ) -> Result<Vec<NearbyFeature>, StoreError>;

    /// Every registered source, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    async fn sources(&self) -> Result<Vec<Source>, StoreError>;
}

/// Runs `fut`, turning an elapsed `timeout` into [`StoreError::Unavailable`].
///
/// # Errors
///
/// Returns the store's own error, or [`StoreError::Unavailable`] on timeout.
pub async fn with_timeout<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| {
            Err(StoreError::Unavailable {
                message: format!("{operation} timed out after {}ms", timeout.as_millis()),
            })
        })
}

/// Logs a store failure at the level the failure warrants.
pub fn report_store_error(operation: &str, error: &StoreError) {
    if error.is_missing_schema() {
        log::error!(
            "{operation}: {error}. Deployment incomplete: run `septic_locator migrate` \
             and import at least one source"
        );
    } else {
        log::error!("{operation} failed: {error}");
    }
}

#[derive(Debug, Clone)]
enum SnapshotState {
    Ready,
    MissingSchema(&'static str),
    Failed(String),
}

/// One immutable, fully built set of indexes.
pub struct IndexSnapshot {
    features: FeatureIndex,
    coverage: CoverageIndex,
    state: SnapshotState,
}

impl IndexSnapshot {
    fn unavailable(error: &StoreError) -> Self {
        let state = match error {
            StoreError::MissingSchema { table } => SnapshotState::MissingSchema(*table),
            other => SnapshotState::Failed(other.to_string()),
        };
        Self {
            features: FeatureIndex::empty(),
            coverage: CoverageIndex::empty(),
            state,
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.state {
            SnapshotState::Ready => Ok(()),
            SnapshotState::MissingSchema(table) => Err(StoreError::MissingSchema { table: *table }),
            SnapshotState::Failed(message) => Err(StoreError::Unavailable {
                message: message.clone(),
            }),
        }
    }

    /// Number of indexed features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Number of registered sources, with or without an extent.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.coverage.registered()
    }
}

/// Counts reported after a (re)load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadStats {
    /// Features indexed.
    pub features: usize,
    /// Sources registered.
    pub sources: usize,
}

enum Backing {
    /// Opened read-only for each load and closed again.
    File(PathBuf),
    /// A connection owned for the store's lifetime (in-memory stores).
    Connection(Mutex<Connection>),
}

/// [`FeatureStore`] serving from in-memory indexes built from `DuckDB`.
pub struct IndexedStore {
    backing: Backing,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    coverage_margin_meters: f64,
}

impl IndexedStore {
    /// Serves the feature store file at `path`.
    ///
    /// A missing file or failed initial load does not fail construction:
    /// the store starts unavailable, every query reports the cause, and a
    /// later [`reload`](Self::reload) can recover once the data is in place.
    #[must_use]
    pub fn open(path: &Path, coverage_margin_meters: f64) -> Self {
        Self::with_backing(Backing::File(path.to_path_buf()), coverage_margin_meters)
    }

    /// Serves from `conn`, which stays open for the store's lifetime.
    #[must_use]
    pub fn new(conn: Connection, coverage_margin_meters: f64) -> Self {
        Self::with_backing(
            Backing::Connection(Mutex::new(conn)),
            coverage_margin_meters,
        )
    }

    fn with_backing(backing: Backing, coverage_margin_meters: f64) -> Self {
        let snapshot = match load_snapshot(&backing, coverage_margin_meters) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report_store_error("Initial index load", &e);
                IndexSnapshot::unavailable(&e)
            }
        };

        Self {
            backing,
            snapshot: RwLock::new(Arc::new(snapshot)),
            coverage_margin_meters,
        }
    }

    /// Rebuilds the indexes from the database and swaps them in.
    ///
    /// On failure the previous snapshot stays in service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the features or sources cannot be loaded,
    /// including when an import holds the file's write lock.
    pub fn reload(&self) -> Result<ReloadStats, StoreError> {
        let snapshot = load_snapshot(&self.backing, self.coverage_margin_meters)?;

        let stats = ReloadStats {
            features: snapshot.feature_count(),
            sources: snapshot.source_count(),
        };

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        log::info!(
            "Reloaded feature store: {} features, {} sources",
            stats.features,
            stats.sources
        );
        Ok(stats)
    }

    /// The snapshot currently in service.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn load_snapshot(backing: &Backing, margin_meters: f64) -> Result<IndexSnapshot, StoreError> {
    match backing {
        Backing::File(path) => {
            let conn = feature_db::open_read_only(path)?;
            build_snapshot(&conn, margin_meters)
        }
        Backing::Connection(conn) => {
            let conn = conn.lock().map_err(|_| StoreError::Unavailable {
                message: "store connection lock poisoned".to_string(),
            })?;
            build_snapshot(&conn, margin_meters)
        }
    }
}

fn build_snapshot(conn: &Connection, margin_meters: f64) -> Result<IndexSnapshot, StoreError> {
    let features = feature_db::load_features(conn)?;
    let sources = feature_db::load_sources(conn)?;
    log::debug!(
        "Building indexes from {} features and {} sources",
        features.len(),
        sources.len()
    );

    let features = FeatureIndex::build(features);
    let coverage = CoverageIndex::build(sources, &features, margin_meters);

    Ok(IndexSnapshot {
        features,
        coverage,
        state: SnapshotState::Ready,
    })
}

#[async_trait]
impl FeatureStore for IndexedStore {
    async fn covering_sources(&self, point: LatLng) -> Result<Vec<Source>, StoreError> {
        let snapshot = self.snapshot();
        snapshot.check()?;
        Ok(snapshot.coverage.covering(point))
    }

    async fn find_nearest(
        &self,
        point: LatLng,
        radius_meters: f64,
    ) -> Result<Vec<NearbyFeature>, StoreError> {
        let snapshot = self.snapshot();
        snapshot.check()?;
        Ok(snapshot.features.find_nearest(point, radius_meters))
    }

    async fn sources(&self) -> Result<Vec<Source>, StoreError> {
        let snapshot = self.snapshot();
        snapshot.check()?;
        Ok(snapshot.coverage.sources())
    }
}
