use tracing::{debug, info};

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::trip::{NewTripEntry, TripEntry},
    sanitize::{tokenize, unescape_text},
};

const TRIP_COLUMNS: &str = "id, date, timestamp, odometer, description, photo";

/// Handle to the trip database.
///
/// Cloning is cheap and every clone talks to the same pool. Each handle
/// owns its own database, so tests open one per case.
#[derive(Clone, Debug)]
pub struct TripStore {
    pool: DbPool,
}

impl TripStore {
    /// Opens the database at `database_url`, creating and migrating it on
    /// first use.
    pub async fn open(database_url: &str) -> Result<Self, AppError> {
        let pool = db::init_pool(database_url).await?;
        db::migrate(&pool).await?;
        info!("trip store opened at {database_url}");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("trip store closed");
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.pool.is_closed() {
            return Err(AppError::StorageUnavailable("trip store is closed".into()));
        }
        Ok(())
    }

    /// Stores a trip together with its description tokens and returns the
    /// assigned id.
    pub async fn insert(&self, entry: &NewTripEntry) -> Result<i64, AppError> {
        self.ensure_open()?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let id = sqlx::query(
            "INSERT INTO trips (date, timestamp, odometer, description, photo) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.date)
        .bind(entry.timestamp)
        .bind(entry.odometer)
        .bind(&entry.description)
        .bind(&entry.photo)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        // descriptions arrive escaped; index the words the user typed
        for token in tokenize(&unescape_text(&entry.description)) {
            sqlx::query("INSERT INTO trip_description_tokens (trip_id, token) VALUES (?, ?)")
                .bind(id)
                .bind(token)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(id, date = %entry.date, odometer = entry.odometer, "trip stored");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<TripEntry>, AppError> {
        self.ensure_open()?;
        let query = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?");
        let trip = sqlx::query_as::<_, TripEntry>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trip)
    }

    /// Every stored trip. No particular order; see
    /// [`TripEntry::sort_chronologically`].
    pub async fn query_all(&self) -> Result<Vec<TripEntry>, AppError> {
        self.ensure_open()?;
        let query = format!("SELECT {TRIP_COLUMNS} FROM trips");
        let trips = sqlx::query_as::<_, TripEntry>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(trips)
    }

    /// Trips whose date lies in `from..=to`. Dates compare as text, which
    /// matches calendar order for `YYYY-MM-DD`.
    pub async fn query_by_date_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<TripEntry>, AppError> {
        self.ensure_open()?;
        let query = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE date >= ? AND date <= ? ORDER BY date"
        );
        let trips = sqlx::query_as::<_, TripEntry>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(trips)
    }

    /// Trips whose odometer reading lies in `min..=max`.
    pub async fn query_by_odometer_range(
        &self,
        min: f64,
        max: f64,
    ) -> Result<Vec<TripEntry>, AppError> {
        self.ensure_open()?;
        let query = format!(
            "SELECT {TRIP_COLUMNS} FROM trips \
             WHERE odometer >= ? AND odometer <= ? ORDER BY odometer"
        );
        let trips = sqlx::query_as::<_, TripEntry>(&query)
            .bind(min)
            .bind(max)
            .fetch_all(&self.pool)
            .await?;
        Ok(trips)
    }

    /// Trips whose description contains every word of `keywords`. Matching
    /// is whole-word and case-insensitive. A query without words matches
    /// nothing.
    pub async fn search_description(&self, keywords: &str) -> Result<Vec<TripEntry>, AppError> {
        self.ensure_open()?;
        let tokens = tokenize(keywords);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; tokens.len()].join(", ");
        let query = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id IN (\
                SELECT trip_id FROM trip_description_tokens \
                WHERE token IN ({placeholders}) \
                GROUP BY trip_id HAVING COUNT(*) = ?\
             )"
        );
        let mut q = sqlx::query_as::<_, TripEntry>(&query);
        for token in &tokens {
            q = q.bind(token);
        }
        let trips = q.bind(tokens.len() as i64).fetch_all(&self.pool).await?;
        debug!(keywords, hits = trips.len(), "description search");
        Ok(trips)
    }

    /// Removes a trip. Returns whether anything was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.ensure_open()?;
        let result = sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn unavailable(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            AppError::StorageUnavailable(err.to_string())
        }
        other => AppError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_text;
    use tempfile::TempDir;

    async fn open_store() -> (TripStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("trips.db").to_string_lossy());
        let store = TripStore::open(&url).await.expect("open store");
        (store, dir)
    }

    fn entry(date: &str, timestamp: i64, odometer: f64, description: &str) -> NewTripEntry {
        NewTripEntry {
            date: date.into(),
            timestamp,
            odometer,
            description: description.into(),
            photo: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let (store, _dir) = open_store().await;
        let first = store
            .insert(&entry("2024-05-01", 1, 100.0, "first"))
            .await
            .expect("insert");
        let second = store
            .insert(&entry("2024-05-02", 2, 150.0, "second"))
            .await
            .expect("insert");
        assert_ne!(first, second);

        let stored = store.get(first).await.expect("get").expect("present");
        assert_eq!(stored.id, Some(first));
        assert_eq!(stored.description, "first");
        assert_eq!(stored.odometer, 100.0);
    }

    #[tokio::test]
    async fn query_all_then_sort_is_chronological() {
        let (store, _dir) = open_store().await;
        for (ts, odo) in [(300, 30.0), (100, 10.0), (200, 20.0)] {
            store
                .insert(&entry("2024-05-01", ts, odo, "trip"))
                .await
                .expect("insert");
        }
        let mut trips = store.query_all().await.expect("query");
        TripEntry::sort_chronologically(&mut trips);
        let stamps: Vec<_> = trips.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn range_scans_are_inclusive() {
        let (store, _dir) = open_store().await;
        for (ts, (date, odo)) in [
            ("2024-04-30", 90.0),
            ("2024-05-01", 100.0),
            ("2024-05-15", 180.0),
            ("2024-06-01", 250.0),
        ]
        .into_iter()
        .enumerate()
        {
            store
                .insert(&entry(date, ts as i64, odo, "trip"))
                .await
                .expect("insert");
        }

        let may = store
            .query_by_date_range("2024-05-01", "2024-05-31")
            .await
            .expect("date range");
        let dates: Vec<_> = may.iter().map(|t| t.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-05-01", "2024-05-15"]);

        let mid = store
            .query_by_odometer_range(100.0, 250.0)
            .await
            .expect("odometer range");
        let readings: Vec<_> = mid.iter().map(|t| t.odometer).collect();
        assert_eq!(readings, vec![100.0, 180.0, 250.0]);
    }

    #[tokio::test]
    async fn keyword_search_needs_every_word() {
        let (store, _dir) = open_store().await;
        let client = store
            .insert(&entry("2024-05-01", 1, 10.0, "Client visit Rotterdam"))
            .await
            .expect("insert");
        store
            .insert(&entry("2024-05-02", 2, 20.0, "Client lunch"))
            .await
            .expect("insert");

        let hits = store.search_description("client").await.expect("search");
        assert_eq!(hits.len(), 2);

        let hits = store
            .search_description("rotterdam CLIENT")
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, Some(client));

        assert!(store.search_description("cli").await.expect("search").is_empty());
        assert!(store.search_description("  ").await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn escaped_markup_is_not_searchable() {
        let (store, _dir) = open_store().await;
        for description in ["Tom & Jerry", r#"Bob's "car" <van>"#] {
            store
                .insert(&entry("2024-05-01", 1, 10.0, &sanitize_text(description)))
                .await
                .expect("insert");
        }

        for word in ["amp", "quot", "39", "lt", "gt"] {
            let hits = store.search_description(word).await.expect("search");
            assert!(hits.is_empty(), "{word} matched {}", hits.len());
        }
        assert_eq!(store.search_description("jerry").await.expect("search").len(), 1);
        assert_eq!(store.search_description("van").await.expect("search").len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row_and_tokens() {
        let (store, _dir) = open_store().await;
        let id = store
            .insert(&entry("2024-05-01", 1, 10.0, "parking garage"))
            .await
            .expect("insert");
        assert!(store.delete(id).await.expect("delete"));
        assert!(!store.delete(id).await.expect("delete again"));
        assert!(store.get(id).await.expect("get").is_none());
        assert!(store.search_description("parking").await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn closed_store_rejects_writes() {
        let (store, _dir) = open_store().await;
        store.close().await;
        let err = store
            .insert(&entry("2024-05-01", 1, 10.0, "late"))
            .await
            .expect_err("closed store");
        assert!(matches!(err, AppError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn reopening_keeps_data() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("trips.db").to_string_lossy());

        let store = TripStore::open(&url).await.expect("open");
        let id = store
            .insert(&entry("2024-05-01", 1, 10.0, "persisted"))
            .await
            .expect("insert");
        store.close().await;

        let reopened = TripStore::open(&url).await.expect("reopen");
        let trip = reopened.get(id).await.expect("get").expect("present");
        assert_eq!(trip.description, "persisted");
    }
}
