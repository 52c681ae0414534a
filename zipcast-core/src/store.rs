use sqlx::{
    Sqlite, SqlitePool, migrate::MigrateDatabase, sqlite::SqlitePoolOptions,
};
use tokio::sync::watch;
use tracing::info;

use crate::{
    error::LookupError,
    model::{Location, now_millis},
};

/// Durable table of previously searched locations, keyed by zip code.
///
/// All mutations run against a single sqlite database, so concurrent saves
/// for the same zip serialize at the engine; `save_or_update` additionally
/// re-reads the favorite flag inside the transaction that performs the
/// write, so a racing `set_favorite` is never lost to a stale read.
///
/// Cloning is cheap; clones share the pool and the change feed.
#[derive(Debug, Clone)]
pub struct LocationStore {
    pool: SqlitePool,
    changed: watch::Sender<u64>,
}

impl LocationStore {
    /// Open the database at `url`, creating the file and schema as needed.
    pub async fn open(url: &str) -> Result<Self, LookupError> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            info!("creating saved-locations database");
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        Self::with_pool(pool).await
    }

    /// In-memory store for tests. A single connection keeps every query on
    /// the same transient database.
    pub async fn open_in_memory() -> Result<Self, LookupError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, LookupError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| LookupError::Store(sqlx::Error::Migrate(Box::new(e))))?;

        let (changed, _) = watch::channel(0);
        Ok(Self { pool, changed })
    }

    /// Subscribe to table changes. The receiver holds a version counter
    /// that is bumped after every committed mutation; callers re-query on
    /// change rather than polling.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    fn bump(&self) {
        self.changed.send_modify(|v| *v += 1);
    }

    /// All saved locations, most recently searched first.
    pub async fn get_all(&self) -> Result<Vec<Location>, LookupError> {
        let rows = sqlx::query_as::<_, Location>(
            "SELECT * FROM saved_locations ORDER BY searchedAt DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Favorite locations, ordered by name.
    pub async fn get_favorites(&self) -> Result<Vec<Location>, LookupError> {
        let rows = sqlx::query_as::<_, Location>(
            "SELECT * FROM saved_locations WHERE isFavorite = 1 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The `limit` most recently searched locations.
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<Location>, LookupError> {
        let rows = sqlx::query_as::<_, Location>(
            "SELECT * FROM saved_locations ORDER BY searchedAt DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Saved locations whose name contains `fragment`, ordered by name.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<Location>, LookupError> {
        let rows = sqlx::query_as::<_, Location>(
            "SELECT * FROM saved_locations WHERE name LIKE '%' || ? || '%' ORDER BY name ASC",
        )
        .bind(fragment)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_by_zip(&self, zip: &str) -> Result<Option<Location>, LookupError> {
        let row = sqlx::query_as::<_, Location>(
            "SELECT * FROM saved_locations WHERE zip = ? LIMIT 1",
        )
        .bind(zip)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn location_exists(&self, zip: &str) -> Result<bool, LookupError> {
        Ok(self.get_by_zip(zip).await?.is_some())
    }

    /// Insert or replace the row for `location.zip`. Replace semantics:
    /// every field is overwritten, including the favorite flag. Callers
    /// that want to preserve it use [`LocationStore::save_or_update`].
    pub async fn upsert(&self, location: &Location) -> Result<(), LookupError> {
        sqlx::query(
            "INSERT OR REPLACE INTO saved_locations \
             (zip, name, lat, lon, country, searchedAt, isFavorite) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&location.zip)
        .bind(&location.name)
        .bind(location.lat)
        .bind(location.lon)
        .bind(&location.country)
        .bind(location.searched_at)
        .bind(location.favorite)
        .execute(&self.pool)
        .await?;

        self.bump();
        Ok(())
    }

    /// Record a search result. An existing row keeps its favorite flag and
    /// gets a fresh `searchedAt`; coordinates, name and country are taken
    /// from the argument. A new zip is inserted as given.
    ///
    /// The favorite re-read and the write share one transaction, so a
    /// dropped future rolls back and never leaves a partial row.
    ///
    /// Returns the row as written.
    pub async fn save_or_update(&self, location: &Location) -> Result<Location, LookupError> {
        let mut tx = self.pool.begin().await?;

        let existing_favorite: Option<bool> =
            sqlx::query_scalar("SELECT isFavorite FROM saved_locations WHERE zip = ?")
                .bind(&location.zip)
                .fetch_optional(&mut *tx)
                .await?;

        let mut row = location.clone();
        if let Some(favorite) = existing_favorite {
            row.favorite = favorite;
            row.searched_at = now_millis();
        }

        sqlx::query(
            "INSERT OR REPLACE INTO saved_locations \
             (zip, name, lat, lon, country, searchedAt, isFavorite) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.zip)
        .bind(&row.name)
        .bind(row.lat)
        .bind(row.lon)
        .bind(&row.country)
        .bind(row.searched_at)
        .bind(row.favorite)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.bump();
        Ok(row)
    }

    /// Update only the favorite flag. An absent zip is a no-op, not an error.
    pub async fn set_favorite(&self, zip: &str, favorite: bool) -> Result<(), LookupError> {
        let result = sqlx::query("UPDATE saved_locations SET isFavorite = ? WHERE zip = ?")
            .bind(favorite)
            .bind(zip)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.bump();
        }
        Ok(())
    }

    /// Stamp the row's `searchedAt` with the current time.
    pub async fn update_search_time(&self, zip: &str) -> Result<(), LookupError> {
        let result = sqlx::query("UPDATE saved_locations SET searchedAt = ? WHERE zip = ?")
            .bind(now_millis())
            .bind(zip)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.bump();
        }
        Ok(())
    }

    pub async fn delete(&self, location: &Location) -> Result<(), LookupError> {
        self.delete_by_zip(&location.zip).await
    }

    /// Remove the row if present. An absent zip is a no-op, not an error.
    pub async fn delete_by_zip(&self, zip: &str) -> Result<(), LookupError> {
        let result = sqlx::query("DELETE FROM saved_locations WHERE zip = ?")
            .bind(zip)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.bump();
        }
        Ok(())
    }

    /// Remove every row that is not marked favorite.
    pub async fn delete_non_favorites(&self) -> Result<(), LookupError> {
        sqlx::query("DELETE FROM saved_locations WHERE isFavorite = 0")
            .execute(&self.pool)
            .await?;

        self.bump();
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<(), LookupError> {
        sqlx::query("DELETE FROM saved_locations")
            .execute(&self.pool)
            .await?;

        self.bump();
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, LookupError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM saved_locations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn favorite_count(&self) -> Result<i64, LookupError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM saved_locations WHERE isFavorite = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;

    fn beverly_hills() -> Location {
        Location::new(
            "90210".into(),
            "Beverly Hills".into(),
            34.09,
            -118.41,
            "US".into(),
        )
    }

    fn seattle() -> Location {
        Location::new("98101".into(), "Seattle".into(), 47.61, -122.33, "US".into())
    }

    async fn store() -> LocationStore {
        LocationStore::open_in_memory()
            .await
            .expect("in-memory store should open")
    }

    #[tokio::test]
    async fn save_then_get_by_zip_round_trips() {
        let store = store().await;
        let loc = beverly_hills();

        let written = store.save_or_update(&loc).await.expect("save");
        let read = store
            .get_by_zip("90210")
            .await
            .expect("query")
            .expect("row must exist");

        assert_eq!(read, written);
        assert_eq!(read.name, "Beverly Hills");
        assert!(!read.favorite);
    }

    #[tokio::test]
    async fn get_by_zip_absent_returns_none() {
        let store = store().await;
        assert!(store.get_by_zip("00000").await.expect("query").is_none());
        assert!(!store.location_exists("00000").await.expect("query"));
    }

    #[tokio::test]
    async fn save_or_update_preserves_favorite_and_refreshes_timestamp() {
        let store = store().await;

        let first = store.save_or_update(&beverly_hills()).await.expect("save");
        store.set_favorite("90210", true).await.expect("favorite");

        // Let the millisecond clock tick so the refresh is observable.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // Re-search with new coordinates and favorite=false on the argument.
        let mut research = beverly_hills();
        research.lat = 34.10;
        research.searched_at = first.searched_at;
        let merged = store.save_or_update(&research).await.expect("update");

        assert!(merged.favorite, "favorite flag must survive re-search");
        assert!(
            merged.searched_at > first.searched_at,
            "searchedAt must strictly increase on re-search"
        );
        assert_eq!(merged.lat, 34.10);

        let read = store
            .get_by_zip("90210")
            .await
            .expect("query")
            .expect("row");
        assert!(read.favorite);
        assert_eq!(read.lat, 34.10);
    }

    #[tokio::test]
    async fn upsert_replaces_every_field() {
        let store = store().await;
        store.save_or_update(&beverly_hills()).await.expect("save");
        store.set_favorite("90210", true).await.expect("favorite");

        // Plain upsert is replace semantics: the favorite flag is clobbered.
        store.upsert(&beverly_hills()).await.expect("upsert");

        let read = store
            .get_by_zip("90210")
            .await
            .expect("query")
            .expect("row");
        assert!(!read.favorite);
    }

    #[tokio::test]
    async fn set_favorite_on_absent_zip_is_a_noop() {
        let store = store().await;
        store.set_favorite("00000", true).await.expect("no error");
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn delete_by_zip_absent_is_a_noop() {
        let store = store().await;
        store.delete_by_zip("00000").await.expect("no error");
    }

    #[tokio::test]
    async fn delete_non_favorites_leaves_exactly_the_favorites() {
        let store = store().await;
        store.save_or_update(&beverly_hills()).await.expect("save");
        store.save_or_update(&seattle()).await.expect("save");
        store.set_favorite("98101", true).await.expect("favorite");

        let favorites_before = store.favorite_count().await.expect("count");
        store.delete_non_favorites().await.expect("delete");

        assert_eq!(store.count().await.expect("count"), favorites_before);
        let remaining = store.get_all().await.expect("query");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].zip, "98101");
        assert!(remaining[0].favorite);
    }

    #[tokio::test]
    async fn delete_all_empties_the_table() {
        let store = store().await;
        store.save_or_update(&beverly_hills()).await.expect("save");
        store.save_or_update(&seattle()).await.expect("save");

        store.delete_all().await.expect("delete");
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn get_all_orders_by_recency() {
        let store = store().await;

        let mut older = beverly_hills();
        older.searched_at = 1_000;
        store.upsert(&older).await.expect("insert");

        let mut newer = seattle();
        newer.searched_at = 2_000;
        store.upsert(&newer).await.expect("insert");

        let all = store.get_all().await.expect("query");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].zip, "98101");
        assert_eq!(all[1].zip, "90210");
    }

    #[tokio::test]
    async fn get_favorites_orders_by_name() {
        let store = store().await;
        store.save_or_update(&seattle()).await.expect("save");
        store.save_or_update(&beverly_hills()).await.expect("save");
        store.set_favorite("90210", true).await.expect("favorite");
        store.set_favorite("98101", true).await.expect("favorite");

        let favorites = store.get_favorites().await.expect("query");
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].name, "Beverly Hills");
        assert_eq!(favorites[1].name, "Seattle");
    }

    #[tokio::test]
    async fn get_recent_respects_the_limit() {
        let store = store().await;

        for (i, zip) in ["10001", "10002", "10003"].iter().enumerate() {
            let mut loc = Location::new(
                (*zip).into(),
                format!("Place {i}"),
                40.7,
                -74.0,
                "US".into(),
            );
            loc.searched_at = i as i64;
            store.upsert(&loc).await.expect("insert");
        }

        let recent = store.get_recent(2).await.expect("query");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].zip, "10003");
        assert_eq!(recent[1].zip, "10002");
    }

    #[tokio::test]
    async fn search_by_name_matches_fragments() {
        let store = store().await;
        store.save_or_update(&beverly_hills()).await.expect("save");
        store.save_or_update(&seattle()).await.expect("save");

        let hits = store.search_by_name("att").await.expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].zip, "98101");

        let misses = store.search_by_name("nowhere").await.expect("query");
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn update_search_time_moves_the_row_forward() {
        let store = store().await;

        let mut loc = beverly_hills();
        loc.searched_at = 1_000;
        store.upsert(&loc).await.expect("insert");

        store.update_search_time("90210").await.expect("update");
        let read = store
            .get_by_zip("90210")
            .await
            .expect("query")
            .expect("row");
        assert!(read.searched_at > 1_000);
    }

    #[tokio::test]
    async fn mutations_notify_subscribers() {
        let store = store().await;
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.save_or_update(&beverly_hills()).await.expect("save");
        assert!(*rx.borrow() > before, "save must bump the change feed");

        let at_save = *rx.borrow();
        store.set_favorite("90210", true).await.expect("favorite");
        assert!(*rx.borrow() > at_save, "favorite toggle must notify");
    }

    #[tokio::test]
    async fn noop_mutations_do_not_notify() {
        let store = store().await;
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.set_favorite("00000", true).await.expect("no error");
        store.delete_by_zip("00000").await.expect("no error");

        assert_eq!(*rx.borrow(), before);
    }
}
