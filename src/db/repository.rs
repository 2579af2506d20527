use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Any, AnyPool};

use crate::db::fixtures;
use crate::error::{AppError, AppResult};
use crate::models::{InventoryItem, Project, ProjectTemplate, Shift, Technician, User};

/// A record stored as one JSON document inside a named collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Human-readable kind used in not-found messages.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Records written the first time the collection is read.
    fn fixtures(now: DateTime<Utc>) -> Vec<Self>;
}

pub type ProjectRepository = Repository<Project>;
pub type ShiftRepository = Repository<Shift>;
pub type InventoryRepository = Repository<InventoryItem>;
pub type TemplateRepository = Repository<ProjectTemplate>;
pub type UserRepository = Repository<User>;
pub type TechnicianRepository = Repository<Technician>;

/// Collection-scoped access to the entity store.
///
/// Every write touches a single entity inside one transaction; there is no
/// coordination across entities, so concurrent writers to different records
/// never conflict and the last writer of the same record wins. The last
/// successful read is kept in memory and served when the store cannot be
/// reached.
pub struct Repository<T> {
    pool: AnyPool,
    seeded: Arc<AtomicBool>,
    snapshot: Arc<RwLock<Option<Vec<T>>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            seeded: Arc::clone(&self.seeded),
            snapshot: Arc::clone(&self.snapshot),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            seeded: Arc::new(AtomicBool::new(false)),
            snapshot: Arc::new(RwLock::new(None)),
            _entity: PhantomData,
        }
    }

    /// Writes the fixtures unless the collection was seeded before. A collection
    /// that was emptied later is left empty. Returns whether fixtures were written.
    pub async fn seed_if_empty(&self) -> AppResult<bool> {
        if self.seeded.load(Ordering::Acquire) {
            return Ok(false);
        }

        let now = Utc::now();
        let fixtures = T::fixtures(now);
        let timestamp = timestamp(now);

        // The collection row is the seeding claim; a concurrent seeder fails on its key.
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query("INSERT INTO collections (name, seeded_at) VALUES (?, ?)")
            .bind(T::COLLECTION)
            .bind(&timestamp)
            .execute(&mut *tx)
            .await;
        match claimed {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                tx.rollback().await?;
                self.seeded.store(true, Ordering::Release);
                return Ok(false);
            }
            Err(error) => return Err(error.into()),
        }

        for (position, entity) in fixtures.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entities (collection, id, position, body, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(T::COLLECTION)
            .bind(entity.id())
            .bind(position as i64)
            .bind(serde_json::to_string(entity)?)
            .bind(&timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.seeded.store(true, Ordering::Release);

        tracing::info!(
            collection = T::COLLECTION,
            count = fixtures.len(),
            "seeded collection from fixtures"
        );
        Ok(true)
    }

    pub async fn list(&self) -> AppResult<Vec<T>> {
        match self.load_all().await {
            Ok(entities) => {
                self.remember_all(entities.clone());
                Ok(entities)
            }
            Err(error @ AppError::Unavailable(_)) => {
                let fallback = self.snapshot_or_fixtures();
                tracing::warn!(
                    collection = T::COLLECTION,
                    error = %error,
                    "store unavailable, serving last known collection"
                );
                Ok(fallback)
            }
            Err(error) => Err(error),
        }
    }

    pub async fn get(&self, id: &str) -> AppResult<T> {
        match self.load_one(id).await {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => Err(AppError::not_found(T::KIND, id)),
            Err(error @ AppError::Unavailable(_)) => {
                tracing::warn!(
                    collection = T::COLLECTION,
                    id,
                    error = %error,
                    "store unavailable, looking up last known record"
                );
                self.remembered(id)
                    .ok_or_else(|| AppError::not_found(T::KIND, id))
            }
            Err(error) => Err(error),
        }
    }

    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> AppResult<Option<T>> {
        Ok(self.list().await?.into_iter().find(|entity| predicate(entity)))
    }

    pub async fn insert(&self, entity: T) -> AppResult<T> {
        self.seed_if_empty().await?;

        let mut tx = self.pool.begin().await?;
        let position = sqlx::query_scalar::<Any, i64>(
            "SELECT CAST(COALESCE(MAX(position), -1) AS BIGINT) FROM entities WHERE collection = ?",
        )
        .bind(T::COLLECTION)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO entities (collection, id, position, body, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(T::COLLECTION)
        .bind(entity.id())
        .bind(position + 1)
        .bind(serde_json::to_string(&entity)?)
        .bind(timestamp(Utc::now()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.remember(&entity);
        Ok(entity)
    }

    /// Replaces the stored record with `entity`, inserting it when it is new.
    pub async fn save(&self, entity: T) -> AppResult<T> {
        self.seed_if_empty().await?;

        let result = sqlx::query(
            "UPDATE entities SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(serde_json::to_string(&entity)?)
        .bind(timestamp(Utc::now()))
        .bind(T::COLLECTION)
        .bind(entity.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.insert(entity).await;
        }

        self.remember(&entity);
        Ok(entity)
    }

    /// Loads one record, applies `patch` and writes it back in the same
    /// transaction. An error from `patch` leaves the stored record unchanged.
    pub async fn update<F>(&self, id: &str, patch: F) -> AppResult<T>
    where
        F: FnOnce(&mut T) -> AppResult<()>,
    {
        self.seed_if_empty().await?;

        let mut tx = self.pool.begin().await?;
        let body = sqlx::query_scalar::<Any, String>(
            "SELECT body FROM entities WHERE collection = ? AND id = ?",
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(T::KIND, id))?;

        let mut entity: T = serde_json::from_str(&body)?;
        patch(&mut entity)?;

        sqlx::query(
            "UPDATE entities SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(serde_json::to_string(&entity)?)
        .bind(timestamp(Utc::now()))
        .bind(T::COLLECTION)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.remember(&entity);
        Ok(entity)
    }

    pub async fn delete(&self, id: &str) -> AppResult<T> {
        let existing = self.get(id).await?;

        let result = sqlx::query("DELETE FROM entities WHERE collection = ? AND id = ?")
            .bind(T::COLLECTION)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(T::KIND, id));
        }

        self.forget(id);
        Ok(existing)
    }

    async fn load_all(&self) -> AppResult<Vec<T>> {
        self.seed_if_empty().await?;

        let bodies = sqlx::query_scalar::<Any, String>(
            "SELECT body FROM entities WHERE collection = ? ORDER BY position ASC",
        )
        .bind(T::COLLECTION)
        .fetch_all(&self.pool)
        .await?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(AppError::from))
            .collect()
    }

    async fn load_one(&self, id: &str) -> AppResult<Option<T>> {
        self.seed_if_empty().await?;

        let body = sqlx::query_scalar::<Any, String>(
            "SELECT body FROM entities WHERE collection = ? AND id = ?",
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        body.map(|body| serde_json::from_str(&body).map_err(AppError::from))
            .transpose()
    }

    fn snapshot_or_fixtures(&self) -> Vec<T> {
        let snapshot = match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        snapshot.unwrap_or_else(|| T::fixtures(Utc::now()))
    }

    fn remembered(&self, id: &str) -> Option<T> {
        let guard = match self.snapshot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()?
            .iter()
            .find(|entity| entity.id() == id)
            .cloned()
    }

    fn remember_all(&self, entities: Vec<T>) {
        self.with_snapshot(|snapshot| *snapshot = Some(entities));
    }

    fn remember(&self, entity: &T) {
        self.with_snapshot(|snapshot| {
            let Some(entities) = snapshot.as_mut() else {
                return;
            };
            match entities.iter_mut().find(|existing| existing.id() == entity.id()) {
                Some(existing) => *existing = entity.clone(),
                None => entities.push(entity.clone()),
            }
        });
    }

    fn forget(&self, id: &str) {
        self.with_snapshot(|snapshot| {
            if let Some(entities) = snapshot.as_mut() {
                entities.retain(|entity| entity.id() != id);
            }
        });
    }

    fn with_snapshot(&self, apply: impl FnOnce(&mut Option<Vec<T>>)) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(now: DateTime<Utc>) -> Vec<Self> {
        fixtures::projects(now)
    }
}

impl Entity for Shift {
    const COLLECTION: &'static str = "shifts";
    const KIND: &'static str = "shift";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(now: DateTime<Utc>) -> Vec<Self> {
        fixtures::shifts(now)
    }
}

impl Entity for InventoryItem {
    const COLLECTION: &'static str = "inventory";
    const KIND: &'static str = "inventory item";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(_now: DateTime<Utc>) -> Vec<Self> {
        fixtures::inventory()
    }
}

impl Entity for ProjectTemplate {
    const COLLECTION: &'static str = "templates";
    const KIND: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(_now: DateTime<Utc>) -> Vec<Self> {
        fixtures::templates()
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(_now: DateTime<Utc>) -> Vec<Self> {
        fixtures::users()
    }
}

impl Entity for Technician {
    const COLLECTION: &'static str = "technicians";
    const KIND: &'static str = "technician";

    fn id(&self) -> &str {
        &self.id
    }

    fn fixtures(_now: DateTime<Utc>) -> Vec<Self> {
        fixtures::technicians()
    }
}

#[cfg(test)]
mod tests {
    use sqlx::AnyPool;
    use tempfile::tempdir;

    use crate::config::Config;
    use crate::db;
    use crate::db::repository::{
        InventoryRepository, ProjectRepository, Repository, TechnicianRepository,
    };
    use crate::error::AppError;
    use crate::models::{SubTaskStatus, Technician};

    async fn setup_db(db_name: &str) -> (tempfile::TempDir, AnyPool) {
        let temp_dir = tempdir().expect("tempdir should be created");
        let db_path = temp_dir.path().join(format!("{db_name}.db"));
        let config = Config {
            db_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            ..Config::default()
        };

        let pool = db::connect_and_migrate(&config)
            .await
            .expect("database should initialize");

        (temp_dir, pool)
    }

    #[tokio::test]
    async fn first_read_seeds_fixtures_once() {
        let (_temp_dir, pool) = setup_db("seed-once").await;
        let repository = InventoryRepository::new(pool.clone());

        let items = repository.list().await.expect("inventory should list");
        assert_eq!(items.len(), 8);

        let fresh = InventoryRepository::new(pool);
        assert!(!fresh.seed_if_empty().await.expect("seed check should succeed"));
        assert_eq!(fresh.list().await.expect("inventory should list").len(), 8);
    }

    #[tokio::test]
    async fn concurrent_first_seeds_write_fixtures_once() {
        let (_temp_dir, pool) = setup_db("seed-race").await;
        let first = InventoryRepository::new(pool.clone());
        let second = InventoryRepository::new(pool.clone());

        let (first_seeded, second_seeded) =
            tokio::join!(first.seed_if_empty(), second.seed_if_empty());
        let first_seeded = first_seeded.expect("first seed should succeed");
        let second_seeded = second_seeded.expect("second seed should succeed");
        assert!(first_seeded ^ second_seeded);

        let items = InventoryRepository::new(pool)
            .list()
            .await
            .expect("inventory should list");
        assert_eq!(items.len(), 8);
    }

    #[tokio::test]
    async fn emptied_collection_is_not_reseeded() {
        let (_temp_dir, pool) = setup_db("no-reseed").await;
        let repository = TechnicianRepository::new(pool.clone());

        for technician in repository.list().await.expect("technicians should list") {
            repository
                .delete(&technician.id)
                .await
                .expect("technician should delete");
        }

        let fresh = TechnicianRepository::new(pool);
        assert!(fresh.list().await.expect("technicians should list").is_empty());
    }

    #[tokio::test]
    async fn update_patches_a_single_record() {
        let (_temp_dir, pool) = setup_db("update-one").await;
        let repository = ProjectRepository::new(pool);

        let updated = repository
            .update("camaro-1969-davis", |project| {
                project.categories[0].sub_tasks[2].status = SubTaskStatus::InProgress;
                Ok(())
            })
            .await
            .expect("update should succeed");
        assert_eq!(
            updated.categories[0].sub_tasks[2].status,
            SubTaskStatus::InProgress
        );

        let reloaded = repository
            .get("camaro-1969-davis")
            .await
            .expect("project should load");
        assert_eq!(
            reloaded.categories[0].sub_tasks[2].status,
            SubTaskStatus::InProgress
        );
    }

    #[tokio::test]
    async fn failed_patch_leaves_record_untouched() {
        let (_temp_dir, pool) = setup_db("failed-patch").await;
        let repository = ProjectRepository::new(pool);

        let result = repository
            .update("mustang-1969-smith", |project| {
                project.customer_name = "Someone Else".to_string();
                Err(AppError::validation("rejected"))
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let reloaded = repository
            .get("mustang-1969-smith")
            .await
            .expect("project should load");
        assert_eq!(reloaded.customer_name, "John Smith");
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let (_temp_dir, pool) = setup_db("missing").await;
        let repository: Repository<Technician> = Repository::new(pool);

        let result = repository.get("tech-nobody").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = repository.update("tech-nobody", |_| Ok(())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn closed_store_serves_last_known_collection() {
        let (_temp_dir, pool) = setup_db("closed").await;
        let repository = TechnicianRepository::new(pool.clone());

        let before = repository.list().await.expect("technicians should list");
        pool.close().await;

        let after = repository
            .list()
            .await
            .expect("list should fall back to snapshot");
        assert_eq!(after.len(), before.len());

        let write = repository
            .insert(Technician {
                id: "tech-new".to_string(),
                name: "New".to_string(),
                user_id: "user-tech-new".to_string(),
                hourly_rate: None,
            })
            .await;
        assert!(matches!(write, Err(AppError::Unavailable(_))));
        assert_eq!(
            repository.list().await.expect("snapshot should remain").len(),
            before.len()
        );
    }

    #[tokio::test]
    async fn insert_appends_in_order_and_rejects_duplicates() {
        let (_temp_dir, pool) = setup_db("insert").await;
        let repository = TechnicianRepository::new(pool);
        let technician = Technician {
            id: "tech-sipho".to_string(),
            name: "Sipho".to_string(),
            user_id: "user-tech-sipho".to_string(),
            hourly_rate: Some(140.0),
        };

        repository
            .insert(technician.clone())
            .await
            .expect("insert should succeed");
        let listed = repository.list().await.expect("technicians should list");
        assert_eq!(listed.last().map(|t| t.id.as_str()), Some("tech-sipho"));

        let duplicate = repository.insert(technician).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }
}
