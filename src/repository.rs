use crate::models::{Drink, Ingredient, encode_recipe};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// PersistenceError
///
/// Typed failures of the persistence layer. Handlers translate these into the
/// 404/422 responses; they are never shown to clients verbatim.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("a drink with this title already exists")]
    DuplicateTitle,
    #[error("drink {0} does not exist")]
    NotFound(i32),
    #[error("recipe serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Repository Trait
///
/// Abstract contract for every persistence operation on drinks, so handlers never
/// know whether they talk to Postgres or the in-memory store. Every mutating call
/// commits immediately.
#[async_trait]
pub trait Repository: Send + Sync {
    // Every row, in store-native order.
    async fn list_all(&self) -> Result<Vec<Drink>, PersistenceError>;
    async fn get_by_id(&self, id: i32) -> Result<Option<Drink>, PersistenceError>;
    // Fails with `DuplicateTitle` when the title is taken.
    async fn insert(&self, title: &str, recipe: &[Ingredient]) -> Result<Drink, PersistenceError>;
    // Writes back title and recipe of an already-loaded drink.
    async fn update(&self, drink: &Drink) -> Result<Drink, PersistenceError>;
    // Fails with `NotFound` if the row vanished since it was loaded.
    async fn delete(&self, id: i32) -> Result<(), PersistenceError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// The drink inserted by `reset_and_seed`.
pub fn seed_drink() -> (String, Vec<Ingredient>) {
    (
        "water".to_string(),
        vec![Ingredient {
            name: "water".to_string(),
            color: "blue".to_string(),
            parts: 1,
        }],
    )
}

fn classify(e: sqlx::Error) -> PersistenceError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => PersistenceError::DuplicateTitle,
        _ => PersistenceError::Database(e),
    }
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations. Safe to call on every startup.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// reset_and_seed
    ///
    /// Drops every drink, restarts the id sequence and inserts the seed drink.
    /// Destructive; only run when `RESET_DB_ON_START` is set.
    pub async fn reset_and_seed(&self) -> Result<Drink, PersistenceError> {
        sqlx::query("TRUNCATE TABLE drinks RESTART IDENTITY")
            .execute(&self.pool)
            .await?;
        let (title, recipe) = seed_drink();
        self.insert(&title, &recipe).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_all(&self) -> Result<Vec<Drink>, PersistenceError> {
        let drinks = sqlx::query_as::<_, Drink>("SELECT id, title, recipe FROM drinks")
            .fetch_all(&self.pool)
            .await?;
        Ok(drinks)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<Drink>, PersistenceError> {
        let drink = sqlx::query_as::<_, Drink>("SELECT id, title, recipe FROM drinks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(drink)
    }

    async fn insert(&self, title: &str, recipe: &[Ingredient]) -> Result<Drink, PersistenceError> {
        let recipe = encode_recipe(recipe)?;
        sqlx::query_as::<_, Drink>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(title)
        .bind(recipe)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn update(&self, drink: &Drink) -> Result<Drink, PersistenceError> {
        sqlx::query_as::<_, Drink>(
            r#"UPDATE drinks SET title = $2, recipe = $3
               WHERE id = $1
               RETURNING id, title, recipe"#,
        )
        .bind(drink.id)
        .bind(&drink.title)
        .bind(&drink.recipe)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(PersistenceError::NotFound(drink.id))
    }

    async fn delete(&self, id: i32) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM drinks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(id));
        }
        Ok(())
    }
}

// --- In-Memory Implementation (For Tests and Local Demos) ---

#[derive(Default)]
struct Table {
    last_id: i32,
    rows: BTreeMap<i32, Drink>,
}

impl Table {
    fn title_taken(&self, title: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|d| d.title == title && Some(d.id) != except)
    }
}

/// InMemoryRepository
///
/// A `Repository` over a mutex-guarded map. Enforces the same title uniqueness and
/// never reuses ids, so handler behaviour can be tested without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    table: Mutex<Table>,
    /// When true, every operation returns a simulated store failure.
    pub should_fail: bool,
    /// When true, only `delete` fails; reads and other writes succeed.
    pub fail_deletes: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn new_failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    /// Places a row verbatim, bypassing recipe serialization. Lets tests plant
    /// rows whose stored recipe is corrupt.
    pub fn put_raw(&self, drink: Drink) {
        let mut table = self.lock();
        table.last_id = table.last_id.max(drink.id);
        table.rows.insert(drink.id, drink);
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.should_fail {
            return Err(PersistenceError::Unavailable(
                "simulated store failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_all(&self) -> Result<Vec<Drink>, PersistenceError> {
        self.check()?;
        Ok(self.lock().rows.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<Drink>, PersistenceError> {
        self.check()?;
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn insert(&self, title: &str, recipe: &[Ingredient]) -> Result<Drink, PersistenceError> {
        self.check()?;
        let recipe = encode_recipe(recipe)?;
        let mut table = self.lock();
        if table.title_taken(title, None) {
            return Err(PersistenceError::DuplicateTitle);
        }
        table.last_id += 1;
        let drink = Drink {
            id: table.last_id,
            title: title.to_string(),
            recipe,
        };
        table.rows.insert(drink.id, drink.clone());
        Ok(drink)
    }

    async fn update(&self, drink: &Drink) -> Result<Drink, PersistenceError> {
        self.check()?;
        let mut table = self.lock();
        if !table.rows.contains_key(&drink.id) {
            return Err(PersistenceError::NotFound(drink.id));
        }
        if table.title_taken(&drink.title, Some(drink.id)) {
            return Err(PersistenceError::DuplicateTitle);
        }
        table.rows.insert(drink.id, drink.clone());
        Ok(drink.clone())
    }

    async fn delete(&self, id: i32) -> Result<(), PersistenceError> {
        self.check()?;
        if self.fail_deletes {
            return Err(PersistenceError::Unavailable(
                "simulated delete failure".to_string(),
            ));
        }
        self.lock()
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(PersistenceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemon() -> Vec<Ingredient> {
        vec![Ingredient {
            color: "yellow".to_string(),
            name: "lemon".to_string(),
            parts: 2,
        }]
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let repo = InMemoryRepository::new();
        let first = repo.insert("a", &lemon()).await.unwrap();
        repo.delete(first.id).await.unwrap();
        let second = repo.insert("b", &lemon()).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn update_rejects_title_of_another_row() {
        let repo = InMemoryRepository::new();
        repo.insert("a", &lemon()).await.unwrap();
        let mut b = repo.insert("b", &lemon()).await.unwrap();
        b.title = "a".to_string();
        assert!(matches!(
            repo.update(&b).await,
            Err(PersistenceError::DuplicateTitle)
        ));
    }

    #[test]
    fn seed_is_a_single_blue_water() {
        let (title, recipe) = seed_drink();
        assert_eq!(title, "water");
        assert_eq!(encode_recipe(&recipe).unwrap(), r#"[{"color":"blue","name":"water","parts":1}]"#);
    }

    #[tokio::test]
    async fn update_may_keep_its_own_title() {
        let repo = InMemoryRepository::new();
        let mut a = repo.insert("a", &lemon()).await.unwrap();
        a.set_recipe(&[]).unwrap();
        assert_eq!(repo.update(&a).await.unwrap().recipe, "[]");
    }
}
