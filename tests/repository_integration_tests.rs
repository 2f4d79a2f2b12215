//! Runs against a real Postgres. Set `DATABASE_URL` and run with `--ignored`.

use coffee_shop_api::{
    models::Ingredient,
    repository::{PersistenceError, PostgresRepository, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let context = DbTestContext { pool };
        context
            .repository()
            .migrate()
            .await
            .expect("Failed to run database migrations.");
        context
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// Titles are unique across the table, so every test run needs fresh ones.
fn unique_title(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn recipe() -> Vec<Ingredient> {
    vec![Ingredient {
        color: "amber".to_string(),
        name: "tea".to_string(),
        parts: 2,
    }]
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn insert_then_read_back() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let title = unique_title("chai");

    let created = repo.insert(&title, &recipe()).await.unwrap();
    let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.long().unwrap().recipe, recipe());
    assert!(repo.list_all().await.unwrap().iter().any(|d| d.id == created.id));
}

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn duplicate_title_is_classified() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let title = unique_title("dup");

    repo.insert(&title, &recipe()).await.unwrap();
    let second = repo.insert(&title, &recipe()).await;
    assert!(matches!(second, Err(PersistenceError::DuplicateTitle)));
}

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn update_writes_back_changed_fields() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let mut drink = repo.insert(&unique_title("old"), &recipe()).await.unwrap();
    let new_title = unique_title("new");
    drink.title = new_title.clone();

    let updated = repo.update(&drink).await.unwrap();
    assert_eq!(updated.title, new_title);
    assert_eq!(updated.recipe, drink.recipe);
}

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn delete_of_vanished_row_is_not_found() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let drink = repo.insert(&unique_title("gone"), &recipe()).await.unwrap();
    repo.delete(drink.id).await.unwrap();

    assert!(repo.get_by_id(drink.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(drink.id).await,
        Err(PersistenceError::NotFound(id)) if id == drink.id
    ));
}
