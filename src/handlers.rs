use crate::{
    auth::VerifiedToken,
    error::{ApiError, ErrorBody},
    models::{
        CreateDrinkRequest, Drink, DrinkDeleted, DrinkDetail, DrinkDetailList, DrinkSummaryList,
        UpdateDrinkRequest,
    },
    repository::{PersistenceError, RepositoryState},
};
use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};

// --- Failure Classification ---

// Reads surface every store failure as 404; writes surface them as 422.
fn read_failure(e: PersistenceError) -> ApiError {
    tracing::error!("drink read failed: {}", e);
    ApiError::NotFound
}

fn write_failure(e: PersistenceError) -> ApiError {
    tracing::warn!("drink write failed: {}", e);
    ApiError::Unprocessable
}

// A stored recipe that does not decode is a defect, not a client error.
fn corrupt_recipe(drink: &Drink, e: serde_json::Error) -> ApiError {
    tracing::error!(drink_id = drink.id, "stored recipe does not decode: {}", e);
    ApiError::Internal
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

async fn load_drink(repo: &RepositoryState, raw_id: &str) -> Result<Drink, ApiError> {
    let id = parse_id(raw_id)?;
    repo.get_by_id(id)
        .await
        .map_err(read_failure)?
        .ok_or(ApiError::NotFound)
}

// --- Handlers ---

/// list_drinks
///
/// [Public Route] Lists every drink in the short projection (ingredient names omitted).
#[utoipa::path(
    get,
    path = "/drinks",
    responses(
        (status = 200, description = "All drinks, short view", body = DrinkSummaryList),
        (status = 404, description = "Store unavailable", body = ErrorBody)
    )
)]
pub async fn list_drinks(State(repo): State<RepositoryState>) -> Result<Json<DrinkSummaryList>, ApiError> {
    let drinks = repo.list_all().await.map_err(read_failure)?;
    let drinks = drinks
        .iter()
        .map(|d| d.short().map_err(|e| corrupt_recipe(d, e)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(DrinkSummaryList {
        success: true,
        drinks,
    }))
}

/// list_drink_details
///
/// [Requires `get:drinks-detail`] Lists every drink in the long projection.
#[utoipa::path(
    get,
    path = "/drinks-detail",
    responses(
        (status = 200, description = "All drinks, long view", body = DrinkDetailList),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Permission missing", body = ErrorBody),
        (status = 404, description = "Store unavailable", body = ErrorBody)
    )
)]
pub async fn list_drink_details(
    Extension(_token): Extension<VerifiedToken>,
    State(repo): State<RepositoryState>,
) -> Result<Json<DrinkDetailList>, ApiError> {
    let drinks = repo.list_all().await.map_err(read_failure)?;
    let drinks = drinks
        .iter()
        .map(|d| d.long().map_err(|e| corrupt_recipe(d, e)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(DrinkDetailList {
        success: true,
        drinks,
    }))
}

/// create_drink
///
/// [Requires `post:drinks`] Inserts a new drink. Title and recipe are both required;
/// a duplicate title is rejected by the store.
#[utoipa::path(
    post,
    path = "/drinks",
    request_body = CreateDrinkRequest,
    responses(
        (status = 200, description = "Created", body = DrinkDetail),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Permission missing", body = ErrorBody),
        (status = 422, description = "Missing fields or insert failed", body = ErrorBody)
    )
)]
pub async fn create_drink(
    Extension(_token): Extension<VerifiedToken>,
    State(repo): State<RepositoryState>,
    payload: Result<Json<CreateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinkDetail>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::debug!("rejected create body: {}", e);
        ApiError::Unprocessable
    })?;
    let (Some(title), Some(recipe)) = (payload.title, payload.recipe) else {
        return Err(ApiError::Unprocessable);
    };

    let drink = repo
        .insert(&title, &recipe.into_ingredients())
        .await
        .map_err(write_failure)?;
    tracing::info!(drink_id = drink.id, title = %drink.title, "drink created");

    Ok(Json(DrinkDetail {
        success: true,
        drinks: drink.long().map_err(|e| corrupt_recipe(&drink, e))?,
    }))
}

/// update_drink
///
/// [Requires `patch:drinks`] Partial update: only a non-empty `title` and/or `recipe`
/// are applied. An empty body object changes nothing and still succeeds.
#[utoipa::path(
    patch,
    path = "/drinks/{id}",
    params(("id" = i32, Path, description = "Drink ID")),
    request_body = UpdateDrinkRequest,
    responses(
        (status = 200, description = "Updated", body = DrinkDetail),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Permission missing", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 422, description = "Update failed", body = ErrorBody)
    )
)]
pub async fn update_drink(
    Extension(_token): Extension<VerifiedToken>,
    State(repo): State<RepositoryState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinkDetail>, ApiError> {
    let mut drink = load_drink(&repo, &id).await?;

    let Json(payload) = payload.map_err(|e| {
        tracing::debug!("rejected update body: {}", e);
        ApiError::Unprocessable
    })?;
    let changed = payload.apply_to(&mut drink).map_err(|e| write_failure(e.into()))?;

    if changed {
        drink = repo.update(&drink).await.map_err(write_failure)?;
        tracing::info!(drink_id = drink.id, "drink updated");
    }

    Ok(Json(DrinkDetail {
        success: true,
        drinks: drink.long().map_err(|e| corrupt_recipe(&drink, e))?,
    }))
}

/// delete_drink
///
/// [Requires `delete:drinks`] Hard-deletes a drink.
#[utoipa::path(
    delete,
    path = "/drinks/{id}",
    params(("id" = i32, Path, description = "Drink ID")),
    responses(
        (status = 200, description = "Deleted", body = DrinkDeleted),
        (status = 401, description = "Token rejected", body = ErrorBody),
        (status = 403, description = "Permission missing", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 422, description = "Delete failed", body = ErrorBody)
    )
)]
pub async fn delete_drink(
    Extension(_token): Extension<VerifiedToken>,
    State(repo): State<RepositoryState>,
    Path(id): Path<String>,
) -> Result<Json<DrinkDeleted>, ApiError> {
    let drink = load_drink(&repo, &id).await?;

    repo.delete(drink.id).await.map_err(write_failure)?;
    tracing::info!(drink_id = drink.id, "drink deleted");

    Ok(Json(DrinkDeleted {
        success: true,
        delete: drink.id,
    }))
}

/// Uniform 404 for any path outside the route table.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Uniform 405 for a known path requested with a method it does not serve.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
