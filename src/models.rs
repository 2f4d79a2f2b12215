use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Drink
///
/// A row of the `drinks` table. The recipe is kept exactly as stored: a JSON text
/// blob holding the ingredient list. Use `short()` / `long()` to produce the two
/// public projections; both decode the blob and fail loudly if it is malformed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Drink {
    // Assigned by the store on insert, never reused.
    pub id: i32,
    pub title: String,
    pub recipe: String,
}

/// Ingredient
///
/// One entry of a drink's recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Ingredient {
    pub color: String,
    pub name: String,
    pub parts: i32,
}

/// Ingredient as shown to anonymous consumers: no name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IngredientShort {
    pub color: String,
    pub parts: i32,
}

/// DrinkShort
///
/// Public projection served by `GET /drinks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkShort {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<IngredientShort>,
}

/// DrinkLong
///
/// Full projection served to callers holding the detail/write permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkLong {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

/// Serializes an ingredient list into the stored text form.
pub fn encode_recipe(recipe: &[Ingredient]) -> Result<String, serde_json::Error> {
    serde_json::to_string(recipe)
}

impl Drink {
    /// Decodes the stored recipe blob.
    pub fn ingredients(&self) -> Result<Vec<Ingredient>, serde_json::Error> {
        serde_json::from_str(&self.recipe)
    }

    /// Replaces the stored recipe blob with the serialized form of `recipe`.
    pub fn set_recipe(&mut self, recipe: &[Ingredient]) -> Result<(), serde_json::Error> {
        self.recipe = encode_recipe(recipe)?;
        Ok(())
    }

    pub fn short(&self) -> Result<DrinkShort, serde_json::Error> {
        let recipe = self
            .ingredients()?
            .into_iter()
            .map(|i| IngredientShort {
                color: i.color,
                parts: i.parts,
            })
            .collect();
        Ok(DrinkShort {
            id: self.id,
            title: self.title.clone(),
            recipe,
        })
    }

    pub fn long(&self) -> Result<DrinkLong, serde_json::Error> {
        Ok(DrinkLong {
            id: self.id,
            title: self.title.clone(),
            recipe: self.ingredients()?,
        })
    }
}

// --- Request Payloads (Input Schemas) ---

/// RecipeInput
///
/// Clients may send either the full ingredient list or a single ingredient object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl RecipeInput {
    pub fn into_ingredients(self) -> Vec<Ingredient> {
        match self {
            RecipeInput::Many(list) => list,
            RecipeInput::One(single) => vec![single],
        }
    }
}

/// CreateDrinkRequest
///
/// Input payload for `POST /drinks`. Both fields are required; they are modelled as
/// options so a missing field is reported as 422 in the uniform error shape rather
/// than by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateDrinkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<RecipeInput>,
}

/// UpdateDrinkRequest
///
/// Partial update payload for `PATCH /drinks/{id}`. Absent, empty title or empty
/// recipe leave the stored value untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateDrinkRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeInput>,
}

impl UpdateDrinkRequest {
    /// Applies the supplied, non-empty fields to `drink`. Returns whether anything changed.
    pub fn apply_to(self, drink: &mut Drink) -> Result<bool, serde_json::Error> {
        let mut changed = false;
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            drink.title = title;
            changed = true;
        }
        if let Some(recipe) = self.recipe {
            let ingredients = recipe.into_ingredients();
            if !ingredients.is_empty() {
                drink.set_recipe(&ingredients)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

// --- Response Payloads (Output Schemas) ---

/// Body of `GET /drinks`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkSummaryList {
    pub success: bool,
    pub drinks: Vec<DrinkShort>,
}

/// Body of `GET /drinks-detail`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkDetailList {
    pub success: bool,
    pub drinks: Vec<DrinkLong>,
}

/// Body of `POST /drinks` and `PATCH /drinks/{id}`. The single drink is still keyed
/// `drinks` for client compatibility.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkDetail {
    pub success: bool,
    pub drinks: DrinkLong,
}

/// Body of `DELETE /drinks/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DrinkDeleted {
    pub success: bool,
    pub delete: i32,
}
