use crate::indexer::recipe::RawRecipe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Row of the `recipes` table. List fields are stored as JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<String>,
    pub tags: Option<String>,
    pub image_url: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RecipeRow {
    /// Hand the row to ingestion unchanged. Text that is not valid JSON is
    /// passed on as a plain string so validation can reject it.
    pub fn into_raw(self) -> RawRecipe {
        RawRecipe {
            id: Some(self.id),
            title: self.title,
            url: self.url,
            ingredients: self.ingredients.map(json_or_string),
            instructions: self.instructions.map(json_or_string),
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            tags: self.tags.map(json_or_string),
            image_url: self.image_url,
        }
    }
}

fn json_or_string(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Row of the `processed_recipes` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcessedRow {
    pub recipe_id: i64,
    pub ingredients_simple: String,
    pub ingredients_text: String,
    pub cluster_kmeans: i64,
    pub cluster_hierarchical: i64,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedRow {
    pub fn ingredients(&self) -> Vec<String> {
        serde_json::from_str(&self.ingredients_simple).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
}
