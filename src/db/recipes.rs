use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::indexer::recipe::RawRecipe;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::Sqlite;
use tracing::{debug, info};

/// SHA-256 over the title and the raw ingredient list, hex encoded. Two
/// scrapes of the same recipe hash alike even when other fields differ.
pub fn content_hash(title: Option<&str>, ingredients: Option<&Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.unwrap_or("").trim().as_bytes());
    hasher.update(b"\n");
    if let Some(ingredients) = ingredients {
        hasher.update(ingredients.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

async fn insert_with<'e, E>(executor: E, recipe: &RawRecipe) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let hash = content_hash(recipe.title.as_deref(), recipe.ingredients.as_ref());

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO recipes (
            id, title, url, ingredients, instructions, prep_time,
            cook_time, servings, tags, image_url, content_hash, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(recipe.id)
    .bind(&recipe.title)
    .bind(&recipe.url)
    .bind(recipe.ingredients.as_ref().map(Value::to_string))
    .bind(recipe.instructions.as_ref().map(Value::to_string))
    .bind(&recipe.prep_time)
    .bind(&recipe.cook_time)
    .bind(&recipe.servings)
    .bind(recipe.tags.as_ref().map(Value::to_string))
    .bind(&recipe.image_url)
    .bind(&hash)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Store a raw recipe. Returns `false` when a recipe with the same content
/// hash (or the same explicit id) already exists.
pub async fn insert_recipe(pool: &DbPool, recipe: &RawRecipe) -> Result<bool> {
    let inserted = insert_with(pool, recipe).await?;
    if !inserted {
        debug!(
            "Skipping duplicate recipe {:?}",
            recipe.title.as_deref().unwrap_or("<untitled>")
        );
    }
    Ok(inserted)
}

/// Store many raw recipes in one transaction.
pub async fn insert_many(pool: &DbPool, recipes: &[RawRecipe]) -> Result<ImportReport> {
    let mut tx = pool.begin().await?;
    let mut report = ImportReport::default();

    for recipe in recipes {
        if insert_with(&mut *tx, recipe).await? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
    }

    tx.commit().await?;
    info!(
        "Imported {} recipes ({} duplicates skipped)",
        report.inserted, report.duplicates
    );
    Ok(report)
}

/// Every stored recipe in insertion order, ready for ingestion.
pub async fn load_snapshot(pool: &DbPool) -> Result<Vec<RawRecipe>> {
    let rows = sqlx::query_as::<_, RecipeRow>("SELECT * FROM recipes ORDER BY id")
        .fetch_all(pool)
        .await?;

    debug!("Loaded {} recipe rows", rows.len());
    Ok(rows.into_iter().map(RecipeRow::into_raw).collect())
}

/// Get recipe by ID
pub async fn get_recipe(pool: &DbPool, recipe_id: i64) -> Result<RecipeRow> {
    let recipe = sqlx::query_as::<_, RecipeRow>("SELECT * FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Recipe {recipe_id} not found")))?;

    Ok(recipe)
}

/// Count all recipes
pub async fn count_recipes(pool: &DbPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
