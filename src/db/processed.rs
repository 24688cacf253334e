use crate::db::DbPool;
#[cfg(test)]
use crate::db::models::ProcessedRow;
use crate::error::Result;
use crate::indexer::corpus::ProcessedRecipe;
use chrono::Utc;
use tracing::info;

/// Replace the stored rebuild output with `processed`. Readers see either the
/// previous rows or the new ones.
pub async fn replace_processed(pool: &DbPool, processed: &[ProcessedRecipe]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let cleared = sqlx::query("DELETE FROM processed_recipes")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for record in processed {
        sqlx::query(
            r#"
            INSERT INTO processed_recipes (
                recipe_id, ingredients_simple, ingredients_text,
                cluster_kmeans, cluster_hierarchical, processed_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.recipe_id)
        .bind(serde_json::to_string(&record.ingredients_simple)?)
        .bind(&record.ingredients_text)
        .bind(record.cluster_kmeans as i64)
        .bind(record.cluster_hierarchical as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(
        "Stored {} processed recipes (replaced {})",
        processed.len(),
        cleared
    );
    Ok(processed.len() as u64)
}

#[cfg(test)]
pub(crate) async fn list_processed(pool: &DbPool) -> Result<Vec<ProcessedRow>> {
    let rows = sqlx::query_as::<_, ProcessedRow>(
        "SELECT * FROM processed_recipes ORDER BY recipe_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_processed(pool: &DbPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_recipes")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
