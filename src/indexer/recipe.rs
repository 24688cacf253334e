use crate::error::{Error, Result};
use crate::indexer::normalizer::normalize_value;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type RecipeId = i64;

/// A recipe record as the store hands it over. Every field is optional and
/// loosely typed; `Recipe::from_raw` decides whether the record is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecipe {
    #[serde(default, alias = "_id", deserialize_with = "lenient_id")]
    pub id: Option<RecipeId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Value>,
    #[serde(default)]
    pub instructions: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prep_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cook_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub servings: Option<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
}

/// A validated corpus recipe with its normalized ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub url: Option<String>,
    /// Ingredient lines as scraped.
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    /// One normalized name per raw line, empties dropped.
    pub ingredients_simple: Vec<String>,
    /// `ingredients_simple` joined by spaces; the vectorizer's document.
    pub ingredients_text: String,
}

impl Recipe {
    /// Validate and normalize a raw record. `index` is the record's position
    /// in the snapshot; it is used for error reporting and as the fallback id.
    pub fn from_raw(index: usize, raw: RawRecipe) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedRecord {
            index,
            reason: reason.to_string(),
        };

        let lines = match raw.ingredients {
            None | Some(Value::Null) => return Err(malformed("missing ingredients")),
            Some(Value::Array(lines)) => lines,
            Some(_) => return Err(malformed("ingredients is not a list")),
        };
        if lines.is_empty() {
            return Err(malformed("empty ingredient list"));
        }

        let ingredients_simple: Vec<String> = lines
            .iter()
            .map(normalize_value)
            .filter(|name| !name.is_empty())
            .collect();
        if ingredients_simple.is_empty() {
            return Err(malformed("no searchable ingredients"));
        }

        let ingredients = lines
            .into_iter()
            .filter_map(|line| match line {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect();

        let ingredients_text = ingredients_simple.join(" ");

        Ok(Self {
            id: raw.id.unwrap_or(index as RecipeId + 1),
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled recipe".to_string()),
            url: raw.url,
            ingredients,
            instructions: string_list(raw.instructions),
            prep_time: raw.prep_time,
            cook_time: raw.cook_time,
            servings: raw.servings,
            tags: string_list(raw.tags),
            image_url: raw.image_url,
            ingredients_simple,
            ingredients_text,
        })
    }

    /// Whether some ingredient of this recipe contains `needle`.
    pub fn has_ingredient(&self, needle: &str) -> bool {
        self.ingredients_simple
            .iter()
            .any(|ingredient| ingredient.contains(needle))
    }
}

/// A list field that may arrive as a list, a single string, or garbage.
fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<RecipeId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
