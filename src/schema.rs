//! Structured-output contract for the city guide.
//!
//! The same definition is sent to the model as `responseSchema` and used to
//! validate what comes back, so the two cannot drift apart.

use crate::models::{Category, CityData, TravelItem};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::sync::OnceLock;

const CITY_FIELDS: [&str; 3] = ["cityName", "landingImagePrompt", "intro"];
const ITEM_FIELDS: [&str; 3] = ["name", "description", "imagePrompt"];

fn item_schema(detailed: bool) -> Value {
    let image_prompt = if detailed {
        json!({
            "type": "STRING",
            "description": "Prompt to generate a photorealistic image of this specific place (in English)."
        })
    } else {
        json!({ "type": "STRING" })
    };

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "description": { "type": "STRING" },
                "imagePrompt": image_prompt
            },
            "required": ITEM_FIELDS
        }
    })
}

fn build_schema() -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert("cityName".to_string(), json!({ "type": "STRING" }));
    properties.insert(
        "landingImagePrompt".to_string(),
        json!({
            "type": "STRING",
            "description": "A description for a high-quality, photorealistic travel photograph capturing the city's essence (in English)."
        }),
    );
    properties.insert(
        "intro".to_string(),
        json!({
            "type": "STRING",
            "description": "A 3-sentence summary of history and charm in Korean."
        }),
    );
    for category in Category::ALL {
        properties.insert(
            category.id().to_string(),
            item_schema(category == Category::Attractions),
        );
    }

    let required: Vec<&str> = CITY_FIELDS
        .iter()
        .copied()
        .chain(Category::ALL.iter().map(|c| c.id()))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required
    })
}

/// Gemini `responseSchema` for [`CityData`].
pub fn city_data_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(build_schema)
}

/// Decode and validate the model's JSON text.
pub fn parse_city_data(text: &str) -> Result<CityData> {
    let data: CityData = serde_json::from_str(text.trim()).map_err(|e| {
        tracing::error!("Guide response is not valid CityData JSON: {}", e);
        Error::Parse(format!("Guide response is not valid CityData JSON: {}", e))
    })?;
    validate(&data)?;
    Ok(data)
}

/// Check the fields the view depends on.
pub fn validate(data: &CityData) -> Result<()> {
    if data.city_name.trim().is_empty() {
        return Err(Error::Parse("cityName is empty".to_string()));
    }
    if data.landing_image_prompt.trim().is_empty() {
        return Err(Error::Parse("landingImagePrompt is empty".to_string()));
    }
    for category in Category::ALL {
        for (index, item) in data.items(category).iter().enumerate() {
            validate_item(item).map_err(|field| {
                Error::Parse(format!("{}[{}].{} is empty", category.id(), index, field))
            })?;
        }
    }
    Ok(())
}

fn validate_item(item: &TravelItem) -> std::result::Result<(), &'static str> {
    if item.name.trim().is_empty() {
        return Err("name");
    }
    if item.image_prompt.trim().is_empty() {
        return Err("imagePrompt");
    }
    Ok(())
}
