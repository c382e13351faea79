use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse};
use crate::ai::GuideService;
use crate::models::CityData;
use crate::{prompts, schema, Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GuideRequest<'a> {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GuideGenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuideGenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

/// Structured city-guide generation over Gemini.
pub struct GeminiGuideClient {
    http: GeminiHttpClient,
}

impl GeminiGuideClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, Duration::from_secs(120), reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }
}

super::impl_with_gemini_base_url!(GeminiGuideClient);

#[async_trait]
impl GuideService for GeminiGuideClient {
    async fn fetch_guide(&self, city: &str) -> Result<CityData> {
        let request = GuideRequest {
            contents: vec![Content::user_text(prompts::guide_prompt(city))],
            generation_config: GuideGenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema::city_data_schema(),
            },
        };

        tracing::debug!("Requesting city guide for '{}'", city.trim());
        let response: GenerateContentResponse = self.http.generate_content(&request).await?;

        let text = response.text().ok_or_else(|| {
            tracing::error!("Gemini guide response contained no text");
            Error::Request("No text in Gemini guide response".to_string())
        })?;

        let data = schema::parse_city_data(&text)?;
        tracing::info!(
            "Received guide for {} ({} attractions, {} nearby, {} hotels, {} restaurants, {} shopping)",
            data.city_name,
            data.attractions.len(),
            data.nearby.len(),
            data.hotels.len(),
            data.restaurants.len(),
            data.shopping.len()
        );
        Ok(data)
    }
}
