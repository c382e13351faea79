//! AI service integration for guide and image generation
//!
//! Provides interfaces to Gemini's `generateContent` endpoint for producing
//! structured city guides and per-place photographs.

pub mod data_uri;
pub mod gemini;
pub mod mime;
pub mod mock;

pub use data_uri::ImageDataUri;
pub use gemini::{GeminiGuideClient, GeminiImageClient};
pub use mock::{MockGuideClient, MockGuideResponse, MockImageGenerationClient, MockImageResponse};

use crate::models::CityData;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait GuideService: Send + Sync {
    async fn fetch_guide(&self, city: &str) -> Result<CityData>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<ImageDataUri>;
}
