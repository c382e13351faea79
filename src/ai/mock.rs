use super::{GuideService, ImageDataUri, ImageGenerationService};
use crate::models::{CityData, TravelItem};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted outcome for one [`MockGuideClient`] call.
#[derive(Debug, Clone)]
pub enum MockGuideResponse {
    Guide(CityData),
    RequestFailure(String),
    ParseFailure(String),
}

#[derive(Clone)]
pub struct MockGuideClient {
    responses: Arc<Mutex<VecDeque<MockGuideResponse>>>,
    cities: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockGuideClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            cities: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_response(self, response: MockGuideResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_guide(self, guide: CityData) -> Self {
        self.with_response(MockGuideResponse::Guide(guide))
    }

    pub fn with_request_failure(self, message: &str) -> Self {
        self.with_response(MockGuideResponse::RequestFailure(message.to_string()))
    }

    /// Hold every response back for `delay` before returning it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.cities.lock().unwrap().len()
    }

    pub fn get_cities(&self) -> Vec<String> {
        self.cities.lock().unwrap().clone()
    }

    /// A guide with the list sizes the curator prompt asks for.
    pub fn sample_guide(city: &str) -> CityData {
        let items = |kind: &str, count: usize| -> Vec<TravelItem> {
            (1..=count)
                .map(|i| TravelItem {
                    name: format!("{} {} {}", city, kind, i),
                    description: format!("{} {}번", kind, i),
                    image_prompt: format!("photorealistic {} {} in {}, 4k", kind, i, city),
                })
                .collect()
        };

        CityData {
            city_name: city.to_string(),
            landing_image_prompt: format!("photorealistic travel photography of {}", city),
            intro: format!("{}의 역사와 매력을 소개합니다.", city),
            attractions: items("attraction", 10),
            nearby: items("nearby", 5),
            hotels: items("hotel", 10),
            restaurants: items("restaurant", 10),
            shopping: items("shopping", 3),
        }
    }
}

impl Default for MockGuideClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuideService for MockGuideClient {
    async fn fetch_guide(&self, city: &str) -> Result<CityData> {
        self.cities.lock().unwrap().push(city.to_string());
        let next = self.responses.lock().unwrap().pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match next {
            None => Ok(Self::sample_guide(city.trim())),
            Some(MockGuideResponse::Guide(guide)) => Ok(guide),
            Some(MockGuideResponse::RequestFailure(message)) => Err(Error::Request(message)),
            Some(MockGuideResponse::ParseFailure(message)) => Err(Error::Parse(message)),
        }
    }
}

/// Scripted outcome for one [`MockImageGenerationClient`] call.
#[derive(Debug, Clone)]
pub enum MockImageResponse {
    Image(Vec<u8>),
    Missing,
}

#[derive(Clone)]
pub struct MockImageGenerationClient {
    responses: Arc<Mutex<VecDeque<MockImageResponse>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_image_response(self, response: Vec<u8>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockImageResponse::Image(response));
        self
    }

    pub fn with_missing_image(self) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockImageResponse::Missing);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest valid PNG, returned when no response is scripted.
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImageDataUri> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match next {
            None => Ok(ImageDataUri::new("image/png", TINY_PNG.to_vec())),
            Some(MockImageResponse::Image(bytes)) => Ok(ImageDataUri::new(
                super::mime::detect_image_mime(&bytes),
                bytes,
            )),
            Some(MockImageResponse::Missing) => Err(Error::ImageGeneration(
                "No image data in mock response".to_string(),
            )),
        }
    }
}
