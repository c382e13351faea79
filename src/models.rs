//! Data models and structures
//!
//! Defines the city guide data contract returned by the guide model, the
//! category tabs over it, and environment configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One recommended place with an image-generation prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TravelItem {
    pub name: String,
    pub description: String,
    pub image_prompt: String,
}

/// Structured guide for one queried city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CityData {
    pub city_name: String,
    pub landing_image_prompt: String,
    pub intro: String,
    #[serde(default)]
    pub attractions: Vec<TravelItem>,
    #[serde(default)]
    pub nearby: Vec<TravelItem>,
    #[serde(default)]
    pub hotels: Vec<TravelItem>,
    #[serde(default)]
    pub restaurants: Vec<TravelItem>,
    #[serde(default)]
    pub shopping: Vec<TravelItem>,
}

impl CityData {
    pub fn items(&self, category: Category) -> &[TravelItem] {
        match category {
            Category::Attractions => &self.attractions,
            Category::Nearby => &self.nearby,
            Category::Hotels => &self.hotels,
            Category::Restaurants => &self.restaurants,
            Category::Shopping => &self.shopping,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Attractions,
    Nearby,
    Hotels,
    Restaurants,
    Shopping,
}

impl Category {
    /// Tab display order.
    pub const ALL: [Category; 5] = [
        Category::Attractions,
        Category::Nearby,
        Category::Hotels,
        Category::Restaurants,
        Category::Shopping,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Category::Attractions => "attractions",
            Category::Nearby => "nearby",
            Category::Hotels => "hotels",
            Category::Restaurants => "restaurants",
            Category::Shopping => "shopping",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Attractions => "필수 명소",
            Category::Nearby => "근교 여행",
            Category::Hotels => "추천 숙소",
            Category::Restaurants => "로컬 맛집",
            Category::Shopping => "쇼핑",
        }
    }

    pub fn section_title(self) -> &'static str {
        match self {
            Category::Attractions => "필수 명소 : 반드시 머물러야 할 곳",
            Category::Nearby => "근교 여행 : 한 걸음 더 멀리",
            Category::Hotels => "추천 숙소 : 완벽한 휴식의 공간",
            Category::Restaurants => "로컬 맛집 : 잊지 못할 한 끼",
            Category::Shopping => "쇼핑 스팟 : 당신의 취향을 담다",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.id() == needle)
            .ok_or_else(|| {
                crate::Error::Config(format!(
                    "Unknown category '{}'. Expected one of: attractions, nearby, hotels, restaurants, shopping",
                    s
                ))
            })
    }
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GUIDE_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub guide_model: String,
    pub image_model: String,
    pub base_url: String,
    pub guide_timeout: Duration,
    pub image_timeout: Duration,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .ok_or_else(|| crate::Error::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            gemini_api_key,
            guide_model: non_empty("GUIDE_MODEL").unwrap_or_else(|| DEFAULT_GUIDE_MODEL.to_string()),
            image_model: non_empty("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            base_url: non_empty("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            guide_timeout: parse_secs(non_empty("GUIDE_TIMEOUT_SECS"), "GUIDE_TIMEOUT_SECS")?,
            image_timeout: parse_secs(non_empty("IMAGE_TIMEOUT_SECS"), "IMAGE_TIMEOUT_SECS")?,
        })
    }
}

fn parse_secs(value: Option<String>, key: &str) -> crate::Result<Duration> {
    match value {
        None => Ok(Duration::from_secs(120)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| crate::Error::Config(format!("{} must be a whole number of seconds", key))),
    }
}
