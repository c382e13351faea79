//! Travel guide curator backed by Gemini
//!
//! Looks up a city, asks the guide model for a structured set of attractions,
//! day trips, hotels, restaurants and shopping spots, then generates a
//! photograph for every place shown on screen.

pub mod ai;
pub mod controller;
pub mod error;
pub mod images;
pub mod models;
pub mod prompts;
pub mod render;
pub mod schema;
pub mod session;

pub use error::{Error, Result};
