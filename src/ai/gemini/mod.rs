pub mod client;
pub mod guide;
pub mod image;
pub mod types;

pub use guide::GeminiGuideClient;
pub use image::GeminiImageClient;

/// Point a wrapper client at a different Gemini host (mock servers, proxies).
macro_rules! impl_with_gemini_base_url {
    ($client:ty) => {
        impl $client {
            pub fn with_base_url(mut self, base_url: String) -> Self {
                self.http = self.http.with_base_url(base_url);
                self
            }
        }
    };
}
pub(crate) use impl_with_gemini_base_url;
