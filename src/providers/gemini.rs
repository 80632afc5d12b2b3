//! Gemini provider implementation.

use crate::options::{ModelOptions, TransportOptions};
use crate::providers::Provider;

pub use crate::api::gemini::{GeminiClient, GeminiModel, DEFAULT_BASE_URL};

pub struct Gemini;

impl Provider for Gemini {
    type Client = GeminiClient;
    type Model = GeminiModel;

    fn create_with_options(
        api_key: String,
        model_options: ModelOptions<GeminiModel>,
        transport_options: TransportOptions,
    ) -> Self::Client {
        GeminiClient::new(
            api_key,
            DEFAULT_BASE_URL.to_string(),
            model_options,
            transport_options,
        )
    }
}
