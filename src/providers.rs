//! Media backend providers.

use crate::client::MediaBackend;
use crate::options::{ModelOptions, TransportOptions};

/// Trait for providers that can create configured media backends.
pub trait Provider {
    /// The backend type produced by this provider.
    type Client: MediaBackend;

    /// Provider-specific model options.
    type Model: Default;

    /// Create a new client with the given API key and model.
    fn create(api_key: String, model: String) -> Self::Client {
        Self::create_with_options(
            api_key,
            ModelOptions::new(model),
            TransportOptions::default(),
        )
    }

    /// Create a new client with custom options.
    fn create_with_options(
        api_key: String,
        model_options: ModelOptions<Self::Model>,
        transport_options: TransportOptions,
    ) -> Self::Client;
}

pub mod gemini;

pub use gemini::{Gemini, GeminiClient, GeminiModel};
