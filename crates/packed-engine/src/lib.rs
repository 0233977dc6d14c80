//! Generation clients (Gemini over HTTP, plus an offline dryrun client) and
//! the [`Studio`] that runs their requests in the background and commits the
//! results into the session.

pub mod config;
pub mod dryrun;
pub mod error;
pub mod export;
pub mod gemini;
pub mod prompts;
pub mod studio;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use packed_contracts::design::{ImageRef, TechPack};
use tracing::warn;

pub use config::StudioConfig;
pub use dryrun::DryrunClient;
pub use error::{GenerationError, Operation};
pub use export::export_design;
pub use gemini::GeminiClient;
pub use studio::{Notice, NoticeKind, Studio, StudioError, Ticket};

/// The four calls the studio makes against the generation service.
///
/// Implementations block; the studio runs each call on its own worker thread.
pub trait GenerationClient: Send + Sync {
    fn name(&self) -> &str;
    fn synthesize(&self, prompt: &str, brand_context: Option<&str>) -> Result<ImageRef, GenerationError>;
    fn edit(&self, source: &ImageRef, instruction: &str) -> Result<ImageRef, GenerationError>;
    fn extract_spec(&self, source: &ImageRef, context_prompt: &str) -> Result<TechPack, GenerationError>;
    /// Raw research text. An empty string is a valid, empty report.
    fn fetch_trend_report(&self) -> Result<String, GenerationError>;
}

#[derive(Default)]
pub struct GenerationClientRegistry {
    clients: BTreeMap<String, Arc<dyn GenerationClient>>,
}

impl GenerationClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: GenerationClient + 'static>(&mut self, client: C) {
        self.clients
            .insert(client.name().to_string(), Arc::new(client));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationClient>> {
        self.clients.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

pub fn default_client_registry(config: &StudioConfig) -> Result<GenerationClientRegistry> {
    let mut registry = GenerationClientRegistry::new();
    registry.register(DryrunClient::new());
    let gemini = GeminiClient::new(config)?;
    for warning in gemini.warnings() {
        warn!(%warning, "model fallback");
    }
    registry.register(gemini);
    Ok(registry)
}

/// Resolves the configured provider to a shared client.
pub fn build_client(config: &StudioConfig) -> Result<Arc<dyn GenerationClient>> {
    let registry = default_client_registry(config)?;
    registry.get(&config.provider).ok_or_else(|| {
        anyhow!(
            "Unknown provider '{}'. Available: {}",
            config.provider,
            registry.names().join(", ")
        )
    })
}
