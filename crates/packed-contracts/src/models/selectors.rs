use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves a model for every capability in `capabilities` served by `provider`.
    pub fn select(
        &self,
        requested: Option<&str>,
        capabilities: &[&str],
        provider: &str,
    ) -> Result<ModelSelection, String> {
        let label = capabilities.join("+");
        let fallback_reason = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.get(requested_value) {
                if model.provider == provider
                    && capabilities.iter().all(|capability| model.supports(capability))
                {
                    return Ok(ModelSelection {
                        model: model.clone(),
                        requested: Some(requested_value.to_string()),
                        fallback_reason: None,
                    });
                }
            }
            Some(format!(
                "Requested model '{requested_value}' unavailable for capability '{label}' on provider '{provider}'."
            ))
        } else {
            None
        };

        let candidates = self
            .registry
            .list()
            .filter(|model| model.provider == provider)
            .filter(|model| capabilities.iter().all(|capability| model.supports(capability)))
            .cloned()
            .collect::<Vec<ModelSpec>>();
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No models available for capability '{label}' on provider '{provider}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason,
        })
    }
}
