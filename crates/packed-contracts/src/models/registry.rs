use indexmap::IndexMap;

pub const CAPABILITY_IMAGE: &str = "image";
pub const CAPABILITY_EDIT: &str = "edit";
pub const CAPABILITY_STRUCTURED: &str = "structured";
pub const CAPABILITY_SEARCH: &str = "search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert(
        "gemini-2.5-flash-image",
        "gemini",
        &[CAPABILITY_IMAGE, CAPABILITY_EDIT],
    );
    insert(
        "gemini-3-pro-image-preview",
        "gemini",
        &[CAPABILITY_IMAGE, CAPABILITY_EDIT],
    );
    insert(
        "gemini-3-flash-preview",
        "gemini",
        &[CAPABILITY_STRUCTURED, CAPABILITY_SEARCH],
    );
    insert(
        "gemini-3-pro-preview",
        "gemini",
        &[CAPABILITY_STRUCTURED, CAPABILITY_SEARCH],
    );
    insert(
        "gemini-2.5-flash",
        "gemini",
        &[CAPABILITY_STRUCTURED, CAPABILITY_SEARCH],
    );
    insert(
        "dryrun-image-1",
        "dryrun",
        &[CAPABILITY_IMAGE, CAPABILITY_EDIT],
    );
    insert(
        "dryrun-text-1",
        "dryrun",
        &[CAPABILITY_STRUCTURED, CAPABILITY_SEARCH],
    );

    map
}
