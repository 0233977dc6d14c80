mod registry;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, CAPABILITY_EDIT, CAPABILITY_IMAGE, CAPABILITY_SEARCH,
    CAPABILITY_STRUCTURED,
};
pub use selectors::{ModelSelection, ModelSelector};
