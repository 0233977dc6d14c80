mod brand;
mod image_ref;
mod tech_pack;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use brand::{brand_context, default_brand_assets, BrandAsset, BrandAssetKind};
pub use image_ref::{ImageRef, ImageRefError, DEFAULT_IMAGE_MIME};
pub use tech_pack::{
    tech_pack_response_schema, BomItem, Measurement, SizeChart, TechPack, TechPackError,
    SIZE_LABELS,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignId(String);

impl DesignId {
    /// Millisecond timestamp plus a short random suffix; ordered by creation time.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", at.timestamp_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DesignId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DesignId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One garment concept.
///
/// `id` and `created_at` are fixed at construction. Every other field is
/// replaced wholesale through the `with_*` builders, which return a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    id: DesignId,
    #[serde(rename = "imageUrl")]
    image: ImageRef,
    prompt: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tech_pack: Option<TechPack>,
}

impl Design {
    pub fn new(image: ImageRef, prompt: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: DesignId::generate(created_at),
            image,
            prompt: prompt.into(),
            created_at,
            tech_pack: None,
        }
    }

    pub fn id(&self) -> &DesignId {
        &self.id
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn tech_pack(&self) -> Option<&TechPack> {
        self.tech_pack.as_ref()
    }

    /// New image with the instruction appended to the prompt history.
    pub fn with_edit(&self, image: ImageRef, instruction: &str) -> Self {
        Self {
            image,
            prompt: edited_prompt(&self.prompt, instruction),
            ..self.clone()
        }
    }

    pub fn with_tech_pack(&self, tech_pack: TechPack) -> Self {
        Self {
            tech_pack: Some(tech_pack),
            ..self.clone()
        }
    }
}

pub fn edited_prompt(original: &str, instruction: &str) -> String {
    format!("{original} ({instruction})")
}
