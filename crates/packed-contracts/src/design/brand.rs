use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandAssetKind {
    Color,
    Logo,
    Fit,
}

impl BrandAssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Logo => "logo",
            Self::Fit => "fit",
        }
    }
}

impl fmt::Display for BrandAssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrandAssetKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "color" | "colour" => Ok(Self::Color),
            "logo" => Ok(Self::Logo),
            "fit" => Ok(Self::Fit),
            other => Err(format!(
                "Unknown brand asset type '{other}' (expected color, logo or fit)."
            )),
        }
    }
}

/// Reusable brand constraint fed into generation requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandAsset {
    pub id: String,
    pub name: String,
    /// Hex code, logo URL or fit description depending on `kind`.
    pub value: String,
    #[serde(rename = "type")]
    pub kind: BrandAssetKind,
}

impl BrandAsset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        kind: BrandAssetKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: value.into(),
            kind,
        }
    }
}

pub fn default_brand_assets() -> Vec<BrandAsset> {
    vec![
        BrandAsset::new("1", "Primary Black", "#0a0a0a", BrandAssetKind::Color),
        BrandAsset::new(
            "2",
            "Oversized Fit",
            "Drop shoulders, elongated sleeves",
            BrandAssetKind::Fit,
        ),
    ]
}

/// Renders assets as `name: value` pairs; `None` when there is nothing to honor.
pub fn brand_context(assets: &[BrandAsset]) -> Option<String> {
    let rendered = assets
        .iter()
        .filter(|asset| !asset.name.trim().is_empty() || !asset.value.trim().is_empty())
        .map(|asset| format!("{}: {}", asset.name.trim(), asset.value.trim()))
        .collect::<Vec<String>>()
        .join(", ");
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{brand_context, default_brand_assets, BrandAsset, BrandAssetKind};

    #[test]
    fn brand_context_joins_name_value_pairs() {
        assert_eq!(
            brand_context(&default_brand_assets()).as_deref(),
            Some("Primary Black: #0a0a0a, Oversized Fit: Drop shoulders, elongated sleeves")
        );
        assert_eq!(brand_context(&[]), None);
    }

    #[test]
    fn kind_serializes_under_type_key() -> anyhow::Result<()> {
        let asset = BrandAsset::new("3", "Wordmark", "https://cdn.test/logo.svg", BrandAssetKind::Logo);
        let value = serde_json::to_value(&asset)?;
        assert_eq!(value["type"], json!("logo"));
        let back: BrandAsset = serde_json::from_value(value)?;
        assert_eq!(back, asset);
        Ok(())
    }

    #[test]
    fn kind_parses_from_command_text() {
        assert_eq!("Colour".parse::<BrandAssetKind>(), Ok(BrandAssetKind::Color));
        assert_eq!("fit".parse::<BrandAssetKind>(), Ok(BrandAssetKind::Fit));
        assert!("texture".parse::<BrandAssetKind>().is_err());
    }
}
