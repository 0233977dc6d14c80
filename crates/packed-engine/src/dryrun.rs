use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use packed_contracts::design::{BomItem, ImageRef, Measurement, SizeChart, TechPack};
use sha2::{Digest, Sha256};

use crate::error::{GenerationError, Operation};
use crate::GenerationClient;

// 3:4 portrait, kept small.
const SWATCH_WIDTH: u32 = 96;
const SWATCH_HEIGHT: u32 = 128;

pub const DRYRUN_TREND_TEXT: &str = "Dryrun trend notes: electric blues and copper accents lead the season, with relaxed boxy silhouettes and matte technical fabrics.";

/// Offline client: deterministic solid-colour swatches and a templated tech pack.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunClient;

impl DryrunClient {
    pub fn new() -> Self {
        Self
    }
}

impl GenerationClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn synthesize(&self, prompt: &str, brand_context: Option<&str>) -> Result<ImageRef, GenerationError> {
        render_swatch(
            Operation::Synthesize,
            &[prompt.as_bytes(), brand_context.unwrap_or_default().as_bytes()],
        )
    }

    fn edit(&self, source: &ImageRef, instruction: &str) -> Result<ImageRef, GenerationError> {
        let bytes = source.decode_bytes()?;
        render_swatch(Operation::Edit, &[&bytes, instruction.as_bytes()])
    }

    fn extract_spec(&self, source: &ImageRef, context_prompt: &str) -> Result<TechPack, GenerationError> {
        source.decode_bytes()?;
        Ok(template_tech_pack(context_prompt))
    }

    fn fetch_trend_report(&self) -> Result<String, GenerationError> {
        Ok(DRYRUN_TREND_TEXT.to_string())
    }
}

fn color_from_chunks(chunks: &[&[u8]]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.len() as u64).to_be_bytes());
        hasher.update(chunk);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn render_swatch(operation: Operation, chunks: &[&[u8]]) -> Result<ImageRef, GenerationError> {
    let (r, g, b) = color_from_chunks(chunks);
    let image = RgbImage::from_pixel(SWATCH_WIDTH, SWATCH_HEIGHT, Rgb([r, g, b]));
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|err| {
            GenerationError::failed(operation, format!("failed to encode dryrun image: {err}"))
        })?;
    Ok(ImageRef::from_bytes("image/png", &encoded.into_inner()))
}

fn template_tech_pack(context_prompt: &str) -> TechPack {
    let garment = context_prompt.trim();
    let garment = if garment.is_empty() { "garment" } else { garment };
    let sizes = |s: &str, m: &str, l: &str, xl: &str| SizeChart {
        s: s.to_string(),
        m: m.to_string(),
        l: l.to_string(),
        xl: xl.to_string(),
    };
    TechPack {
        bom: vec![
            BomItem {
                component: "Shell".to_string(),
                material: "Main fabric".to_string(),
                details: format!("Body and sleeves for {garment}"),
            },
            BomItem {
                component: "Lining".to_string(),
                material: "Cupro twill".to_string(),
                details: "Full body, self-colour".to_string(),
            },
            BomItem {
                component: "Thread".to_string(),
                material: "Polyester core-spun".to_string(),
                details: "Tex 40, matched to shell".to_string(),
            },
        ],
        measurements: vec![
            Measurement {
                point: "Chest width".to_string(),
                tolerance: Some("0.5 in".to_string()),
                sizes: sizes("20", "21", "22", "23.5"),
            },
            Measurement {
                point: "Body length".to_string(),
                tolerance: Some("0.5 in".to_string()),
                sizes: sizes("27", "28", "29", "30"),
            },
            Measurement {
                point: "Sleeve length".to_string(),
                tolerance: None,
                sizes: sizes("24", "24.5", "25", "25.5"),
            },
        ],
        construction_notes: vec![
            "Single-needle topstitch at 1/4 in on all visible seams.".to_string(),
            "Overlock interior seams; bind hem allowance.".to_string(),
            format!("Press and inspect against the approved {garment} sample."),
        ],
    }
}
