use serde::{Deserialize, Serialize};

pub const TREND_RESEARCH_PROMPT: &str = "What are the trending fashion color palettes, silhouettes, and fabric textures for the current season? Provide data suitable for visualization.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteShare {
    pub name: String,
    pub value: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumPoint {
    pub month: String,
    pub volume: u32,
}

/// Freeform research text shown next to the fixed chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendReport {
    pub text: String,
    pub palettes: Vec<PaletteShare>,
    pub momentum: Vec<MomentumPoint>,
}

impl TrendReport {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            palettes: emerging_palettes(),
            momentum: volume_momentum(),
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub fn emerging_palettes() -> Vec<PaletteShare> {
    [
        ("Cyber Blue", 85, "#3b82f6"),
        ("Copper Rust", 65, "#b45309"),
        ("Matte Onyx", 92, "#18181b"),
        ("Hyper Lime", 45, "#84cc16"),
    ]
    .into_iter()
    .map(|(name, value, color)| PaletteShare {
        name: name.to_string(),
        value,
        color: color.to_string(),
    })
    .collect()
}

pub fn volume_momentum() -> Vec<MomentumPoint> {
    [
        ("Jan", 400),
        ("Feb", 300),
        ("Mar", 500),
        ("Apr", 800),
        ("May", 600),
        ("Jun", 900),
    ]
    .into_iter()
    .map(|(month, volume)| MomentumPoint {
        month: month.to_string(),
        volume,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::TrendReport;

    #[test]
    fn report_carries_static_chart_series() {
        let report = TrendReport::new("Butter yellow is everywhere.");
        assert!(!report.is_empty());
        assert_eq!(report.palettes.len(), 4);
        assert_eq!(report.palettes[2].name, "Matte Onyx");
        assert_eq!(report.momentum.last().map(|point| point.volume), Some(900));
        assert!(TrendReport::empty().is_empty());
    }
}
