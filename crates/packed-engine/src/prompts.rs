pub const DESIGN_ASPECT_RATIO: &str = "3:4";

pub fn synthesize_text(prompt: &str, brand_context: Option<&str>) -> String {
    match brand_context.map(str::trim).filter(|value| !value.is_empty()) {
        Some(context) => format!("Fashion design based on: {prompt}. Apply brand DNA: {context}"),
        None => format!("High-quality photorealistic fashion design: {prompt}"),
    }
}

pub fn edit_text(instruction: &str) -> String {
    format!("Modify this design: {instruction}")
}

pub fn tech_pack_text(design_prompt: &str) -> String {
    format!(
        "Based on this fashion design ({design_prompt}), generate a detailed technical production specification (Tech Pack). Include Bill of Materials (BOM), measurement charts for S, M, L, XL, and specific construction notes for a manufacturer."
    )
}
