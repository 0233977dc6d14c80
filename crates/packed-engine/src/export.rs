use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use packed_contracts::design::Design;

/// Writes the design image and, when attached, its tech pack into `out_dir`.
///
/// Returns the written paths, image first.
pub fn export_design(design: &Design, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut written = Vec::new();
    let image_path = out_dir.join(format!(
        "{}.{}",
        design.id(),
        design.image().file_extension()
    ));
    let bytes = design
        .image()
        .decode_bytes()
        .with_context(|| format!("design {} has an unreadable image", design.id()))?;
    fs::write(&image_path, bytes)
        .with_context(|| format!("failed to write {}", image_path.display()))?;
    written.push(image_path);

    if let Some(tech_pack) = design.tech_pack() {
        let pack_path = out_dir.join(format!("{}-techpack.json", design.id()));
        let mut payload = serde_json::to_string_pretty(tech_pack)?;
        payload.push('\n');
        fs::write(&pack_path, payload)
            .with_context(|| format!("failed to write {}", pack_path.display()))?;
        written.push(pack_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use packed_contracts::design::{Design, ImageRef, TechPack};
    use serde_json::Value;

    use super::export_design;
    use crate::dryrun::DryrunClient;
    use crate::GenerationClient;

    #[test]
    fn export_writes_image_and_tech_pack() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out_dir = temp.path().join("exports");
        let client = DryrunClient::new();
        let image = client.synthesize("linen shirt", None)?;
        let pack = client.extract_spec(&image, "linen shirt")?;
        let design = Design::new(image.clone(), "linen shirt").with_tech_pack(pack.clone());

        let written = export_design(&design, &out_dir)?;
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], out_dir.join(format!("{}.png", design.id())));
        assert_eq!(fs::read(&written[0])?, image.decode_bytes()?);

        let saved: Value = serde_json::from_str(&fs::read_to_string(&written[1])?)?;
        assert!(saved.get("constructionNotes").is_some());
        let parsed: TechPack = serde_json::from_value(saved)?;
        assert_eq!(parsed, pack);
        Ok(())
    }

    #[test]
    fn export_without_tech_pack_writes_image_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let design = Design::new(ImageRef::from_bytes("image/jpeg", b"jpeg-bytes"), "coat");
        let written = export_design(&design, temp.path())?;
        assert_eq!(written, vec![temp.path().join(format!("{}.jpg", design.id()))]);
        Ok(())
    }
}
