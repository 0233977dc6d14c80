use thiserror::Error;

use crate::design::{BrandAsset, Design, DesignId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("design {0} is not in this session")]
    UnknownDesign(DesignId),
}

/// In-memory design list plus brand constraints for one session.
///
/// Newest designs come first. The active design is tracked by id so it
/// always resolves to the current record in the list.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    designs: Vec<Design>,
    active: Option<DesignId>,
    brand_assets: Vec<BrandAsset>,
}

impl SessionStore {
    pub fn new(brand_assets: Vec<BrandAsset>) -> Self {
        Self {
            designs: Vec::new(),
            active: None,
            brand_assets,
        }
    }

    pub fn designs(&self) -> &[Design] {
        &self.designs
    }

    pub fn design(&self, id: &DesignId) -> Option<&Design> {
        self.designs.iter().find(|design| design.id() == id)
    }

    pub fn contains(&self, id: &DesignId) -> bool {
        self.design(id).is_some()
    }

    pub fn active_design(&self) -> Option<&Design> {
        self.active.as_ref().and_then(|id| self.design(id))
    }

    pub fn active_id(&self) -> Option<&DesignId> {
        self.active.as_ref()
    }

    pub fn brand_assets(&self) -> &[BrandAsset] {
        &self.brand_assets
    }

    /// Prepends and activates. Callers guarantee the id is fresh.
    pub fn add_design(&mut self, design: Design) {
        self.active = Some(design.id().clone());
        self.designs.insert(0, design);
    }

    /// Prepends without touching the active design.
    pub fn insert_design(&mut self, design: Design) {
        self.designs.insert(0, design);
    }

    /// Replaces the record with the same id and makes it active.
    pub fn update_design(&mut self, updated: Design) -> Result<(), SessionError> {
        let id = updated.id().clone();
        self.replace_design(updated)?;
        self.active = Some(id);
        Ok(())
    }

    /// Replaces the record with the same id without changing the active design.
    pub fn replace_design(&mut self, updated: Design) -> Result<(), SessionError> {
        let Some(slot) = self
            .designs
            .iter_mut()
            .find(|design| design.id() == updated.id())
        else {
            return Err(SessionError::UnknownDesign(updated.id().clone()));
        };
        *slot = updated;
        Ok(())
    }

    pub fn select_design(&mut self, id: &DesignId) -> Result<&Design, SessionError> {
        if !self.contains(id) {
            return Err(SessionError::UnknownDesign(id.clone()));
        }
        self.active = Some(id.clone());
        self.design(id)
            .ok_or_else(|| SessionError::UnknownDesign(id.clone()))
    }

    pub fn set_brand_assets(&mut self, assets: Vec<BrandAsset>) {
        self.brand_assets = assets;
    }
}

#[cfg(test)]
mod tests {
    use crate::design::{
        default_brand_assets, BomItem, Design, DesignId, ImageRef, Measurement, SizeChart,
        TechPack,
    };

    use super::{SessionError, SessionStore};

    fn design(prompt: &str) -> Design {
        Design::new(ImageRef::from_bytes("image/png", prompt.as_bytes()), prompt)
    }

    fn tech_pack() -> TechPack {
        TechPack {
            bom: vec![BomItem {
                component: "Shell".to_string(),
                material: "Wool".to_string(),
                details: "Red".to_string(),
            }],
            measurements: vec![Measurement {
                point: "Chest".to_string(),
                tolerance: None,
                sizes: SizeChart {
                    s: "50".to_string(),
                    m: "52".to_string(),
                    l: "54".to_string(),
                    xl: "56".to_string(),
                },
            }],
            construction_notes: Vec::new(),
        }
    }

    #[test]
    fn add_design_prepends_and_activates() {
        let mut store = SessionStore::new(default_brand_assets());
        let first = design("first");
        let second = design("second");
        store.add_design(first.clone());
        store.add_design(second.clone());

        let prompts: Vec<&str> = store.designs().iter().map(Design::prompt).collect();
        assert_eq!(prompts, vec!["second", "first"]);
        assert_eq!(store.active_design(), Some(&second));
    }

    #[test]
    fn insert_design_keeps_no_active_design() {
        let mut store = SessionStore::default();
        let late = design("late");
        store.insert_design(late.clone());
        assert_eq!(store.designs(), &[late]);
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn update_design_replaces_in_place_and_activates() -> anyhow::Result<()> {
        let mut store = SessionStore::default();
        let first = design("first");
        let second = design("second");
        store.add_design(first.clone());
        store.add_design(second);

        let updated = first.with_tech_pack(tech_pack());
        store.update_design(updated.clone())?;
        assert_eq!(store.designs().len(), 2);
        assert_eq!(store.designs()[1], updated);
        assert_eq!(store.active_design(), Some(&updated));
        Ok(())
    }

    #[test]
    fn update_design_twice_matches_once() -> anyhow::Result<()> {
        let mut once = SessionStore::default();
        let mut twice = SessionStore::default();
        let original = design("coat");
        once.add_design(original.clone());
        twice.add_design(original.clone());

        let updated = original.with_edit(ImageRef::from_bytes("image/png", b"new"), "shorter");
        once.update_design(updated.clone())?;
        twice.update_design(updated.clone())?;
        twice.update_design(updated)?;
        assert_eq!(once.designs(), twice.designs());
        assert_eq!(once.active_id(), twice.active_id());
        Ok(())
    }

    #[test]
    fn update_with_unknown_id_is_rejected_without_activation() {
        let mut store = SessionStore::default();
        let kept = design("kept");
        store.add_design(kept.clone());

        let orphan = design("orphan");
        let err = store.update_design(orphan.clone());
        assert_eq!(err, Err(SessionError::UnknownDesign(orphan.id().clone())));
        assert_eq!(store.active_design(), Some(&kept));
        assert_eq!(store.designs(), &[kept]);
    }

    #[test]
    fn replace_design_leaves_active_alone() -> anyhow::Result<()> {
        let mut store = SessionStore::default();
        let first = design("first");
        let second = design("second");
        store.add_design(first.clone());
        store.add_design(second.clone());

        store.replace_design(first.with_tech_pack(tech_pack()))?;
        assert_eq!(store.active_id(), Some(second.id()));
        assert!(store
            .design(first.id())
            .and_then(Design::tech_pack)
            .is_some());
        Ok(())
    }

    #[test]
    fn select_design_requires_membership() {
        let mut store = SessionStore::default();
        let first = design("first");
        store.add_design(first.clone());
        store.add_design(design("second"));

        assert_eq!(store.select_design(first.id()).ok(), Some(&first));
        assert_eq!(store.active_id(), Some(first.id()));
        let missing = DesignId::from("missing");
        assert_eq!(
            store.select_design(&missing).err(),
            Some(SessionError::UnknownDesign(missing))
        );
    }

    #[test]
    fn set_brand_assets_replaces_collection() {
        let mut store = SessionStore::new(default_brand_assets());
        assert_eq!(store.brand_assets().len(), 2);
        store.set_brand_assets(Vec::new());
        assert!(store.brand_assets().is_empty());
    }
}
