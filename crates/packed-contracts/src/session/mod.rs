mod store;
mod view;

pub use store::{SessionError, SessionStore};
pub use view::{ProductionView, Screen, TrendsView, TrendsVisit, View, ViewController, ViewError};

use crate::design::{BrandAsset, Design, DesignId};
use crate::trends::TrendReport;

/// Session state passed by reference into the controller layer.
///
/// All writes go through these mutators so the store and the current
/// screen stay consistent.
#[derive(Debug, Clone, Default)]
pub struct Session {
    store: SessionStore,
    views: ViewController,
}

impl Session {
    pub fn new(brand_assets: Vec<BrandAsset>) -> Self {
        Self {
            store: SessionStore::new(brand_assets),
            views: ViewController::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn view(&self) -> &View {
        self.views.view()
    }

    pub fn screen(&self) -> Screen {
        self.views.screen()
    }

    pub fn active_design(&self) -> Option<&Design> {
        self.store.active_design()
    }

    /// Prepends, activates and switches to the ideation screen.
    pub fn add_design(&mut self, design: Design) {
        self.store.add_design(design);
        self.views.show_ideation();
    }

    /// Stores a new design without moving the user off their current screen.
    pub fn add_design_in_background(&mut self, design: Design) {
        self.store.insert_design(design);
    }

    pub fn update_design(&mut self, updated: Design) -> Result<(), SessionError> {
        self.store.update_design(updated)
    }

    pub fn replace_design(&mut self, updated: Design) -> Result<(), SessionError> {
        self.store.replace_design(updated)
    }

    pub fn set_brand_assets(&mut self, assets: Vec<BrandAsset>) {
        self.store.set_brand_assets(assets);
    }

    pub fn show_workspace(&mut self) {
        self.views.show_workspace();
    }

    pub fn show_ideation(&mut self) {
        self.views.show_ideation();
    }

    pub fn open_design(&mut self, id: &DesignId) -> Result<(), ViewError> {
        self.views.open_design(&mut self.store, id)
    }

    pub fn show_production(&mut self) -> Result<(), ViewError> {
        self.views.show_production(&self.store)
    }

    pub fn show_trends(&mut self) -> TrendsVisit {
        self.views.show_trends()
    }

    pub fn finish_trends(&mut self, visit: TrendsVisit, outcome: Result<TrendReport, String>) -> bool {
        self.views.finish_trends(visit, outcome)
    }

    pub fn is_trends_visit_current(&self, visit: TrendsVisit) -> bool {
        self.views.is_trends_visit_current(visit)
    }

    pub fn production_design(&self) -> Option<&Design> {
        self.views.production_design(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use crate::design::{default_brand_assets, Design, ImageRef};

    use super::{Screen, Session};

    fn design(prompt: &str) -> Design {
        Design::new(ImageRef::from_bytes("image/png", prompt.as_bytes()), prompt)
    }

    #[test]
    fn add_design_switches_to_ideation() {
        let mut session = Session::new(default_brand_assets());
        session.show_trends();
        let created = design("denim jacket");
        session.add_design(created.clone());
        assert_eq!(session.screen(), Screen::Ideation);
        assert_eq!(session.active_design(), Some(&created));
    }

    #[test]
    fn background_add_keeps_screen_and_active_design() -> anyhow::Result<()> {
        let mut session = Session::default();
        let first = design("first");
        session.add_design(first.clone());
        session.open_design(first.id())?;

        let late = design("late");
        session.add_design_in_background(late.clone());
        assert_eq!(session.screen(), Screen::Production);
        assert_eq!(session.active_design(), Some(&first));
        assert_eq!(session.store().designs()[0], late);
        Ok(())
    }

    #[test]
    fn background_add_without_active_design_stays_inactive() {
        let mut session = Session::default();
        session.show_trends();
        let late = design("late");
        session.add_design_in_background(late.clone());
        assert_eq!(session.screen(), Screen::Trends);
        assert_eq!(session.active_design(), None);
        assert_eq!(session.store().designs(), &[late]);
    }
}
