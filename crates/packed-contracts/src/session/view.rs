use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::design::{Design, DesignId};
use crate::trends::TrendReport;

use super::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("design {0} is not in this session")]
    NoSuchDesign(DesignId),
    #[error("no design is active; generate or open one first")]
    NoActiveDesign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Workspace,
    Ideation,
    Production,
    Trends,
}

impl Screen {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Ideation => "ideation",
            Self::Production => "production",
            Self::Trends => "trends",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Production screen bound to a design that exists in the store.
///
/// Only the controller builds one, after checking the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionView {
    design_id: DesignId,
}

impl ProductionView {
    pub fn design_id(&self) -> &DesignId {
        &self.design_id
    }
}

/// Screen-local trend report. Never written to the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendsView {
    visit: u64,
    report: Option<TrendReport>,
    error: Option<String>,
}

impl TrendsView {
    pub fn visit(&self) -> u64 {
        self.visit
    }

    pub fn is_loading(&self) -> bool {
        self.report.is_none() && self.error.is_none()
    }

    pub fn report(&self) -> Option<&TrendReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Workspace,
    Ideation,
    Production(ProductionView),
    Trends(TrendsView),
}

impl View {
    pub fn screen(&self) -> Screen {
        match self {
            Self::Workspace => Screen::Workspace,
            Self::Ideation => Screen::Ideation,
            Self::Production(_) => Screen::Production,
            Self::Trends(_) => Screen::Trends,
        }
    }
}

/// Returned on every entry to the trends screen; the caller owes one fetch for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendsVisit(pub u64);

#[derive(Debug, Clone)]
pub struct ViewController {
    view: View,
    trend_visits: u64,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            view: View::Workspace,
            trend_visits: 0,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn screen(&self) -> Screen {
        self.view.screen()
    }

    pub fn show_workspace(&mut self) {
        self.view = View::Workspace;
    }

    pub fn show_ideation(&mut self) {
        self.view = View::Ideation;
    }

    /// Selects a design card: activates it, then shows its production screen.
    pub fn open_design(&mut self, store: &mut SessionStore, id: &DesignId) -> Result<(), ViewError> {
        store
            .select_design(id)
            .map_err(|_| ViewError::NoSuchDesign(id.clone()))?;
        self.view = View::Production(ProductionView {
            design_id: id.clone(),
        });
        Ok(())
    }

    pub fn show_production(&mut self, store: &SessionStore) -> Result<(), ViewError> {
        let id = store.active_id().cloned().ok_or(ViewError::NoActiveDesign)?;
        self.view = View::Production(ProductionView { design_id: id });
        Ok(())
    }

    pub fn show_trends(&mut self) -> TrendsVisit {
        self.trend_visits += 1;
        self.view = View::Trends(TrendsView {
            visit: self.trend_visits,
            report: None,
            error: None,
        });
        TrendsVisit(self.trend_visits)
    }

    /// Stores a fetched report if the requesting visit is still on screen.
    pub fn finish_trends(&mut self, visit: TrendsVisit, outcome: Result<TrendReport, String>) -> bool {
        let View::Trends(current) = &mut self.view else {
            return false;
        };
        if current.visit != visit.0 {
            return false;
        }
        match outcome {
            Ok(report) => {
                current.report = Some(report);
                current.error = None;
            }
            Err(message) => {
                current.report = Some(TrendReport::empty());
                current.error = Some(message);
            }
        }
        true
    }

    pub fn is_trends_visit_current(&self, visit: TrendsVisit) -> bool {
        matches!(&self.view, View::Trends(current) if current.visit == visit.0)
    }

    pub fn production_design<'a>(&self, store: &'a SessionStore) -> Option<&'a Design> {
        match &self.view {
            View::Production(production) => store.design(production.design_id()),
            _ => None,
        }
    }
}
