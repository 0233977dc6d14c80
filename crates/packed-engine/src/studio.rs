use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use packed_contracts::design::{
    brand_context, BrandAsset, BrandAssetKind, Design, DesignId, ImageRef, TechPack,
};
use packed_contracts::events::{EventWriter, SessionEvent};
use packed_contracts::session::{Screen, Session, SessionError, TrendsVisit, View, ViewError};
use packed_contracts::trends::TrendReport;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{GenerationError, Operation};
use crate::GenerationClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error("{0} already has a request in flight")]
    Busy(Screen),
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("no active design; generate or open one first")]
    NoActiveDesign,
    #[error(transparent)]
    View(#[from] ViewError),
    #[error("failed to start worker thread: {0}")]
    Spawn(String),
}

/// Identifies one background request and where its result belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub operation: Operation,
    pub screen: Screen,
    pub target: Option<DesignId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One-shot message for the user; drained with [`Studio::take_notices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub screen: Screen,
    pub kind: NoticeKind,
    pub message: String,
}

enum JobResult {
    Synthesized {
        prompt: String,
        result: Result<ImageRef, GenerationError>,
    },
    Edited {
        instruction: String,
        result: Result<ImageRef, GenerationError>,
    },
    TechPack {
        source: ImageRef,
        result: Result<TechPack, GenerationError>,
    },
    Trends {
        visit: TrendsVisit,
        result: Result<String, GenerationError>,
    },
}

struct JobOutcome {
    ticket: u64,
    result: JobResult,
}

struct InFlight {
    ticket: Ticket,
    navigation: u64,
    visit: Option<TrendsVisit>,
    handle: thread::JoinHandle<()>,
}

/// Drives the session: starts background requests and commits their results.
///
/// Results are applied only from [`Studio::poll`] / [`Studio::wait_idle`],
/// so the session store has a single writer. A result is applied in place
/// when the user is still on the screen that started it and has not
/// navigated since; otherwise it is committed without moving the user.
pub struct Studio {
    client: Arc<dyn GenerationClient>,
    session: Session,
    events: Option<EventWriter>,
    sender: mpsc::Sender<JobOutcome>,
    receiver: mpsc::Receiver<JobOutcome>,
    in_flight: BTreeMap<u64, InFlight>,
    next_ticket: u64,
    navigation: u64,
    notices: Vec<Notice>,
}

impl Studio {
    pub fn new(client: Arc<dyn GenerationClient>, session: Session, events: Option<EventWriter>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let studio = Self {
            client,
            session,
            events,
            sender,
            receiver,
            in_flight: BTreeMap::new(),
            next_ticket: 1,
            navigation: 0,
            notices: Vec::new(),
        };
        studio.emit(SessionEvent::SessionStarted {
            client: studio.client.name().to_string(),
            brand_assets: studio.session.store().brand_assets().len(),
            screen: studio.session.screen(),
        });
        studio
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_busy(&self, screen: Screen) -> bool {
        self.in_flight
            .values()
            .any(|entry| entry.ticket.screen == screen)
    }

    /// Loading indicator for a screen. Trends tracks its current visit only.
    pub fn is_loading(&self, screen: Screen) -> bool {
        match screen {
            Screen::Trends => matches!(self.session.view(), View::Trends(trends) if trends.is_loading()),
            other => self.is_busy(other),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn generate(&mut self, prompt: &str) -> Result<Ticket, StudioError> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        self.ensure_idle(Screen::Ideation)?;
        self.enter_ideation();
        let context = brand_context(self.session.store().brand_assets());
        debug!(%prompt, brand_context = context.is_some(), "starting synthesize");
        self.spawn(Operation::Synthesize, Screen::Ideation, None, move |client| {
            let result = client.synthesize(&prompt, context.as_deref());
            JobResult::Synthesized { prompt, result }
        })
    }

    pub fn edit(&mut self, instruction: &str) -> Result<Ticket, StudioError> {
        let instruction = instruction.trim().to_string();
        if instruction.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        self.ensure_idle(Screen::Ideation)?;
        let design = self
            .session
            .active_design()
            .cloned()
            .ok_or(StudioError::NoActiveDesign)?;
        self.enter_ideation();
        debug!(design_id = %design.id(), %instruction, "starting edit");
        self.spawn(
            Operation::Edit,
            Screen::Ideation,
            Some(design.id().clone()),
            move |client| {
                let result = client.edit(design.image(), &instruction);
                JobResult::Edited {
                    instruction,
                    result,
                }
            },
        )
    }

    pub fn generate_tech_pack(&mut self) -> Result<Ticket, StudioError> {
        self.ensure_idle(Screen::Production)?;
        let design = self
            .session
            .production_design()
            .or_else(|| self.session.active_design())
            .cloned()
            .ok_or(StudioError::NoActiveDesign)?;
        if self.session.production_design().is_none() {
            self.open_design(design.id())?;
        }
        debug!(design_id = %design.id(), "starting tech pack extraction");
        self.spawn(
            Operation::ExtractSpec,
            Screen::Production,
            Some(design.id().clone()),
            move |client| JobResult::TechPack {
                result: client.extract_spec(design.image(), design.prompt()),
                source: design.image().clone(),
            },
        )
    }

    pub fn show_workspace(&mut self) {
        self.session.show_workspace();
        self.navigated();
    }

    pub fn show_ideation(&mut self) {
        self.session.show_ideation();
        self.navigated();
    }

    pub fn open_design(&mut self, id: &DesignId) -> Result<(), StudioError> {
        self.session.open_design(id)?;
        self.navigated();
        Ok(())
    }

    pub fn show_production(&mut self) -> Result<(), StudioError> {
        self.session.show_production()?;
        self.navigated();
        Ok(())
    }

    /// Enters the trends screen and starts its fetch. Re-entry always re-fetches.
    pub fn show_trends(&mut self) -> Result<Ticket, StudioError> {
        let visit = self.session.show_trends();
        self.navigated();
        let started = self.spawn(
            Operation::FetchTrendReport,
            Screen::Trends,
            None,
            move |client| JobResult::Trends {
                visit,
                result: client.fetch_trend_report(),
            },
        );
        match &started {
            Ok(ticket) => {
                if let Some(entry) = self.in_flight.get_mut(&ticket.id) {
                    entry.visit = Some(visit);
                }
            }
            Err(err) => {
                self.session.finish_trends(visit, Err(err.to_string()));
            }
        }
        started
    }

    pub fn add_brand_asset(&mut self, kind: BrandAssetKind, name: &str, value: &str) -> BrandAsset {
        let next_id = self
            .session
            .store()
            .brand_assets()
            .iter()
            .filter_map(|asset| asset.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let asset = BrandAsset::new(next_id.to_string(), name.trim(), value.trim(), kind);
        let mut assets = self.session.store().brand_assets().to_vec();
        assets.push(asset.clone());
        self.set_brand_assets(assets);
        asset
    }

    pub fn remove_brand_asset(&mut self, id: &str) -> bool {
        let assets = self.session.store().brand_assets();
        let kept = assets
            .iter()
            .filter(|asset| asset.id != id)
            .cloned()
            .collect::<Vec<BrandAsset>>();
        if kept.len() == assets.len() {
            return false;
        }
        self.set_brand_assets(kept);
        true
    }

    pub fn set_brand_assets(&mut self, assets: Vec<BrandAsset>) {
        let count = assets.len();
        self.session.set_brand_assets(assets);
        self.emit(SessionEvent::BrandAssetsUpdated { count });
    }

    /// Applies every result that has already arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.receiver.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        applied + self.reap_crashed_workers()
    }

    /// Blocks until nothing is in flight or `timeout` elapses. Returns true when idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.in_flight.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(Duration::from_millis(50));
            if let Ok(outcome) = self.receiver.recv_timeout(slice) {
                self.apply(outcome);
            }
        }
    }

    // Prompt and edit requests are issued from the ideation screen.
    fn enter_ideation(&mut self) {
        if self.session.screen() != Screen::Ideation {
            self.show_ideation();
        }
    }

    fn ensure_idle(&self, screen: Screen) -> Result<(), StudioError> {
        if self.is_busy(screen) {
            return Err(StudioError::Busy(screen));
        }
        Ok(())
    }

    fn navigated(&mut self) {
        self.navigation += 1;
        let screen = self.session.screen();
        debug!(%screen, "view changed");
        self.emit(SessionEvent::ViewChanged { screen });
    }

    fn spawn<F>(
        &mut self,
        operation: Operation,
        screen: Screen,
        target: Option<DesignId>,
        job: F,
    ) -> Result<Ticket, StudioError>
    where
        F: FnOnce(&dyn GenerationClient) -> JobResult + Send + 'static,
    {
        let id = self.next_ticket;
        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        let handle = thread::Builder::new()
            .name(format!("packed-{operation}-{id}"))
            .spawn(move || {
                let result = job(client.as_ref());
                let _ = sender.send(JobOutcome { ticket: id, result });
            })
            .map_err(|err| StudioError::Spawn(err.to_string()))?;
        self.next_ticket += 1;

        let ticket = Ticket {
            id,
            operation,
            screen,
            target,
        };
        self.in_flight.insert(
            id,
            InFlight {
                ticket: ticket.clone(),
                navigation: self.navigation,
                visit: None,
                handle,
            },
        );
        Ok(ticket)
    }

    fn reap_crashed_workers(&mut self) -> usize {
        let finished = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.handle.is_finished())
            .map(|(id, _)| *id)
            .collect::<Vec<u64>>();
        if finished.is_empty() {
            return 0;
        }
        // A finished worker has already sent; pick those results up first.
        let mut applied = 0;
        while let Ok(outcome) = self.receiver.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        for id in finished {
            let Some(entry) = self.in_flight.remove(&id) else {
                continue;
            };
            let _ = entry.handle.join();
            let ticket = entry.ticket;
            let failure = GenerationError::failed(ticket.operation, "worker stopped unexpectedly");
            match entry.visit {
                Some(visit) if !self.session.is_trends_visit_current(visit) => {
                    self.discard_stale(&ticket, "trends screen was left before the report arrived");
                }
                Some(visit) => {
                    self.session.finish_trends(visit, Err(failure.to_string()));
                    self.report_failure(&ticket, failure);
                }
                None => self.report_failure(&ticket, failure),
            }
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, outcome: JobOutcome) {
        let Some(entry) = self.in_flight.remove(&outcome.ticket) else {
            return;
        };
        let _ = entry.handle.join();
        let ticket = entry.ticket;
        let in_place =
            self.session.screen() == ticket.screen && self.navigation == entry.navigation;

        match outcome.result {
            JobResult::Synthesized { prompt, result } => match result {
                Ok(image) => self.commit_new_design(&ticket, in_place, image, prompt),
                Err(err) => self.report_failure(&ticket, err),
            },
            JobResult::Edited {
                instruction,
                result,
            } => match result {
                Ok(image) => self.commit_edit(&ticket, in_place, image, &instruction),
                Err(err) => self.report_failure(&ticket, err),
            },
            JobResult::TechPack { source, result } => match result {
                Ok(tech_pack) => self.commit_tech_pack(&ticket, in_place, &source, tech_pack),
                Err(err) => self.report_failure(&ticket, err),
            },
            JobResult::Trends { visit, result } => self.commit_trends(&ticket, visit, result),
        }
    }

    fn commit_new_design(&mut self, ticket: &Ticket, in_place: bool, image: ImageRef, prompt: String) {
        let design = Design::new(image, prompt);
        let id = design.id().clone();
        if in_place {
            self.session.add_design(design);
        } else {
            self.session.add_design_in_background(design);
            self.notify(
                ticket.screen,
                NoticeKind::Info,
                format!("Design {id} is ready in the workspace."),
            );
        }
        info!(design_id = %id, in_place, "design created");
        self.emit(SessionEvent::DesignCreated {
            design_id: id,
            ticket: ticket.id,
            activated: in_place,
        });
    }

    fn commit_edit(&mut self, ticket: &Ticket, in_place: bool, image: ImageRef, instruction: &str) {
        let Some(current) = self.target_design(ticket) else {
            return;
        };
        let edited = current.with_edit(image, instruction);
        let id = edited.id().clone();
        if let Err(err) = self.commit_update(edited, in_place) {
            warn!(design_id = %id, error = %err, "edit could not be committed");
            return;
        }
        info!(design_id = %id, in_place, "design edited");
        self.emit(SessionEvent::DesignUpdated {
            design_id: id,
            ticket: ticket.id,
            instruction: instruction.to_string(),
            activated: in_place,
        });
    }

    fn commit_tech_pack(&mut self, ticket: &Ticket, in_place: bool, source: &ImageRef, tech_pack: TechPack) {
        let Some(current) = self.target_design(ticket) else {
            return;
        };
        // The pack describes the image it was extracted from.
        if current.image() != source {
            self.discard_stale(ticket, "design image changed while the tech pack was extracted");
            self.notify(
                ticket.screen,
                NoticeKind::Info,
                format!(
                    "Design {} changed while its tech pack was generated; request it again.",
                    current.id()
                ),
            );
            return;
        }
        let bom_rows = tech_pack.bom.len();
        let measurement_rows = tech_pack.measurements.len();
        let updated = current.with_tech_pack(tech_pack);
        let id = updated.id().clone();
        if let Err(err) = self.commit_update(updated, in_place) {
            warn!(design_id = %id, error = %err, "tech pack could not be committed");
            return;
        }
        info!(design_id = %id, bom_rows, measurement_rows, "tech pack attached");
        self.emit(SessionEvent::TechPackAttached {
            design_id: id,
            ticket: ticket.id,
            bom_rows,
            measurement_rows,
        });
    }

    fn commit_update(&mut self, updated: Design, in_place: bool) -> Result<(), SessionError> {
        if in_place {
            self.session.update_design(updated)
        } else {
            self.session.replace_design(updated)
        }
    }

    fn commit_trends(&mut self, ticket: &Ticket, visit: TrendsVisit, result: Result<String, GenerationError>) {
        if !self.session.is_trends_visit_current(visit) {
            self.discard_stale(ticket, "trends screen was left before the report arrived");
            return;
        }
        match result {
            Ok(text) => {
                let report = TrendReport::new(text);
                let chars = report.text.chars().count();
                self.session.finish_trends(visit, Ok(report));
                info!(visit = visit.0, chars, "trend report received");
                self.emit(SessionEvent::TrendReport {
                    ticket: ticket.id,
                    visit: visit.0,
                    chars,
                });
            }
            Err(err) => {
                self.session.finish_trends(visit, Err(err.to_string()));
                self.report_failure(ticket, err);
            }
        }
    }

    fn target_design(&mut self, ticket: &Ticket) -> Option<Design> {
        let found = ticket
            .target
            .as_ref()
            .and_then(|id| self.session.store().design(id))
            .cloned();
        if found.is_none() {
            self.discard_stale(ticket, "target design is no longer in the session");
        }
        found
    }

    fn discard_stale(&mut self, ticket: &Ticket, reason: &str) {
        warn!(ticket = ticket.id, operation = %ticket.operation, reason, "discarding stale result");
        self.emit(SessionEvent::StaleResultDiscarded {
            ticket: ticket.id,
            operation: ticket.operation.as_str().to_string(),
            screen: ticket.screen,
            design_id: ticket.target.clone(),
            reason: reason.to_string(),
        });
    }

    fn report_failure(&mut self, ticket: &Ticket, err: GenerationError) {
        warn!(
            ticket = ticket.id,
            operation = %ticket.operation,
            kind = err.kind(),
            error = %err,
            "generation request failed"
        );
        self.emit(SessionEvent::GenerationFailed {
            ticket: ticket.id,
            operation: ticket.operation.as_str().to_string(),
            screen: ticket.screen,
            design_id: ticket.target.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.notify(ticket.screen, NoticeKind::Error, err.to_string());
    }

    fn notify(&mut self, screen: Screen, kind: NoticeKind, message: String) {
        self.notices.push(Notice {
            screen,
            kind,
            message,
        });
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.record(&event) {
            warn!(event = event.kind(), error = %err, "failed to write session event");
        }
    }
}
