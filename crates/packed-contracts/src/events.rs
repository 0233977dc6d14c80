use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::design::DesignId;
use crate::session::Screen;

/// Everything the studio records about a session, one variant per line type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        client: String,
        brand_assets: usize,
        screen: Screen,
    },
    ViewChanged {
        screen: Screen,
    },
    DesignCreated {
        design_id: DesignId,
        ticket: u64,
        activated: bool,
    },
    DesignUpdated {
        design_id: DesignId,
        ticket: u64,
        instruction: String,
        activated: bool,
    },
    TechPackAttached {
        design_id: DesignId,
        ticket: u64,
        bom_rows: usize,
        measurement_rows: usize,
    },
    TrendReport {
        ticket: u64,
        visit: u64,
        chars: usize,
    },
    GenerationFailed {
        ticket: u64,
        operation: String,
        screen: Screen,
        design_id: Option<DesignId>,
        kind: String,
        message: String,
    },
    StaleResultDiscarded {
        ticket: u64,
        operation: String,
        screen: Screen,
        design_id: Option<DesignId>,
        reason: String,
    },
    BrandAssetsUpdated {
        count: usize,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ViewChanged { .. } => "view_changed",
            Self::DesignCreated { .. } => "design_created",
            Self::DesignUpdated { .. } => "design_updated",
            Self::TechPackAttached { .. } => "tech_pack_attached",
            Self::TrendReport { .. } => "trend_report",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::StaleResultDiscarded { .. } => "stale_result_discarded",
            Self::BrandAssetsUpdated { .. } => "brand_assets_updated",
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    session_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a SessionEvent,
}

/// Session audit log: one compact JSON object per line, tagged with the
/// session id and a UTC timestamp.
///
/// The file is opened once and each line is flushed as it is written.
#[derive(Debug)]
pub struct EventWriter {
    session_id: String,
    file: Mutex<BufWriter<File>>,
}

impl EventWriter {
    pub fn open(path: &Path, session_id: impl Into<String>) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            session_id: session_id.into(),
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Appends `event` and returns the line as written.
    pub fn record(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let line = EventLine {
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            event,
        };
        let value = serde_json::to_value(&line)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        serde_json::to_writer(&mut *file, &value)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(value)
    }
}
