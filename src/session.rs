//! Correction session state.
//!
//! A [`Session`] owns the parsed subtitle sequence, the flagged errors that are
//! still outstanding, and at most one entry open for editing. The edit target
//! moves `idle -> targeted -> idle` through [`Session::select_target`] /
//! [`Session::select_error`] and then [`Session::save_edit`],
//! [`Session::cancel_edit`] or [`Session::ignore_error`].

use regex::{NoExpand, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyze::AnalyzerFinding;
use crate::error::{Result, SrtfixError};
use crate::subtitle::{normalize_text, parse_srt, to_srt_string, SubtitleEntry};

const DEFAULT_FILE_NAME: &str = "subtitles.srt";

/// An analyzer finding tied to an entry of the current document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialError {
    /// `"{subtitle_id}-{ordinal}"`, unique within one analysis batch
    pub id: String,
    pub subtitle_id: u32,
    pub original_word: String,
    pub context: String,
    pub reason: String,
    pub suggestions: Vec<String>,
}

impl PotentialError {
    fn from_finding(finding: AnalyzerFinding, ordinal: usize) -> Self {
        Self {
            id: format!("{}-{}", finding.subtitle_id, ordinal),
            subtitle_id: finding.subtitle_id,
            original_word: finding.original_word,
            context: finding.context,
            reason: finding.reason,
            suggestions: finding.suggestions,
        }
    }
}

/// The entry currently open for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTarget {
    pub subtitle_id: u32,
    /// Uncommitted text, starts as the entry's committed text
    pub buffer: String,
    /// Set when the edit was opened from a flagged error
    pub error_id: Option<String>,
}

/// Handle for one outstanding analysis request
#[derive(Debug)]
pub struct AnalysisTicket {
    version: u64,
    document: String,
}

impl AnalysisTicket {
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Document text the analyzer should receive
    pub fn document(&self) -> &str {
        &self.document
    }
}

/// Summary of an applied analysis batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisOutcome {
    /// Findings now outstanding
    pub found: usize,
    /// Findings dropped because their subtitle id is not in the document
    pub orphaned: usize,
}

impl AnalysisOutcome {
    /// True when the analyzer flagged nothing usable
    pub fn is_clean(&self) -> bool {
        self.found == 0
    }
}

#[derive(Debug, Default)]
pub struct Session {
    subtitles: Vec<SubtitleEntry>,
    file_name: Option<String>,
    errors: Vec<PotentialError>,
    active: Option<ActiveTarget>,
    analyzing: bool,
    version: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw` and make it the current document.
    ///
    /// On an empty parse the previous state is kept and `SrtfixError::Parse`
    /// is returned.
    pub fn load_document(&mut self, raw: &str, file_name: Option<&str>) -> Result<usize> {
        let entries = parse_srt(raw);
        if entries.is_empty() {
            let source = file_name.unwrap_or("the document");
            warn!("No subtitles could be parsed from {}", source);
            return Err(SrtfixError::Parse(source.to_string()));
        }

        let count = entries.len();
        self.subtitles = entries;
        self.file_name = file_name.map(str::to_string);
        self.errors.clear();
        self.active = None;
        self.version += 1;

        info!(
            "Loaded {} subtitle entries from {} (document version {})",
            count,
            self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME),
            self.version
        );
        Ok(count)
    }

    /// Drop the document, errors and edit target
    pub fn reset(&mut self) {
        self.subtitles.clear();
        self.file_name = None;
        self.errors.clear();
        self.active = None;
        self.version += 1;
        debug!("Session reset (document version {})", self.version);
    }

    pub fn has_document(&self) -> bool {
        !self.subtitles.is_empty()
    }

    pub fn subtitles(&self) -> &[SubtitleEntry] {
        &self.subtitles
    }

    pub fn subtitle(&self, id: u32) -> Option<&SubtitleEntry> {
        self.subtitles.iter().find(|entry| entry.id == id)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn document_version(&self) -> u64 {
        self.version
    }

    /// Outstanding errors in analyzer order
    pub fn errors(&self) -> &[PotentialError] {
        &self.errors
    }

    pub fn error(&self, error_id: &str) -> Option<&PotentialError> {
        self.errors.iter().find(|error| error.id == error_id)
    }

    /// First outstanding error for an entry
    pub fn error_for(&self, subtitle_id: u32) -> Option<&PotentialError> {
        self.errors.iter().find(|error| error.subtitle_id == subtitle_id)
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    /// Mark an analysis as outstanding and snapshot the document for it.
    ///
    /// Only one analysis may be outstanding per session.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket> {
        if !self.has_document() {
            return Err(SrtfixError::NoDocument);
        }
        if self.analyzing {
            return Err(SrtfixError::AnalysisInProgress);
        }

        self.analyzing = true;
        debug!("Analysis started for document version {}", self.version);
        Ok(AnalysisTicket {
            version: self.version,
            document: self.export(),
        })
    }

    /// Clear the analyzing marker, whatever the outcome of the request
    pub fn finish_analysis(&mut self, ticket: &AnalysisTicket) {
        self.analyzing = false;
        debug!("Analysis finished for document version {}", ticket.version);
    }

    /// Replace the outstanding errors with a new batch.
    ///
    /// A batch issued for an older document version is rejected untouched.
    /// Findings pointing at ids missing from the document are dropped.
    pub fn apply_analysis_results(
        &mut self,
        ticket: &AnalysisTicket,
        findings: Vec<AnalyzerFinding>,
    ) -> Result<AnalysisOutcome> {
        if ticket.version != self.version {
            warn!(
                "Discarding analysis for document version {} (current {})",
                ticket.version, self.version
            );
            return Err(SrtfixError::StaleAnalysis {
                received: ticket.version,
                current: self.version,
            });
        }

        let mut outcome = AnalysisOutcome::default();
        let mut errors = Vec::with_capacity(findings.len());
        for (ordinal, finding) in findings.into_iter().enumerate() {
            if self.subtitle(finding.subtitle_id).is_none() {
                warn!(
                    "Dropping finding '{}' for unknown subtitle {}",
                    finding.original_word, finding.subtitle_id
                );
                outcome.orphaned += 1;
                continue;
            }
            errors.push(PotentialError::from_finding(finding, ordinal));
        }
        outcome.found = errors.len();
        self.errors = errors;

        // the old error reference is meaningless against the new batch
        if let Some(active) = self.active.as_mut() {
            active.error_id = self
                .errors
                .iter()
                .find(|error| error.subtitle_id == active.subtitle_id)
                .map(|error| error.id.clone());
        }

        info!(
            "Analysis applied: {} potential errors, {} orphaned",
            outcome.found, outcome.orphaned
        );
        Ok(outcome)
    }

    pub fn active(&self) -> Option<&ActiveTarget> {
        self.active.as_ref()
    }

    /// The error the active edit was opened from
    pub fn selected_error(&self) -> Option<&PotentialError> {
        let error_id = self.active.as_ref()?.error_id.as_deref()?;
        self.error(error_id)
    }

    /// Open an entry for editing.
    ///
    /// If an outstanding error references the entry it becomes the selected
    /// error. Selecting the entry already open is a no-op; selecting another
    /// one discards the previous buffer.
    pub fn select_target(&mut self, subtitle_id: u32) -> Result<()> {
        if self.active.as_ref().is_some_and(|a| a.subtitle_id == subtitle_id) {
            return Ok(());
        }

        let error_id = self.error_for(subtitle_id).map(|error| error.id.clone());
        self.open_target(subtitle_id, error_id)
    }

    /// Open the entry a specific outstanding error points at
    pub fn select_error(&mut self, error_id: &str) -> Result<()> {
        let error = self
            .error(error_id)
            .ok_or_else(|| SrtfixError::UnknownError(error_id.to_string()))?;
        let subtitle_id = error.subtitle_id;
        let error_id = error.id.clone();

        if let Some(active) = self.active.as_mut() {
            if active.subtitle_id == subtitle_id {
                active.error_id = Some(error_id);
                return Ok(());
            }
        }

        self.open_target(subtitle_id, Some(error_id))
    }

    fn open_target(&mut self, subtitle_id: u32, error_id: Option<String>) -> Result<()> {
        let entry = self
            .subtitle(subtitle_id)
            .ok_or(SrtfixError::UnknownSubtitle(subtitle_id))?;
        let buffer = entry.text.clone();

        if let Some(previous) = self.active.take() {
            debug!("Discarding uncommitted edit of subtitle {}", previous.subtitle_id);
        }

        self.active = Some(ActiveTarget {
            subtitle_id,
            buffer,
            error_id,
        });
        Ok(())
    }

    /// Overwrite the edit buffer. Returns false when nothing is open.
    pub fn update_edit_buffer(&mut self, text: &str) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.buffer = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Commit the buffer into its entry and resolve the selected error.
    ///
    /// Blank lines are stripped from the buffer before it is written. A buffer
    /// with no text left is not committed and the entry stays open. Returns the
    /// id of the entry written, or `None` when nothing was committed.
    pub fn save_edit(&mut self) -> Option<u32> {
        let text = normalize_text(&self.active.as_ref()?.buffer);
        if text.is_empty() {
            warn!("Refusing to save empty text into subtitle {}", self.active.as_ref()?.subtitle_id);
            return None;
        }
        let active = self.active.take()?;

        match self.subtitles.iter_mut().find(|entry| entry.id == active.subtitle_id) {
            Some(entry) => entry.text = text,
            None => warn!("Subtitle {} vanished before its edit was saved", active.subtitle_id),
        }

        if let Some(error_id) = active.error_id {
            self.errors.retain(|error| error.id != error_id);
        }

        debug!("Saved edit of subtitle {}", active.subtitle_id);
        Some(active.subtitle_id)
    }

    /// Close the edit without touching the document
    pub fn cancel_edit(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Cancelled edit of subtitle {}", active.subtitle_id);
        }
    }

    /// Dismiss the selected error, leaving the text as it is.
    ///
    /// Returns false when no error is selected.
    pub fn ignore_error(&mut self) -> bool {
        let Some(error_id) = self.active.as_ref().and_then(|a| a.error_id.clone()) else {
            return false;
        };

        self.errors.retain(|error| error.id != error_id);
        self.active = None;
        debug!("Ignored error {}", error_id);
        true
    }

    /// Replace the first case-insensitive occurrence of the selected error's
    /// word in the edit buffer.
    ///
    /// Returns false when no error is selected or the word is no longer in
    /// the buffer.
    pub fn apply_suggestion(&mut self, suggestion: &str) -> bool {
        let Some(word) = self.selected_error().map(|error| error.original_word.clone()) else {
            return false;
        };
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        match replace_first_case_insensitive(&active.buffer, &word, suggestion) {
            Some(updated) => {
                active.buffer = updated;
                true
            }
            None => false,
        }
    }

    /// Current document as SRT text
    pub fn export(&self) -> String {
        to_srt_string(&self.subtitles)
    }

    /// Name offered for the corrected file, `{prefix}{source name}`
    pub fn export_file_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME))
    }
}

fn replace_first_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> Option<String> {
    if needle.is_empty() {
        return None;
    }

    let pattern = RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()?;

    if !pattern.is_match(haystack) {
        return None;
    }
    Some(pattern.replacen(haystack, 1, NoExpand(replacement)).into_owned())
}
