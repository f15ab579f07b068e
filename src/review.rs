use tracing::{info, warn};

use crate::analyze::{Analyzer, AnalyzerFinding};
use crate::credentials::CredentialStore;
use crate::error::{Result, SrtfixError};
use crate::session::{AnalysisOutcome, AnalysisTicket, Session};

/// An analysis that has been started on a session but not yet completed
#[derive(Debug)]
pub struct PendingAnalysis {
    ticket: AnalysisTicket,
    credential: Option<String>,
}

impl PendingAnalysis {
    pub fn ticket(&self) -> &AnalysisTicket {
        &self.ticket
    }
}

/// Drives one analysis pass: credential check, analyzer call, result merge.
///
/// The three steps are exposed separately so a caller can release the
/// session while the request is in flight; [`ReviewEngine::run_analysis`]
/// chains them for the common case.
pub struct ReviewEngine {
    analyzer: Box<dyn Analyzer>,
}

impl ReviewEngine {
    pub fn new(analyzer: Box<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Check preconditions and mark the session as analyzing
    pub fn start(&self, session: &mut Session, credentials: &dyn CredentialStore) -> Result<PendingAnalysis> {
        if !session.has_document() {
            return Err(SrtfixError::NoDocument);
        }

        let credential = if self.analyzer.requires_credential() {
            if !credentials.has() {
                return Err(SrtfixError::MissingCredential);
            }
            credentials.get()?
        } else {
            None
        };

        let ticket = session.begin_analysis()?;
        info!(
            "Starting {} analysis of {} subtitle entries",
            self.analyzer.name(),
            session.subtitles().len()
        );
        Ok(PendingAnalysis { ticket, credential })
    }

    /// Call the analyzer for a started analysis
    pub async fn fetch(&self, pending: &PendingAnalysis) -> Result<Vec<AnalyzerFinding>> {
        self.analyzer
            .find_errors(pending.ticket.document(), pending.credential.clone())
            .await
    }

    /// Clear the analyzing marker and merge a successful result.
    ///
    /// A failed fetch leaves subtitles and previously outstanding errors as
    /// they were and is returned unchanged.
    pub fn complete(
        &self,
        session: &mut Session,
        pending: PendingAnalysis,
        result: Result<Vec<AnalyzerFinding>>,
    ) -> Result<AnalysisOutcome> {
        session.finish_analysis(&pending.ticket);

        let findings = result.inspect_err(|e| warn!("{} analysis failed: {}", self.analyzer.name(), e))?;
        let outcome = session.apply_analysis_results(&pending.ticket, findings)?;

        if outcome.is_clean() {
            info!("No issues found");
        }
        Ok(outcome)
    }

    /// Run a whole analysis pass against `session`
    pub async fn run_analysis(
        &self,
        session: &mut Session,
        credentials: &dyn CredentialStore,
    ) -> Result<AnalysisOutcome> {
        let pending = self.start(session, credentials)?;
        let result = self.fetch(&pending).await;
        self.complete(session, pending, result)
    }
}
