//! Stage pipeline orchestrator
//!
//! Drives one asset through four dependent stages:
//!
//! ```text
//! summarize ──► questions ──► answers (sequential Q&A) ──► formatting
//! ```
//!
//! The orchestrator owns the stage board, run state, processing log and
//! final report. Front ends observe them through [`Orchestrator::snapshot`]
//! or the [`PipelineEvent`] callback of [`Orchestrator::run_with_progress`];
//! nothing else mutates them.
//!
//! ## Failure policy
//!
//! - Summarize, questions and formatting are hard prerequisites. A failure
//!   marks the active stage `error` at 0%, sets the run `failed` and returns
//!   [`Error::Pipeline`].
//! - A failed Q&A turn is replaced by [`PLACEHOLDER_ANSWER`] and the loop
//!   continues.
//! - Cancellation returns the interrupted stage to `pending` and leaves
//!   completed stages untouched.

mod stages;

pub use stages::StageBoard;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::preview;
use crate::session::SessionManager;
use crate::types::{
    AnalysisRecord, AnalysisSession, LogEntry, MediaAsset, PreviewHandle, QaPair, RunState,
    StageId, StageRecord, StageStatus,
};
use crate::upload::{self, CandidateFile};

/// Substituted for a Q&A turn whose request failed
pub const PLACEHOLDER_ANSWER: &str = "Error processing this question";

/// Substituted for a Q&A turn that returned no content
pub const EMPTY_ANSWER: &str = "No answer available";

/// Substituted for a question with no recorded answer when formatting
pub const MISSING_ANSWER: &str = "No answer";

/// Report text used when the formatter returns nothing
pub const NO_MEASUREMENTS: &str = "No measurements could be determined";

/// Characters of each question echoed into the processing log
const QUESTION_PREVIEW_CHARS: usize = 50;

const SUMMARY_PROMPT: &str = "You are an expert visual analyst. Observe the provided video or image \
closely and write an exhaustive summary of its content. Cover:

- Every object, person and key element visible (doors, windows, walls, furniture, decorations, \
colors, textures, lighting).
- Actions, movements and interactions between objects or people, if any.
- The setting, environment and atmosphere (indoor or outdoor, weather, time of day, mood).
- Any text, symbols, logos or signage and what they may signify.
- The context or purpose suggested by visual clues (home, office, store, event).
- The emotional tone, if it can be read from expressions, actions or atmosphere.

Write roughly 50 concise, detailed lines and leave out no significant element.";

/// Observable change emitted while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageChanged(StageRecord),
    Log(LogEntry),
    RunStateChanged(RunState),
}

/// Artifacts of a successful run
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub session: AnalysisSession,
    pub summary: String,
    pub qa_pairs: Vec<QaPair>,
    pub report: String,
}

/// Point-in-time copy of the orchestrator's observable state
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub asset: Option<MediaAsset>,
    pub preview: Option<PreviewHandle>,
    pub session: Option<AnalysisSession>,
    pub stages: Vec<StageRecord>,
    pub run_state: RunState,
    pub logs: Vec<LogEntry>,
    pub report: Option<String>,
}

struct PipelineState {
    asset: Option<MediaAsset>,
    preview: Option<PreviewHandle>,
    session: Option<AnalysisSession>,
    board: StageBoard,
    run_state: RunState,
    logs: Vec<LogEntry>,
    report: Option<String>,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            asset: None,
            preview: None,
            session: None,
            board: StageBoard::new(),
            run_state: RunState::Idle,
            logs: Vec::new(),
            report: None,
        }
    }

    fn reset_run(&mut self) {
        self.board.reset();
        self.logs.clear();
        self.report = None;
        self.run_state = RunState::Idle;
    }
}

/// Releases the busy flag when dropped
pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives uploads and analysis runs for a single asset slot
pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    history: Option<Arc<Database>>,
    state: Mutex<PipelineState>,
    busy: AtomicBool,
}

impl Orchestrator {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            history: None,
            state: Mutex::new(PipelineState::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Append successful runs to this history store
    pub fn with_history(mut self, db: Arc<Database>) -> Self {
        self.history = Some(db);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    pub fn current_session(&self) -> Option<AnalysisSession> {
        self.lock().session.clone()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let state = self.lock();
        PipelineSnapshot {
            asset: state.asset.clone(),
            preview: state.preview,
            session: state.session.clone(),
            stages: state.board.records().to_vec(),
            run_state: state.run_state,
            logs: state.logs.clone(),
            report: state.report.clone(),
        }
    }

    /// Validate a candidate and make it the current asset.
    ///
    /// A rejected candidate leaves every piece of state untouched. An
    /// accepted one releases the previous session (best effort) and resets
    /// stages, logs and report.
    pub async fn accept(&self, candidate: CandidateFile) -> Result<PreviewHandle> {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(Error::RunInProgress)?;
        let asset = upload::validate(candidate)?;

        let previous = self.lock().session.take();
        if let Some(previous) = previous {
            self.sessions
                .release(&previous.session_id)
                .await
                .log(&previous.session_id);
        }

        let handle = PreviewHandle::new();
        tracing::info!(
            file = %asset.display_name,
            mime_type = %asset.mime_type,
            size_bytes = asset.size_bytes,
            "Media accepted"
        );

        let mut state = self.lock();
        state.reset_run();
        state.asset = Some(asset);
        state.preview = Some(handle);
        Ok(handle)
    }

    /// Release the session and discard the asset and all run state
    pub async fn clear(&self) -> Result<()> {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(Error::RunInProgress)?;

        let previous = self.lock().session.take();
        if let Some(previous) = previous {
            self.sessions
                .release(&previous.session_id)
                .await
                .log(&previous.session_id);
        }

        *self.lock() = PipelineState::new();
        Ok(())
    }

    /// Run the pipeline over the current asset
    pub async fn run(&self, cancel: &CancellationToken) -> Result<AnalysisOutcome> {
        self.run_with_progress(cancel, |_| {}).await
    }

    /// Run the pipeline, reporting every observable change to `on_event`.
    ///
    /// Refused with [`Error::RunInProgress`] while another run, upload or
    /// clear is in flight.
    pub async fn run_with_progress<F>(
        &self,
        cancel: &CancellationToken,
        on_event: F,
    ) -> Result<AnalysisOutcome>
    where
        F: FnMut(&PipelineEvent) + Send,
    {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(Error::RunInProgress)?;

        let (asset, previous) = {
            let mut state = self.lock();
            let asset = state
                .asset
                .clone()
                .ok_or_else(|| Error::Validation("No media selected".to_string()))?;
            state.reset_run();
            state.run_state = RunState::Running;
            (asset, state.session.take())
        };

        let mut run = RunContext {
            orchestrator: self,
            on_event,
            current: StageId::Summarize,
        };
        run.emit(PipelineEvent::RunStateChanged(RunState::Running));

        if let Some(previous) = previous {
            self.sessions
                .release(&previous.session_id)
                .await
                .log(&previous.session_id);
        }

        match run.drive(&asset, cancel).await {
            Ok(outcome) => {
                run.log("Analysis completed successfully!");
                self.lock().report = Some(outcome.report.clone());
                run.finish(RunState::Done);
                self.record_history(&asset, &outcome);
                Ok(outcome)
            }
            Err(Error::Cancelled) => {
                let stage = run.current;
                if self.lock().board.get(stage).status == StageStatus::Processing {
                    run.try_stage(stage, StageStatus::Pending, 0.0);
                }
                run.log("Analysis cancelled");
                run.finish(RunState::Cancelled);
                Err(Error::Cancelled)
            }
            Err(e) => {
                let stage = run.current;
                run.log(format!("Error: {}", e));
                run.try_stage(stage, StageStatus::Error, 0.0);
                run.finish(RunState::Failed);
                Err(Error::Pipeline {
                    stage,
                    source: Box::new(e),
                })
            }
        }
    }

    fn record_history(&self, asset: &MediaAsset, outcome: &AnalysisOutcome) {
        let Some(db) = &self.history else {
            return;
        };

        let record = AnalysisRecord {
            id: None,
            file_name: asset.display_name.clone(),
            result: outcome.report.clone(),
            timestamp: Utc::now(),
            session_id: outcome.session.session_id.clone(),
        };
        if let Err(e) = db.append_analysis(&record) {
            tracing::warn!(error = %e, "Failed to append analysis to history");
        }
    }
}

/// Per-run handle that mutates orchestrator state and forwards events
struct RunContext<'a, F> {
    orchestrator: &'a Orchestrator,
    on_event: F,
    current: StageId,
}

impl<F> RunContext<'_, F>
where
    F: FnMut(&PipelineEvent) + Send,
{
    fn emit(&mut self, event: PipelineEvent) {
        (self.on_event)(&event);
    }

    fn log(&mut self, message: impl Into<String>) {
        let entry = LogEntry::now(message);
        tracing::info!(target: "sitelens::pipeline", "{}", entry.message);
        self.orchestrator.lock().logs.push(entry.clone());
        self.emit(PipelineEvent::Log(entry));
    }

    fn stage(&mut self, id: StageId, status: StageStatus, progress: f32) -> Result<()> {
        if status == StageStatus::Processing {
            self.current = id;
        }
        let record = self
            .orchestrator
            .lock()
            .board
            .set(id, status, progress)?
            .clone();
        self.emit(PipelineEvent::StageChanged(record));
        Ok(())
    }

    /// Stage change on the failure path, where a rejected transition is
    /// only worth a warning
    fn try_stage(&mut self, id: StageId, status: StageStatus, progress: f32) {
        if let Err(e) = self.stage(id, status, progress) {
            tracing::warn!(error = %e, "Stage not updated");
        }
    }

    fn finish(&mut self, run_state: RunState) {
        self.orchestrator.lock().run_state = run_state;
        self.emit(PipelineEvent::RunStateChanged(run_state));
    }

    async fn drive(
        &mut self,
        asset: &MediaAsset,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let (session, summary) = self.summarize(asset, cancel).await?;
        let questions = self.generate_questions(asset, &summary, cancel).await?;
        let answers = self
            .answer_questions(&session.session_id, &questions, cancel)
            .await?;
        let qa_pairs = pair_answers(&questions, &answers);
        let report = self.format_report(&qa_pairs, cancel).await?;

        Ok(AnalysisOutcome {
            session,
            summary,
            qa_pairs,
            report,
        })
    }

    async fn summarize(
        &mut self,
        asset: &MediaAsset,
        cancel: &CancellationToken,
    ) -> Result<(AnalysisSession, String)> {
        check(cancel)?;
        self.stage(StageId::Summarize, StageStatus::Processing, 25.0)?;
        self.log("Uploading file to analysis service...");

        let sessions = Arc::clone(&self.orchestrator.sessions);
        let session = cancellable(cancel, sessions.create(asset)).await?;
        self.orchestrator.lock().session = Some(session.clone());

        self.stage(StageId::Summarize, StageStatus::Processing, 50.0)?;
        self.log("File uploaded successfully, generating summary...");

        let summary = cancellable(cancel, sessions.ask(&session.session_id, SUMMARY_PROMPT)).await?;
        if summary.trim().is_empty() {
            tracing::warn!(session_id = %session.session_id, "Summary response was empty");
        }

        self.stage(StageId::Summarize, StageStatus::Completed, 100.0)?;
        self.log("Summary generated successfully");
        Ok((session, summary))
    }

    async fn generate_questions(
        &mut self,
        asset: &MediaAsset,
        summary: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        check(cancel)?;
        self.stage(StageId::Questions, StageStatus::Processing, 50.0)?;
        self.log("Generating detailed analysis questions...");

        let service = Arc::clone(self.orchestrator.sessions.service());
        let questions =
            cancellable(cancel, service.generate_questions(summary, asset.category)).await?;

        self.stage(StageId::Questions, StageStatus::Completed, 100.0)?;
        self.log(format!("Generated {} analysis questions", questions.len()));
        Ok(questions)
    }

    async fn answer_questions(
        &mut self,
        session_id: &str,
        questions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        check(cancel)?;
        self.current = StageId::Answers;
        self.log("Starting detailed measurement analysis...");

        let sessions = Arc::clone(&self.orchestrator.sessions);
        let delay = sessions.policy().question_delay;
        let total = questions.len();
        let mut answers = Vec::with_capacity(total);

        if total == 0 {
            self.stage(StageId::Answers, StageStatus::Processing, 0.0)?;
        }

        for (i, question) in questions.iter().enumerate() {
            check(cancel)?;
            let progress = (i + 1) as f32 / total as f32 * 100.0;
            self.stage(StageId::Answers, StageStatus::Processing, progress)?;
            self.log(format!(
                "Analyzing question {}/{}: {}",
                i + 1,
                total,
                preview(question, QUESTION_PREVIEW_CHARS)
            ));

            let answer = match cancellable(cancel, sessions.ask(session_id, question)).await {
                Ok(content) if content.trim().is_empty() => EMPTY_ANSWER.to_string(),
                Ok(content) => content,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    let partial = Error::PartialAnswer {
                        index: i,
                        message: e.to_string(),
                    };
                    tracing::warn!(session_id = %session_id, "{}", partial);
                    PLACEHOLDER_ANSWER.to_string()
                }
            };
            answers.push(answer);

            if i + 1 < total && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.stage(StageId::Answers, StageStatus::Completed, 100.0)?;
        self.log("Detailed analysis completed");
        Ok(answers)
    }

    async fn format_report(
        &mut self,
        qa_pairs: &[QaPair],
        cancel: &CancellationToken,
    ) -> Result<String> {
        check(cancel)?;
        self.stage(StageId::Formatting, StageStatus::Processing, 50.0)?;
        self.log("Formatting final measurements...");

        let service = Arc::clone(self.orchestrator.sessions.service());
        let result = cancellable(cancel, service.format_results(qa_pairs)).await?;
        let report = if result.trim().is_empty() {
            NO_MEASUREMENTS.to_string()
        } else {
            result
        };

        self.stage(StageId::Formatting, StageStatus::Completed, 100.0)?;
        self.log("Final formatting completed");
        Ok(report)
    }
}

/// Zip questions with answers in order, filling gaps with [`MISSING_ANSWER`]
pub fn pair_answers(questions: &[String], answers: &[String]) -> Vec<QaPair> {
    questions
        .iter()
        .enumerate()
        .map(|(i, question)| QaPair {
            question: question.clone(),
            answer: answers
                .get(i)
                .filter(|a| !a.is_empty())
                .cloned()
                .unwrap_or_else(|| MISSING_ANSWER.to_string()),
        })
        .collect()
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
