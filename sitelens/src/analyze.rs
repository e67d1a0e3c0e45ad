//! `sitelens analyze`: upload a file and drive the four-stage pipeline.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sitelens_core::format::{format_progress, format_size_mb};
use sitelens_core::pipeline::PipelineEvent;
use sitelens_core::{AnalysisOutcome, CandidateFile, Config, Error, Orchestrator, StageId};
use tokio_util::sync::CancellationToken;

pub fn run(config: &Config, file: &Path) -> Result<()> {
    // Reject unsupported files before touching the network or the database
    let candidate = CandidateFile::from_path(file)?;

    let history = Arc::new(super::open_history()?);
    let orchestrator = Orchestrator::new(super::session_manager(config)?).with_history(history);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling analysis...");
        token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let rt = super::runtime()?;

    println!(
        "Analyzing {} ({})",
        candidate.display_name,
        format_size_mb(candidate.size_bytes())
    );
    rt.block_on(orchestrator.accept(candidate))?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    let stages = StageId::ALL.len();
    let result = rt.block_on(orchestrator.run_with_progress(&cancel, |event| match event {
        PipelineEvent::StageChanged(record) => {
            pb.set_prefix(format!("[{}/{}]", record.id.index() + 1, stages));
            pb.set_message(format!(
                "{} {} ({})",
                record.name,
                record.status,
                format_progress(record.progress)
            ));
            pb.set_position(record.progress.round() as u64);
        }
        PipelineEvent::Log(entry) => pb.println(entry.to_string()),
        PipelineEvent::RunStateChanged(_) => {}
    }));

    pb.finish_and_clear();
    rt.block_on(release_unless_done(&orchestrator, &result));

    match result {
        Ok(outcome) => {
            println!("Analysis complete (session {})", outcome.session.session_id);
            println!("Answered {} clarification questions\n", outcome.qa_pairs.len());
            println!("{}", outcome.report);
            tracing::info!(
                session_id = %outcome.session.session_id,
                questions = outcome.qa_pairs.len(),
                "sitelens analyze complete"
            );
            Ok(())
        }
        Err(Error::Cancelled) => {
            println!("Analysis cancelled.");
            Ok(())
        }
        Err(e) => Err(e).context("analysis failed"),
    }
}

/// Best-effort release of the run's session after a failed or cancelled run
async fn release_unless_done(
    orchestrator: &Orchestrator,
    result: &sitelens_core::Result<AnalysisOutcome>,
) {
    if result.is_ok() {
        return;
    }
    if let Err(e) = orchestrator.clear().await {
        tracing::warn!(error = %e, "Failed to release session after analysis");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sitelens_core::service::{ChatRequest, ChatResponse, MediaService, UploadResponse};
    use sitelens_core::{MediaAsset, MimeCategory, QaPair, RequestPolicy, SessionManager};
    use std::sync::Mutex;

    /// Uploads succeed, every question fails
    #[derive(Default)]
    struct SummaryDown {
        cleanups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaService for SummaryDown {
        async fn upload(&self, _: &MediaAsset) -> sitelens_core::Result<UploadResponse> {
            Ok(UploadResponse {
                session_id: Some("s-1".to_string()),
            })
        }

        async fn chat(&self, _: &ChatRequest) -> sitelens_core::Result<ChatResponse> {
            Err(Error::Transport {
                status: Some(500),
                message: "unavailable".to_string(),
            })
        }

        async fn generate_questions(
            &self,
            _: &str,
            _: MimeCategory,
        ) -> sitelens_core::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn format_results(&self, _: &[QaPair]) -> sitelens_core::Result<String> {
            Ok(String::new())
        }

        async fn cleanup(&self, session_id: &str) -> sitelens_core::Result<()> {
            self.cleanups.lock().unwrap().push(session_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_run_releases_session() {
        let service = Arc::new(SummaryDown::default());
        let sessions = SessionManager::new(service.clone(), RequestPolicy::immediate());
        let orchestrator = Orchestrator::new(Arc::new(sessions));
        orchestrator
            .accept(CandidateFile::new("site.jpg", "image/jpeg", vec![1, 2, 3]))
            .await
            .unwrap();

        let result = orchestrator.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Pipeline { .. })));

        release_unless_done(&orchestrator, &result).await;
        assert_eq!(*service.cleanups.lock().unwrap(), vec!["s-1".to_string()]);
        assert!(orchestrator.current_session().is_none());
    }
}
