//! Scripted in-process analysis service shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sitelens_core::service::{ChatRequest, ChatResponse, MediaService, UploadResponse};
use sitelens_core::{
    CandidateFile, Error, MediaAsset, MimeCategory, QaPair, RequestPolicy, Result, SessionManager,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn transport_error(status: u16) -> Error {
    Error::Transport {
        status: Some(status),
        message: format!("API error ({})", status),
    }
}

/// Which endpoints fail and what the happy paths return
#[derive(Default)]
pub struct Script {
    pub session_id: Option<String>,
    pub summary: String,
    pub questions: Vec<String>,
    pub report: String,
    pub fail_upload: bool,
    pub fail_summary: bool,
    pub fail_questions: bool,
    pub fail_format: bool,
    pub fail_cleanup: bool,
    /// Question indices whose answer request fails
    pub failing_answers: HashSet<usize>,
    /// Question indices answered with empty content
    pub empty_answers: HashSet<usize>,
    /// Cancel this token while answering the given question index
    pub cancel_at: Option<(usize, CancellationToken)>,
    /// Uploads wait on this before responding
    pub upload_gate: Option<Arc<Notify>>,
    /// Chat requests wait on this before responding
    pub chat_gate: Option<Arc<Notify>>,
}

impl Script {
    pub fn happy(questions: &[&str]) -> Self {
        Self {
            session_id: Some("session-1".to_string()),
            summary: "A bathroom with a tiled floor and one window.".to_string(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
            report: "Floor: 4.2 m2".to_string(),
            ..Default::default()
        }
    }
}

pub struct ScriptedService {
    script: Script,
    pub uploads: Mutex<usize>,
    pub queries: Mutex<Vec<ChatRequest>>,
    pub questions_requests: Mutex<Vec<(String, MimeCategory)>>,
    pub format_requests: Mutex<Vec<Vec<QaPair>>>,
    pub cleanups: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            uploads: Mutex::new(0),
            queries: Mutex::new(Vec::new()),
            questions_requests: Mutex::new(Vec::new()),
            format_requests: Mutex::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
        })
    }

    pub fn cleanups(&self) -> Vec<String> {
        self.cleanups.lock().unwrap().clone()
    }

    pub fn format_requests(&self) -> Vec<Vec<QaPair>> {
        self.format_requests.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaService for ScriptedService {
    async fn upload(&self, _asset: &MediaAsset) -> Result<UploadResponse> {
        if let Some(gate) = &self.script.upload_gate {
            gate.notified().await;
        }
        let n = {
            let mut uploads = self.uploads.lock().unwrap();
            *uploads += 1;
            *uploads
        };
        if self.script.fail_upload {
            return Err(transport_error(502));
        }
        Ok(UploadResponse {
            session_id: self
                .script
                .session_id
                .as_ref()
                .map(|id| if n == 1 { id.clone() } else { format!("{}-{}", id, n) }),
        })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.queries.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.script.chat_gate {
            gate.notified().await;
        }

        let Some(index) = self.script.questions.iter().position(|q| *q == request.query) else {
            if self.script.fail_summary {
                return Err(transport_error(500));
            }
            return Ok(ChatResponse::with_content(self.script.summary.clone()));
        };

        if let Some((at, token)) = &self.script.cancel_at {
            if *at == index {
                token.cancel();
            }
        }
        if self.script.failing_answers.contains(&index) {
            return Err(transport_error(400));
        }
        if self.script.empty_answers.contains(&index) {
            return Ok(ChatResponse::default());
        }
        Ok(ChatResponse::with_content(format!("answer {}", index + 1)))
    }

    async fn generate_questions(&self, summary: &str, media_type: MimeCategory) -> Result<Vec<String>> {
        self.questions_requests
            .lock()
            .unwrap()
            .push((summary.to_string(), media_type));
        if self.script.fail_questions {
            return Err(transport_error(500));
        }
        Ok(self.script.questions.clone())
    }

    async fn format_results(&self, qa_data: &[QaPair]) -> Result<String> {
        self.format_requests.lock().unwrap().push(qa_data.to_vec());
        if self.script.fail_format {
            return Err(transport_error(503));
        }
        Ok(self.script.report.clone())
    }

    async fn cleanup(&self, session_id: &str) -> Result<()> {
        self.cleanups.lock().unwrap().push(session_id.to_string());
        if self.script.fail_cleanup {
            return Err(Error::Transport {
                status: None,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

pub fn sessions(service: Arc<ScriptedService>) -> Arc<SessionManager> {
    sitelens_core::logging::init_test();
    Arc::new(SessionManager::new(service, RequestPolicy::immediate()))
}

pub fn video(name: &str) -> CandidateFile {
    CandidateFile::new(name, "video/mp4", vec![0u8; 1024])
}

pub fn image(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/png", vec![0x89, 0x50, 0x4E, 0x47])
}
