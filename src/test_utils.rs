//! Shared test utilities used across multiple test modules.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::provider::{CallError, GenerationBackend, GenerationRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Backend that plays a scripted list of outcomes and records every request
/// it sees. Implemented for `&ScriptedBackend` so tests keep the original
/// around for inspection.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Value, CallError>>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<Value, CallError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of generation calls observed so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// The most recent request, cloned.
    pub fn last_request(&self) -> GenerationRequest {
        self.seen.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for &ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, CallError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CallError::Transport("script exhausted".to_owned())))
    }
}

/// Response document in the provider's candidates/parts shape.
pub fn question_doc(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}
