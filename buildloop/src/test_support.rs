//! Test-only helpers: scripted gateways, scratch directories, fast loop configs.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use crate::io::config::LoopConfig;
use crate::io::gateway::Gateway;
use crate::stop::StopHandle;

/// Default config with no pause between iterations.
pub fn fast_config() -> LoopConfig {
    LoopConfig {
        pause_secs: 0,
        ..LoopConfig::default()
    }
}

/// Scratch working directory, removed on drop.
pub struct TestDir {
    temp: tempfile::TempDir,
}

impl TestDir {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.path().join(relative);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// File names directly under the directory, sorted.
    pub fn entries(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path()).context("read temp dir")? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// One queued gateway reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text.
    Text(String),
    /// Raise the stop handle, then return this text. Simulates a stop arriving
    /// while the call is in flight.
    TextThenStop(String),
    /// Fail the call with this message.
    Fail(String),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Text(text.into())
    }

    pub fn text_then_stop(text: impl Into<String>) -> Self {
        ScriptedReply::TextThenStop(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedReply::Fail(message.into())
    }
}

/// A gateway call as seen by the scripted gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub max_output_tokens: u32,
}

/// Gateway that returns queued replies in order and records every call.
///
/// Clones share the queue and the call log. Running out of replies is an
/// error, which ends a loop that was expected to stop earlier.
#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    stop: Option<StopHandle>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
            stop: None,
        }
    }

    /// Queue a plan reply followed by each build reply, one pair per iteration.
    pub fn iterations(builds: &[&str]) -> Self {
        let replies = builds
            .iter()
            .enumerate()
            .flat_map(|(idx, build)| {
                [
                    ScriptedReply::text(format!("Plan for iteration {}", idx + 1)),
                    ScriptedReply::text(*build),
                ]
            })
            .collect();
        Self::new(replies)
    }

    pub fn with_stop(mut self, handle: StopHandle) -> Self {
        self.stop = Some(handle);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("replies lock").len()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            prompt: prompt.to_string(),
            max_output_tokens,
        });
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted gateway exhausted"))?;
        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::TextThenStop(text) => {
                if let Some(stop) = &self.stop {
                    stop.stop();
                }
                Ok(text)
            }
            ScriptedReply::Fail(message) => Err(anyhow!(message)),
        }
    }
}
