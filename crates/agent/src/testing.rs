use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::CompletionService;

/// Replays canned completion replies in order. `None` entries fail the call, and so does
/// running out of replies.
#[derive(Default)]
pub(crate) struct ScriptedCompletion {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub(crate) fn new<'a>(replies: impl IntoIterator<Item = Option<&'a str>>) -> Arc<Self> {
        let replies = replies.into_iter().map(|reply| reply.map(str::to_owned)).collect();
        Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) })
    }

    pub(crate) fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Self::new(replies.into_iter().map(Some))
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().expect("prompt log").push(prompt.to_owned());
        match self.replies.lock().expect("reply queue").pop_front() {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(anyhow!("scripted completion failure")),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}
