use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ClassifierError;
use crate::model::Category;
use crate::oracle::Classifier;

/// Classifier that answers every call with the same canned output, or fails when
/// built with `unavailable`.
pub struct ScriptedClassifier {
    reply: Option<String>,
    calls: AtomicUsize,
    last_entry: Mutex<Option<String>>,
}

impl ScriptedClassifier {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            calls: AtomicUsize::new(0),
            last_entry: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_entry: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_entry(&self) -> Option<String> {
        self.last_entry.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        entry_text: &str,
        _categories: &[Category],
    ) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_entry.lock().unwrap() = Some(entry_text.to_string());
        match &self.reply {
            Some(reply) if reply.trim().is_empty() => Err(ClassifierError::EmptyResponse),
            Some(reply) => Ok(reply.clone()),
            None => Err(ClassifierError::Unavailable("scripted outage".to_string())),
        }
    }
}
