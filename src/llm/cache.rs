use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CompletionClient;
use crate::error::CompletionError;

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    backend: String,
    prompt: String,
    response: String,
}

/// Memoizes a [`CompletionClient`] on the exact prompt string.
///
/// Only successful completions are stored. With a directory configured, entries are also
/// kept as `<sha256(prompt)>.json` files and survive across invocations.
pub struct CachedCompletion<C> {
    inner: C,
    entries: HashMap<String, String>,
    dir: Option<PathBuf>,
    hits: usize,
    misses: usize,
}

impl<C: CompletionClient> CachedCompletion<C> {
    pub fn in_memory(inner: C) -> Self {
        Self {
            inner,
            entries: HashMap::new(),
            dir: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_dir(inner: C, dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create cache dir: {}", dir.display()))?;
        Ok(Self {
            dir: Some(dir),
            ..Self::in_memory(inner)
        })
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn lookup(&mut self, prompt: &str) -> Option<String> {
        if let Some(hit) = self.entries.get(prompt) {
            return Some(hit.clone());
        }
        let path = self.dir.as_deref().map(|d| record_path(d, prompt))?;
        if !path.exists() {
            return None;
        }
        match read_record(&path) {
            Ok(rec) if rec.prompt == prompt => {
                self.entries.insert(prompt.to_string(), rec.response.clone());
                Some(rec.response)
            }
            Ok(_) => {
                warn!("cache record {} belongs to a different prompt", path.display());
                None
            }
            Err(err) => {
                warn!("ignoring unreadable cache record: {err:#}");
                None
            }
        }
    }

    fn store(&mut self, prompt: &str, response: &str) {
        self.entries
            .insert(prompt.to_string(), response.to_string());
        let Some(dir) = self.dir.as_deref() else {
            return;
        };
        let path = record_path(dir, prompt);
        let rec = CacheRecord {
            backend: self.inner.name().to_string(),
            prompt: prompt.to_string(),
            response: response.to_string(),
        };
        if let Err(err) = write_record(&path, &rec) {
            warn!("failed to persist cache record: {err:#}");
        }
    }
}

impl<C: CompletionClient> CompletionClient for CachedCompletion<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn complete(&mut self, prompt: &str) -> Result<String, CompletionError> {
        if let Some(hit) = self.lookup(prompt) {
            self.hits += 1;
            debug!("{}: cache hit ({} prompt chars)", self.inner.name(), prompt.len());
            return Ok(hit);
        }
        self.misses += 1;
        let response = self.inner.complete(prompt)?;
        self.store(prompt, &response);
        Ok(response)
    }
}

pub fn prompt_key(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

fn record_path(dir: &Path, prompt: &str) -> PathBuf {
    dir.join(format!("{}.json", prompt_key(prompt)))
}

fn read_record(path: &Path) -> anyhow::Result<CacheRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read cache record: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse cache record: {}", path.display()))
}

fn write_record(path: &Path, rec: &CacheRecord) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(rec).context("encode cache record")?;
    std::fs::write(path, text).with_context(|| format!("write cache record: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{prompt_key, CachedCompletion};
    use crate::llm::{CompletionClient, MockCompletion};

    #[test]
    fn repeated_prompt_hits_memory() {
        let mock = MockCompletion::new("mock").with_default_response("A");
        let mut cached = CachedCompletion::in_memory(mock);
        assert_eq!(cached.complete("p").expect("first"), "A");
        assert_eq!(cached.complete("p").expect("second"), "A");
        assert_eq!(cached.complete("q").expect("other"), "A");
        assert_eq!((cached.hits(), cached.misses()), (1, 2));
        assert_eq!(cached.inner().prompts(), vec!["p", "q"]);
    }

    #[test]
    fn key_is_exact_prompt() {
        let mock = MockCompletion::new("mock").with_default_response("A");
        let mut cached = CachedCompletion::in_memory(mock);
        cached.complete("p").expect("first");
        cached.complete("p ").expect("whitespace differs");
        assert_eq!(cached.misses(), 2);
        assert_ne!(prompt_key("p"), prompt_key("p "));
    }

    #[test]
    fn failures_are_not_cached() {
        let mock = MockCompletion::new("mock")
            .with_default_response("ok")
            .failing_on_call(1);
        let mut cached = CachedCompletion::in_memory(mock);
        assert!(cached.complete("p").is_err());
        assert_eq!(cached.complete("p").expect("retry by caller"), "ok");
        assert_eq!(cached.hits(), 0);
    }

    #[test]
    fn disk_records_survive_new_instance() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut first = CachedCompletion::with_dir(
            MockCompletion::new("mock").with_default_response("stored"),
            dir.path(),
        )
        .expect("cache");
        first.complete("prompt").expect("complete");
        assert!(dir.path().join(format!("{}.json", prompt_key("prompt"))).exists());

        let mut second = CachedCompletion::with_dir(
            MockCompletion::new("mock").with_default_response("fresh"),
            dir.path(),
        )
        .expect("cache");
        assert_eq!(second.complete("prompt").expect("complete"), "stored");
        assert_eq!(second.hits(), 1);
        assert!(second.inner().prompts().is_empty());
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(format!("{}.json", prompt_key("p"))), "{not json")
            .expect("write");
        let mut cached = CachedCompletion::with_dir(
            MockCompletion::new("mock").with_default_response("fresh"),
            dir.path(),
        )
        .expect("cache");
        assert_eq!(cached.complete("p").expect("complete"), "fresh");
        assert_eq!(cached.misses(), 1);
    }
}
