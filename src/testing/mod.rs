//! Testing utilities and fixtures
//!
//! Post fixtures, corpus files in temporary directories, and worker pools with
//! scripted failures for exercising the engine's failure policies.

use crate::engine::{
    AggregateMode, LocalWorkerPool, PartialResult, Placement, WorkUnit, WorkerError, WorkerInfo,
    WorkerPool,
};
use crate::extract::{RecordFields, RecordPredicate, Verdict};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Render one post row in the dump's escaped attribute format
pub fn post(id: u64, tags: &[&str], created: Option<&str>) -> String {
    let mut row = format!(r#"  <row Id="{}" PostTypeId="1""#, id);
    if let Some(created) = created {
        row.push_str(&format!(r#" CreationDate="{}""#, created));
    }
    if !tags.is_empty() {
        let tags: String = tags.iter().map(|t| format!("&lt;{}&gt;", t)).collect();
        row.push_str(&format!(r#" Tags="{}""#, tags));
    }
    row.push_str(" />");
    row
}

/// A corpus file that lives as long as its temporary directory
pub struct Corpus {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Corpus {
    /// Write `lines` joined by newlines to `posts.xml`
    pub fn write(lines: &[String]) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("posts.xml");
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content)?;
        Ok(Self { dir, path })
    }
}

/// Pool that fails every unit of chosen rounds and can delay every unit
pub struct ScriptedPool {
    inner: LocalWorkerPool,
    failing_rounds: HashSet<u64>,
    delay: Option<Duration>,
    submitted: AtomicUsize,
}

impl ScriptedPool {
    pub fn new(workers: usize) -> Self {
        Self {
            inner: LocalWorkerPool::new(workers.max(1), 1)
                .expect("positive worker count is always valid"),
            failing_rounds: HashSet::new(),
            delay: None,
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn fail_round(mut self, round: u64) -> Self {
        self.failing_rounds.insert(round);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Units submitted so far, failed ones included
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerPool for ScriptedPool {
    fn nodes(&self) -> Vec<WorkerInfo> {
        self.inner.nodes()
    }

    async fn submit(
        &self,
        unit: WorkUnit,
        placement: Placement,
    ) -> Result<PartialResult, WorkerError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_rounds.contains(&unit.round()) {
            return Err(WorkerError::Failed {
                worker: "scripted".to_string(),
                message: format!("scripted failure in round {}", unit.round()),
            });
        }
        self.inner.submit(unit, placement).await
    }
}

/// Predicate that panics on any record carrying the given tag
#[derive(Debug, Clone)]
pub struct PanickingPredicate {
    pub trigger: String,
}

impl RecordPredicate for PanickingPredicate {
    fn mode(&self) -> AggregateMode {
        AggregateMode::Scalar
    }

    fn evaluate(&self, fields: &RecordFields) -> Verdict {
        match &fields.tags {
            Some(tags) if tags.contains(&self.trigger) => {
                panic!("predicate tripped on <{}>", self.trigger)
            }
            _ => Verdict::NoMatch,
        }
    }

    fn describe(&self) -> String {
        "posts that never match".to_string()
    }
}
