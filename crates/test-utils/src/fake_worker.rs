use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use quilldag::dag::ContextBundle;
use quilldag::worker::{Worker, WorkerFuture};

/// One scripted reply: optional delay, then text or an error.
#[derive(Debug, Clone)]
pub struct Response {
    pub delay: Duration,
    pub result: Result<String, String>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(text.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(message.into()),
        }
    }

    /// Never finishes within any test deadline.
    pub fn hang() -> Self {
        Self::text("unreachable").after(Duration::from_secs(3600))
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One invocation as seen by a [`ScriptedWorker`].
#[derive(Debug, Clone)]
pub struct Record {
    pub role: String,
    pub description: String,
    pub context: Vec<(String, String)>,
    pub started: Instant,
    /// `None` while running, or if the invocation was dropped (timeout).
    pub finished: Option<Instant>,
}

#[derive(Debug, Default)]
struct JournalState {
    records: Vec<Record>,
    in_flight: usize,
    peak: usize,
}

/// Shared log of invocations across every worker built on it.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    state: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.state.lock().unwrap()
    }

    fn start(&self, role: &str, description: &str, context: &ContextBundle) -> usize {
        let mut state = self.lock();
        state.records.push(Record {
            role: role.to_string(),
            description: description.to_string(),
            context: context
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            finished: None,
        });
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
        state.records.len() - 1
    }

    fn finish(&self, idx: usize, completed: bool) {
        let mut state = self.lock();
        state.in_flight -= 1;
        if completed {
            state.records[idx].finished = Some(Instant::now());
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    /// Records whose description starts with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<Record> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.description.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.lock()
            .records
            .iter()
            .map(|r| r.description.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().records.len()
    }

    /// Largest number of invocations observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak
    }
}

/// Decrements the in-flight count even when the invocation future is dropped.
struct InFlight<'a> {
    journal: &'a Journal,
    idx: usize,
    completed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.journal.finish(self.idx, self.completed);
    }
}

/// A fake worker that:
/// - records every invocation in a shared [`Journal`]
/// - replies from a per-description-prefix script, then a call-order
///   script, then a fallback.
pub struct ScriptedWorker {
    role: String,
    journal: Journal,
    by_prefix: Mutex<Vec<(String, VecDeque<Response>)>>,
    queue: Mutex<VecDeque<Response>>,
    fallback: Response,
}

impl fmt::Debug for ScriptedWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedWorker")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl ScriptedWorker {
    /// Replies with `"<role> done"` unless scripted otherwise.
    pub fn new(role: impl Into<String>, journal: &Journal) -> Self {
        let role = role.into();
        Self {
            fallback: Response::text(format!("{role} done")),
            role,
            journal: journal.clone(),
            by_prefix: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn fallback(mut self, response: Response) -> Self {
        self.fallback = response;
        self
    }

    /// Replies used in order, one per call, before the fallback.
    pub fn then(self, response: Response) -> Self {
        self.queue.lock().unwrap().push_back(response);
        self
    }

    /// Replies for descriptions starting with `prefix`, one per call; the
    /// last one repeats.
    pub fn on(self, prefix: impl Into<String>, responses: Vec<Response>) -> Self {
        self.by_prefix
            .lock()
            .unwrap()
            .push((prefix.into(), responses.into()));
        self
    }

    pub fn into_arc(self) -> Arc<dyn Worker> {
        Arc::new(self)
    }

    fn next_response(&self, description: &str) -> Response {
        {
            let mut by_prefix = self.by_prefix.lock().unwrap();
            if let Some((_, responses)) = by_prefix
                .iter_mut()
                .find(|(prefix, _)| description.starts_with(prefix.as_str()))
            {
                if responses.len() > 1 {
                    if let Some(r) = responses.pop_front() {
                        return r;
                    }
                }
                if let Some(r) = responses.front() {
                    return r.clone();
                }
            }
        }

        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Worker for ScriptedWorker {
    fn invoke<'a>(&'a self, description: &'a str, context: &'a ContextBundle) -> WorkerFuture<'a> {
        Box::pin(async move {
            let response = self.next_response(description);
            let mut guard = InFlight {
                journal: &self.journal,
                idx: self.journal.start(&self.role, description, context),
                completed: false,
            };

            if response.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(response.delay).await;
            }
            guard.completed = true;
            drop(guard);

            response.result.map_err(|msg| anyhow!(msg))
        })
    }
}
