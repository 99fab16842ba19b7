// src/worker/mod.rs

//! Workers: the external collaborators that turn a task description plus its
//! context into text.
//!
//! - [`Worker`] is the trait the engine talks to. Production code uses
//!   [`CommandWorker`], which pipes the prompt into a configured process;
//!   tests and embedders can supply their own implementation or wrap a
//!   closure in [`FnWorker`].
//! - [`registry`] maps each role to exactly one worker and serializes
//!   invocations per role.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::ContextBundle;

pub mod command;
pub mod registry;

pub use command::CommandWorker;
pub use registry::{WorkerHandle, WorkerRegistry};

/// Boxed future returned by [`Worker::invoke`].
pub type WorkerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// Something that can execute tasks of one role.
///
/// The engine never interprets the description or the produced text; an
/// `Err` is treated as an execution failure. Deadlines are applied by the
/// [`WorkerRegistry`], which drops the returned future on expiry.
pub trait Worker: Send + Sync + fmt::Debug {
    fn invoke<'a>(&'a self, description: &'a str, context: &'a ContextBundle) -> WorkerFuture<'a>;
}

type BoxedFn = dyn Fn(String, ContextBundle) -> WorkerFuture<'static> + Send + Sync;

/// Adapts an async closure into a [`Worker`].
#[derive(Clone)]
pub struct FnWorker {
    f: Arc<BoxedFn>,
}

impl FnWorker {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String, ContextBundle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            f: Arc::new(
                move |description: String, context: ContextBundle| -> WorkerFuture<'static> {
                    Box::pin(f(description, context))
                },
            ),
        }
    }
}

impl fmt::Debug for FnWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

impl Worker for FnWorker {
    fn invoke<'a>(&'a self, description: &'a str, context: &'a ContextBundle) -> WorkerFuture<'a> {
        (self.f)(description.to_string(), context.clone())
    }
}
