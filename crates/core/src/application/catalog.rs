// Job Catalog
// Closed mapping from method name to a statically registered job body,
// built once at startup

use crate::domain::JobId;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identity of the run a handler executes in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: JobId,
    pub job_name: String,
    pub run_id: String,
}

/// A job body
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    async fn run(&self, ctx: &JobContext) -> Result<()> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap a closure as a handler
pub fn handler_fn<F>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

#[derive(Default, Clone)]
pub struct JobCatalog {
    handlers: BTreeMap<String, Arc<dyn JobHandler>>,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `method`, replacing any previous binding
    pub fn register(mut self, method: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(method.into(), handler);
        self
    }

    pub fn resolve(&self, method: &str) -> Result<Arc<dyn JobHandler>> {
        self.handlers
            .get(method)
            .cloned()
            .ok_or_else(|| AppError::UnknownMethod(method.to_string()))
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for JobCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCatalog")
            .field("methods", &self.methods())
            .finish()
    }
}
