use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::context::ImportContext;
use crate::error::Result;

/// Subscriber to the pre/post import extension points
///
/// An error from either method aborts the run like any stage failure.
#[async_trait]
pub trait ImportHook: Send + Sync {
    fn name(&self) -> &str;

    /// Before tags, assets, plugins or content are written
    async fn pre_import(&self, _ctx: &mut ImportContext) -> Result<()> {
        Ok(())
    }

    /// After the summary has been generated
    async fn post_import(&self, _ctx: &mut ImportContext) -> Result<()> {
        Ok(())
    }
}

/// Hook subscribers, awaited one after another in registration order
#[derive(Clone, Default)]
pub struct ImportHooks {
    hooks: Vec<Arc<dyn ImportHook>>,
}

impl ImportHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn pre_import(&self, ctx: &mut ImportContext) -> Result<()> {
        for hook in &self.hooks {
            debug!("preImport hook {}", hook.name());
            hook.pre_import(ctx).await?;
        }
        Ok(())
    }

    pub async fn post_import(&self, ctx: &mut ImportContext) -> Result<()> {
        for hook in &self.hooks {
            debug!("postImport hook {}", hook.name());
            hook.post_import(ctx).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ImportHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("ImportHooks").field("hooks", &names).finish()
    }
}
