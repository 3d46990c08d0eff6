use crate::registry::LoaderRegistry;
use std::future::Future;
use std::sync::Arc;
use tracing::Span;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Request-scoped execution context handed to resolvers.
///
/// Carries the loader registry so resolvers can reach it without a global.
/// Cloning is cheap.
#[derive(Clone, Default)]
pub struct RequestContext {
    request_id: Option<Arc<str>>,
    loaders: Option<Arc<LoaderRegistry>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_id(self, request_id: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..self
        }
    }

    /// Derived context carrying `registry`. The original is left untouched.
    #[must_use]
    pub fn with_loaders(&self, registry: Arc<LoaderRegistry>) -> Self {
        Self {
            request_id: self.request_id.clone(),
            loaders: Some(registry),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn loaders(&self) -> Option<&Arc<LoaderRegistry>> {
        self.loaders.as_ref()
    }

    /// Like [`RequestContext::loaders`], for code paths where a missing
    /// registry can only be a wiring bug.
    ///
    /// # Panics
    ///
    /// Panics if no registry was attached.
    pub fn expect_loaders(&self) -> &Arc<LoaderRegistry> {
        self.loaders
            .as_ref()
            .expect("no loader registry attached to the request context")
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("request", id = self.request_id().unwrap_or("-"))
    }

    /// Run `fut` with this context available through [`RequestContext::current`].
    pub async fn scope<Fut>(self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// The context of the enclosing [`RequestContext::scope`], if any.
    pub fn current() -> Option<RequestContext> {
        CURRENT.try_with(Clone::clone).ok()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("loaders", &self.loaders.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::LoaderConfig;

    fn registry() -> Arc<LoaderRegistry> {
        Arc::new(LoaderRegistry::builder(LoaderConfig::default()).build())
    }

    #[test]
    fn test_attach_and_retrieve() {
        let base = RequestContext::new().with_request_id("req-1");
        let registry = registry();

        let ctx = base.with_loaders(registry.clone());

        assert!(base.loaders().is_none());
        assert!(Arc::ptr_eq(ctx.loaders().unwrap(), &registry));
        assert!(Arc::ptr_eq(ctx.expect_loaders(), &registry));
        assert_eq!(ctx.request_id(), Some("req-1"));
    }

    #[test]
    #[should_panic(expected = "no loader registry attached")]
    fn test_expect_loaders_panics_without_registry() {
        RequestContext::new().expect_loaders();
    }

    #[tokio::test]
    async fn test_scope_makes_context_ambient() {
        assert!(RequestContext::current().is_none());

        let ctx = RequestContext::new()
            .with_request_id("req-2")
            .with_loaders(registry());

        let seen = ctx
            .scope(async {
                let current = RequestContext::current().expect("inside scope");
                (current.request_id().map(str::to_string), current.loaders().is_some())
            })
            .await;

        assert_eq!(seen, (Some("req-2".to_string()), true));
        assert!(RequestContext::current().is_none());
    }
}
