//! Callbacks invoked by the binder at every node it visits.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::context::{BindContext, Bindable};
use super::error::{BindError, UnboundElements};
use crate::config::{ConfigurationProperty, PropertyName};

/// Intercepts the recursive descent of a [`Binder`](crate::Binder).
///
/// Handlers form a chain: each may hold a parent, and every method delegates
/// to the parent unless overridden. A handler overrides only the callbacks it
/// changes, and calls through to [`parent`](Self::parent) where it wants the
/// rest of the chain to run.
///
/// For every node that is not vetoed the binder calls `on_start`, then either
/// `on_success` followed by `on_finish`, or `on_failure`.
pub trait BindHandler: Send + Sync + fmt::Debug {
    /// The next handler in the chain.
    fn parent(&self) -> Option<&dyn BindHandler> {
        None
    }

    /// Called before binding `name`. Returning `false` skips the node and
    /// everything beneath it.
    fn on_start(&self, name: &PropertyName, target: &Bindable, context: &BindContext<'_>) -> bool {
        self.parent()
            .map_or(true, |parent| parent.on_start(name, target, context))
    }

    /// Called after `name` was bound.
    fn on_success(&self, name: &PropertyName, target: &Bindable, context: &BindContext<'_>) {
        if let Some(parent) = self.parent() {
            parent.on_success(name, target, context);
        }
    }

    /// Called when binding `name` failed. The returned error replaces `error`.
    fn on_failure(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext<'_>,
        error: BindError,
    ) -> BindError {
        match self.parent() {
            Some(parent) => parent.on_failure(name, target, context, error),
            None => error,
        }
    }

    /// Called once binding `name` has completed, including when nothing was
    /// bound at the root. Returning an error fails the node.
    fn on_finish(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext<'_>,
    ) -> Result<(), BindError> {
        self.parent()
            .map_or(Ok(()), |parent| parent.on_finish(name, target, context))
    }
}

/// Handler that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBindHandler;

impl BindHandler for DefaultBindHandler {}

/// Limits binding to the root and its direct members.
///
/// Any node at depth greater than one is vetoed, so nested structs and
/// collection elements are never visited.
#[derive(Debug, Default, Clone)]
pub struct IgnoreNestedPropertiesBindHandler {
    parent: Option<Arc<dyn BindHandler>>,
}

impl IgnoreNestedPropertiesBindHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<dyn BindHandler>) -> Self {
        Self {
            parent: Some(parent),
        }
    }
}

impl BindHandler for IgnoreNestedPropertiesBindHandler {
    fn parent(&self) -> Option<&dyn BindHandler> {
        self.parent.as_deref()
    }

    fn on_start(&self, name: &PropertyName, target: &Bindable, context: &BindContext<'_>) -> bool {
        if context.depth() > 1 {
            return false;
        }
        self.parent()
            .map_or(true, |parent| parent.on_start(name, target, context))
    }
}

/// Fails the bind when properties under the root name were left unused.
#[derive(Debug, Default, Clone)]
pub struct NoUnboundElementsBindHandler {
    parent: Option<Arc<dyn BindHandler>>,
}

impl NoUnboundElementsBindHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<dyn BindHandler>) -> Self {
        Self {
            parent: Some(parent),
        }
    }
}

impl BindHandler for NoUnboundElementsBindHandler {
    fn parent(&self) -> Option<&dyn BindHandler> {
        self.parent.as_deref()
    }

    fn on_finish(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext<'_>,
    ) -> Result<(), BindError> {
        if context.depth() == 0 {
            let bound: BTreeSet<&PropertyName> = context
                .bound_properties()
                .iter()
                .map(|property| &property.name)
                .collect();
            let unbound: Vec<ConfigurationProperty> = context
                .sources()
                .descendants(name)
                .into_iter()
                .filter(|property| !bound.contains(&property.name))
                .cloned()
                .collect();
            if !unbound.is_empty() {
                return Err(BindError::new(
                    name.clone(),
                    context.root_type(),
                    None,
                    UnboundElements::new(unbound),
                ));
            }
        }
        self.parent()
            .map_or(Ok(()), |parent| parent.on_finish(name, target, context))
    }
}

/// Traces every callback, then delegates.
#[derive(Debug, Default, Clone)]
pub struct TracingBindHandler {
    parent: Option<Arc<dyn BindHandler>>,
}

impl TracingBindHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<dyn BindHandler>) -> Self {
        Self {
            parent: Some(parent),
        }
    }
}

impl BindHandler for TracingBindHandler {
    fn parent(&self) -> Option<&dyn BindHandler> {
        self.parent.as_deref()
    }

    fn on_start(&self, name: &PropertyName, target: &Bindable, context: &BindContext<'_>) -> bool {
        let proceed = self
            .parent()
            .map_or(true, |parent| parent.on_start(name, target, context));
        trace!(
            name = %name,
            owner = target.owner(),
            depth = context.depth(),
            proceed,
            "bind start"
        );
        proceed
    }

    fn on_success(&self, name: &PropertyName, target: &Bindable, context: &BindContext<'_>) {
        trace!(name = %name, depth = context.depth(), "bind success");
        if let Some(parent) = self.parent() {
            parent.on_success(name, target, context);
        }
    }

    fn on_failure(
        &self,
        name: &PropertyName,
        target: &Bindable,
        context: &BindContext<'_>,
        error: BindError,
    ) -> BindError {
        trace!(name = %name, depth = context.depth(), cause = %error.cause(), "bind failure");
        match self.parent() {
            Some(parent) => parent.on_failure(name, target, context, error),
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::error::BindFailure;
    use crate::config::{Origin, PropertySources};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingHandler {
        starts: AtomicUsize,
        successes: AtomicUsize,
        veto: bool,
    }

    impl BindHandler for CountingHandler {
        fn on_start(&self, _: &PropertyName, _: &Bindable, _: &BindContext<'_>) -> bool {
            self.starts.fetch_add(1, Ordering::SeqCst);
            !self.veto
        }

        fn on_success(&self, _: &PropertyName, _: &Bindable, _: &BindContext<'_>) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_failure(
            &self,
            name: &PropertyName,
            _: &Bindable,
            _: &BindContext<'_>,
            _: BindError,
        ) -> BindError {
            BindError::new(name.clone(), "replaced", None, BindFailure::Message("replaced".into()))
        }
    }

    fn name(s: &str) -> PropertyName {
        PropertyName::of(s).unwrap()
    }

    #[test]
    fn test_ignore_nested_rejects_deeper_than_one() {
        let sources = PropertySources::new();
        let handler = IgnoreNestedPropertiesBindHandler::new();
        let target = Bindable::field("Foo", "bar");

        for depth in [2, 3, 10] {
            let context = BindContext::at_depth(&sources, depth);
            assert!(!handler.on_start(&name("a.b.c"), &target, &context), "depth {depth}");
        }
        for depth in [0, 1] {
            let context = BindContext::at_depth(&sources, depth);
            assert!(handler.on_start(&name("a.b"), &target, &context), "depth {depth}");
        }
    }

    #[test]
    fn test_ignore_nested_delegates_to_parent_when_shallow() {
        let sources = PropertySources::new();
        let parent = Arc::new(CountingHandler {
            veto: true,
            ..Default::default()
        });
        let handler = IgnoreNestedPropertiesBindHandler::with_parent(parent.clone());
        let target = Bindable::root::<String>();

        let shallow = BindContext::at_depth(&sources, 1);
        assert!(!handler.on_start(&name("a"), &target, &shallow));
        assert_eq!(parent.starts.load(Ordering::SeqCst), 1);

        let deep = BindContext::at_depth(&sources, 2);
        assert!(!handler.on_start(&name("a.b.c"), &target, &deep));
        assert_eq!(parent.starts.load(Ordering::SeqCst), 1, "parent consulted when vetoed");
    }

    #[test]
    fn test_default_methods_delegate_to_parent() {
        let sources = PropertySources::new();
        let context = BindContext::at_depth(&sources, 1);
        let handler = TracingBindHandler::with_parent(Arc::new(CountingHandler::default()));
        let error = BindError::new(name("a"), "String", None, BindFailure::Message("boom".into()));

        let replaced = handler.on_failure(&name("a"), &Bindable::root::<String>(), &context, error);
        assert_eq!(replaced.target(), "replaced");
    }

    #[test]
    fn test_on_success_reaches_parent_through_every_handler() {
        let sources = PropertySources::new();
        let context = BindContext::at_depth(&sources, 1);
        let target = Bindable::root::<String>();
        let parent = Arc::new(CountingHandler::default());

        let handlers: [Box<dyn BindHandler>; 3] = [
            Box::new(TracingBindHandler::with_parent(parent.clone())),
            Box::new(IgnoreNestedPropertiesBindHandler::with_parent(parent.clone())),
            Box::new(NoUnboundElementsBindHandler::with_parent(parent.clone())),
        ];
        for handler in &handlers {
            handler.on_success(&name("a"), &target, &context);
        }
        assert_eq!(parent.successes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_unbound_elements_reports_unused_properties() {
        let mut sources = PropertySources::new();
        let property = |key: &str| {
            ConfigurationProperty::new(name(key), "x", Origin::new("test", key))
        };
        sources.push("test", [property("app.used"), property("app.unused"), property("other")]);

        let mut context = BindContext::new(&sources, "App");
        context.record_bound(property("app.used"));

        let handler = NoUnboundElementsBindHandler::new();
        let error = handler
            .on_finish(&name("app"), &Bindable::root::<String>(), &context)
            .unwrap_err();
        let BindFailure::UnboundElements(unbound) = error.cause() else {
            panic!("expected unbound elements, got {:?}", error.cause());
        };
        assert_eq!(unbound.to_string(), "The elements [app.unused] were left unbound.");
        assert_eq!(error.target(), "App");
    }

    #[test]
    fn test_no_unbound_elements_only_checks_at_root() {
        let mut sources = PropertySources::new();
        sources.push(
            "test",
            [ConfigurationProperty::new(name("app.unused"), "x", Origin::new("test", "app.unused"))],
        );
        let context = BindContext::at_depth(&sources, 1);
        let handler = NoUnboundElementsBindHandler::new();
        assert!(handler
            .on_finish(&name("app"), &Bindable::root::<String>(), &context)
            .is_ok());
    }
}
