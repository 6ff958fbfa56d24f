//! Custom tracing layers for the mesh simulator

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{NodeContextData, NodeContextGuard};

/// Layer that attaches the active node context to new spans
///
/// When a [`NodeContextGuard`] is live, every span created on the thread
/// carries a [`NodeContextExtension`] naming the node.
pub struct NodeContextLayer;

impl NodeContextLayer {
    /// Create a new node context layer
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodeContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(node_ctx) = NodeContextGuard::current()
        {
            span.extensions_mut()
                .insert(NodeContextExtension { data: node_ctx });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    /// Captures the node id found on each span as it closes
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl<S> Layer<S> for Capture
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
            if let Some(span) = ctx.span(&id)
                && let Some(ext) = span.extensions().get::<NodeContextExtension>()
            {
                self.0.lock().unwrap().push(ext.data.node_id.clone());
            }
        }
    }

    #[test]
    fn test_span_tagged_with_active_node() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry()
            .with(NodeContextLayer::new())
            .with(Capture(seen.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = NodeContextGuard::new("5");
            let span = tracing::info_span!("node_tick");
            drop(span);

            drop(_guard);
            let untagged = tracing::info_span!("mesh_tick");
            drop(untagged);
        });

        assert_eq!(*seen.lock().unwrap(), vec!["5".to_string()]);
    }
}
