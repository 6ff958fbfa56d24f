//! Node context injection for per-node logging
//!
//! Thread-local storage for the identity of the node currently being
//! processed, so every span opened during a node's tick can be tagged with it.

use std::cell::RefCell;
use std::fmt::Display;

use uuid::Uuid;

/// Node context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct NodeContextData {
    /// The node's identifier
    pub node_id: String,
    /// Unique id for this context scope, distinguishes repeated ticks of one node
    pub instance_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// When this guard is created, it sets the node context for the current thread.
/// When it's dropped, it restores the previous context (if any), so guards
/// nest.
///
/// # Example
///
/// ```
/// use meshroute_logging::context::NodeContextGuard;
///
/// let _guard = NodeContextGuard::new("4");
/// assert_eq!(NodeContextGuard::current_node_id().as_deref(), Some("4"));
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    /// Create a new node context guard
    pub fn new(node_id: impl Display) -> Self {
        Self::with_instance_id(node_id, Uuid::new_v4())
    }

    /// Create a guard with a specific instance ID
    pub fn with_instance_id(node_id: impl Display, instance_id: Uuid) -> Self {
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = NodeContextData {
            node_id: node_id.to_string(),
            instance_id,
        };

        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node ID (if set)
    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Convenience macro to run a block inside a node context scope
///
/// # Example
///
/// ```ignore
/// with_node_context!(node.id(), {
///     tracing::info!("Processing packet");
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($node_id:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($node_id);
        $body
    }};
}
