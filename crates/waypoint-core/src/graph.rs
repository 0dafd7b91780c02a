//! Graph builder.
//!
//! Compiles an `ApplicationConfiguration` tree into an `ActionGraph`: one
//! `ActionNode` per configuration node, addressable by action id, with the
//! `onSuccess`/`onFailure` sub-trees turned into edges by id.
//!
//! Compilation rejects unknown action types, duplicate ids, invalid
//! type-specific settings and malformed or dangling `GET:` references, so a
//! compiled graph only fails at run time on state it cannot see.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use waypoint_types::application::{ActionConfiguration, ActionType, ApplicationConfiguration};
use waypoint_types::error::{ActionError, FailureKind};

use crate::action::ActionKind;
use crate::input::SourceExpr;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Configuration errors detected while compiling a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("action of type '{action_type}' has an empty actionId")]
    EmptyActionId { action_type: String },

    #[error("action '{action_id}' has unknown type '{action_type}'")]
    UnknownActionType {
        action_id: String,
        action_type: String,
    },

    #[error("duplicate actionId '{0}'")]
    DuplicateActionId(String),

    #[error("action '{action_id}' is misconfigured: {source}")]
    InvalidAction {
        action_id: String,
        #[source]
        source: ActionError,
    },

    #[error("action '{action_id}' input '{attribute}' has malformed source '{expression}'")]
    MalformedInput {
        action_id: String,
        attribute: String,
        expression: String,
    },

    #[error("action '{action_id}' input '{attribute}' references unknown action '{target}'")]
    UnknownReference {
        action_id: String,
        attribute: String,
        target: String,
    },
}

impl GraphError {
    /// Every compile-time error is a configuration problem.
    pub fn kind(&self) -> FailureKind {
        FailureKind::Misconfiguration
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// One compiled action with its outgoing edges.
#[derive(Debug)]
pub struct ActionNode {
    id: String,
    config: ActionConfiguration,
    action: ActionKind,
    success_edge: Option<String>,
    failure_edge: Option<String>,
    invoked: AtomicBool,
}

impl ActionNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    pub fn config(&self) -> &ActionConfiguration {
        &self.config
    }

    pub fn action(&self) -> &ActionKind {
        &self.action
    }

    pub fn success_edge(&self) -> Option<&str> {
        self.success_edge.as_deref()
    }

    pub fn failure_edge(&self) -> Option<&str> {
        self.failure_edge.as_deref()
    }

    /// Whether `invoke` was called on this node since the graph was built.
    /// Diagnostic only; never persisted.
    pub fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_invoked(&self) {
        self.invoked.store(true, Ordering::Relaxed);
    }
}

/// Compiled, immutable action graph. Shared across runs behind an `Arc`.
#[derive(Debug)]
pub struct ActionGraph {
    root: String,
    nodes: HashMap<String, ActionNode>,
    /// Ids in depth-first build order, for stable iteration.
    order: Vec<String>,
}

impl ActionGraph {
    pub fn root_id(&self) -> &str {
        &self.root
    }

    pub fn root(&self) -> &ActionNode {
        // The root is always inserted first.
        &self.nodes[&self.root]
    }

    pub fn node(&self, id: &str) -> Option<&ActionNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node ids in depth-first order (root, success sub-tree, failure sub-tree).
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ActionNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Compiles configuration trees into `ActionGraph`s.
pub struct GraphBuilder {
    nodes: HashMap<String, ActionNode>,
    order: Vec<String>,
}

impl GraphBuilder {
    pub fn compile(conf: &ApplicationConfiguration) -> Result<ActionGraph, GraphError> {
        let mut builder = GraphBuilder {
            nodes: HashMap::new(),
            order: Vec::new(),
        };
        let root = builder.build(conf)?;
        let graph = ActionGraph {
            root,
            nodes: builder.nodes,
            order: builder.order,
        };
        validate_references(&graph)?;

        tracing::debug!(
            root = graph.root_id(),
            nodes = graph.len(),
            "compiled action graph"
        );
        Ok(graph)
    }

    /// Build one node, register it, then recurse into its edges.
    fn build(&mut self, conf: &ApplicationConfiguration) -> Result<String, GraphError> {
        let id = conf.config.action_id.clone();
        if id.is_empty() {
            return Err(GraphError::EmptyActionId {
                action_type: conf.action_type.clone(),
            });
        }
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateActionId(id));
        }

        let action_type: ActionType =
            conf.action_type
                .parse()
                .map_err(|_| GraphError::UnknownActionType {
                    action_id: id.clone(),
                    action_type: conf.action_type.clone(),
                })?;
        let action = ActionKind::instantiate(action_type, &conf.config).map_err(|source| {
            GraphError::InvalidAction {
                action_id: id.clone(),
                source,
            }
        })?;

        self.nodes.insert(
            id.clone(),
            ActionNode {
                id: id.clone(),
                config: conf.config.clone(),
                action,
                success_edge: None,
                failure_edge: None,
                invoked: AtomicBool::new(false),
            },
        );
        self.order.push(id.clone());

        let success_edge = conf
            .on_success
            .as_deref()
            .map(|next| self.build(next))
            .transpose()?;
        let failure_edge = conf
            .on_failure
            .as_deref()
            .map(|next| self.build(next))
            .transpose()?;

        if let Some(node) = self.nodes.get_mut(&id) {
            node.success_edge = success_edge;
            node.failure_edge = failure_edge;
        }
        Ok(id)
    }
}

/// Every `GET:` must be well formed and name a node of this graph.
fn validate_references(graph: &ActionGraph) -> Result<(), GraphError> {
    for node in graph.nodes() {
        for (attribute, expression) in &node.config.input_sources {
            match SourceExpr::parse(expression) {
                Ok(SourceExpr::Get { action_id, .. }) if !graph.contains(action_id) => {
                    return Err(GraphError::UnknownReference {
                        action_id: node.id.clone(),
                        attribute: attribute.clone(),
                        target: action_id.to_string(),
                    });
                }
                Ok(_) => {}
                Err(_) => {
                    return Err(GraphError::MalformedInput {
                        action_id: node.id.clone(),
                        attribute: attribute.clone(),
                        expression: expression.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
