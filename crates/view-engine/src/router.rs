//! Static dependency table from collections to the views reading them.

use std::collections::{BTreeMap, BTreeSet};

use document_store::Document;

use crate::classify::{Classification, classify_node};
use crate::source::{NodeRole, Query};
use crate::view::ViewDefinition;

/// A query node of a view that reacts to changes in its collection.
#[derive(Debug, Clone)]
pub struct WatchedNode {
    pub query: Query,
    pub role: NodeRole,
}

impl WatchedNode {
    pub fn collection(&self) -> &str {
        &self.query.collection
    }

    /// Classifies a transition of a document of this node's collection.
    pub fn classify(&self, before: Option<&Document>, after: Option<&Document>) -> Classification {
        classify_node(&self.query, self.role, before, after)
    }
}

/// Immutable routing table built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TriggerRouter {
    dependents: BTreeMap<String, BTreeSet<String>>,
    nodes: BTreeMap<String, Vec<WatchedNode>>,
}

/// Walks every source tree of `views` (primary, summaries, and all nested
/// join, merge, and add targets) and records which views read which
/// collections.
pub fn build_trigger_router(views: &[ViewDefinition]) -> TriggerRouter {
    let mut router = TriggerRouter::default();
    for view in views {
        let mut nodes = Vec::new();
        let mut record = |query: &Query, role: NodeRole| {
            nodes.push(WatchedNode {
                query: query.clone(),
                role,
            });
        };
        view.source.walk(NodeRole::Primary, &mut record);
        for summary in &view.summaries {
            summary.source.walk(NodeRole::Summary, &mut record);
        }

        for node in &nodes {
            router
                .dependents
                .entry(node.collection().to_string())
                .or_default()
                .insert(view.name.clone());
        }
        router.nodes.insert(view.name.clone(), nodes);
    }
    router
}

impl TriggerRouter {
    /// Views depending on `collection`, sorted by name.
    pub fn dependents(&self, collection: &str) -> Vec<&str> {
        self.dependents
            .get(collection)
            .map(|views| views.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every collection some view reads.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.dependents.keys().map(String::as_str)
    }

    /// Watched nodes of `view`.
    pub fn nodes(&self, view: &str) -> &[WatchedNode] {
        self.nodes.get(view).map(Vec::as_slice).unwrap_or_default()
    }

    /// Strongest verdict of every node of `view` reading `collection`.
    pub fn classify(
        &self,
        view: &str,
        collection: &str,
        before: Option<&Document>,
        after: Option<&Document>,
    ) -> Classification {
        self.nodes(view)
            .iter()
            .filter(|node| node.collection() == collection)
            .map(|node| node.classify(before, after))
            .fold(Classification::Ignore, Classification::strongest)
    }
}
