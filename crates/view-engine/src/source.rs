//! Declarative source trees.
//!
//! A [`Source`] is a tagged-variant tree: a [`Query`] at the bottom,
//! wrapped by join, merge, and add layers. Builder methods such as
//! [`Source::matching`] or [`Source::limit`] always configure the query at
//! the bottom of the tree; [`Source::join`], [`Source::merge`], and
//! [`Source::add`] wrap the tree in a new layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use document_store::{Document, DocumentRef, Order, Predicate};
use serde_json::{Map, Value};

use crate::item::ResolvedItem;

/// Custom projection: `(document, index, context, sink) -> fields`.
///
/// Returning `None` drops the mapped row; rows pushed to the sink are
/// emitted after it.
pub type MapFn = dyn Fn(&Document, usize, &MapContext<'_>, &mut RowSink) -> Option<Map<String, Value>>
    + Send
    + Sync;

/// Custom change test: `(before_data, after_data) -> fields differ`.
pub type CompareFn = dyn Fn(&Map<String, Value>, &Map<String, Value>) -> bool + Send + Sync;

/// What a custom mapper can see besides the document.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    /// View being rebuilt.
    pub view: &'a str,
    /// Item the current source hangs off (join, merge, or add target), if any.
    pub parent: Option<&'a ResolvedItem>,
}

/// Collects extra rows injected by a custom mapper.
#[derive(Debug)]
pub struct RowSink {
    reference: DocumentRef,
    rows: Vec<ResolvedItem>,
}

impl RowSink {
    pub(crate) fn new(reference: DocumentRef) -> Self {
        Self {
            reference,
            rows: Vec::new(),
        }
    }

    /// Emits an additional row sharing the current document's id and ref.
    pub fn add_unmapped_item(&mut self, fields: Map<String, Value>) {
        self.rows
            .push(ResolvedItem::new(self.reference.clone(), fields));
    }

    pub(crate) fn into_rows(self) -> Vec<ResolvedItem> {
        self.rows
    }
}

/// How documents become items.
#[derive(Clone, Default)]
pub enum Projection {
    /// Every top-level field.
    #[default]
    All,
    /// Only the named top-level fields; missing ones are omitted.
    Fields(Vec<String>),
    /// A caller-supplied mapper.
    Custom(Arc<MapFn>),
}

impl Projection {
    /// Field names watched by a basic change test, when the projection names them.
    pub fn field_names(&self) -> Option<&[String]> {
        match self {
            Projection::Fields(names) => Some(names),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::All => f.write_str("All"),
            Projection::Fields(names) => f.debug_tuple("Fields").field(names).finish(),
            Projection::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Decides whether an edit of a still-matching document is an update.
#[derive(Clone, Default)]
pub enum ChangeTest {
    /// No test configured: every edit counts.
    #[default]
    Always,
    /// Shallow comparison of top-level scalar and boolean fields.
    BasicEquality,
    /// Caller-supplied comparator.
    Custom(Arc<CompareFn>),
}

impl std::fmt::Debug for ChangeTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeTest::Always => f.write_str("Always"),
            ChangeTest::BasicEquality => f.write_str("BasicEquality"),
            ChangeTest::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A single-collection query plus its projection and change test.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub collection: String,
    pub predicates: Vec<Predicate>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub projection: Projection,
    pub test: ChangeTest,
}

impl Query {
    /// Creates an unfiltered query over `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }
}

/// How an add entry is scoped to the item it hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddLink {
    /// Resolve the nested source unchanged for every item.
    Unlinked,
    /// Restrict the nested source to `field == item.id`.
    ById(String),
    /// Restrict the nested source to `field == item.ref`.
    ByRef(String),
}

impl AddLink {
    /// The predicate this link adds for `item`, if any.
    pub fn predicate_for(&self, item: &ResolvedItem) -> Option<Predicate> {
        match self {
            AddLink::Unlinked => None,
            AddLink::ById(field) => Some(Predicate::equals(field.as_str(), item.id())),
            AddLink::ByRef(field) => {
                Some(Predicate::equals(field.as_str(), item.reference().to_value()))
            }
        }
    }
}

/// A named array attached to every item of the enclosing source.
#[derive(Debug, Clone)]
pub struct AddSource {
    pub source: Source,
    pub link: AddLink,
}

impl AddSource {
    /// Attaches the full result of `source` to every item.
    pub fn unlinked(source: Source) -> Self {
        Self {
            source,
            link: AddLink::Unlinked,
        }
    }

    /// Attaches rows of `source` whose `field` equals the item id.
    pub fn by_id(field: impl Into<String>, source: Source) -> Self {
        Self {
            source,
            link: AddLink::ById(field.into()),
        }
    }

    /// Attaches rows of `source` whose `field` references the item.
    pub fn by_ref(field: impl Into<String>, source: Source) -> Self {
        Self {
            source,
            link: AddLink::ByRef(field.into()),
        }
    }
}

/// Whether a node is a view's own source or hangs off another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// The primary source of a view.
    Primary,
    /// The source of a named summary array.
    Summary,
    /// A join, merge, or add target.
    Nested,
}

/// Declarative description of how a list of items is produced.
#[derive(Debug, Clone)]
pub enum Source {
    Plain(Query),
    Joined {
        base: Box<Source>,
        join: Box<Source>,
    },
    Merged {
        base: Box<Source>,
        field: String,
        merge: Box<Source>,
    },
    WithAdds {
        base: Box<Source>,
        adds: BTreeMap<String, AddSource>,
    },
}

impl Source {
    /// Starts a source reading `collection`.
    pub fn collection(collection: impl Into<String>) -> Self {
        Source::Plain(Query::new(collection))
    }

    /// The query at the bottom of the tree.
    pub fn query(&self) -> &Query {
        match self {
            Source::Plain(query) => query,
            Source::Joined { base, .. }
            | Source::Merged { base, .. }
            | Source::WithAdds { base, .. } => base.query(),
        }
    }

    fn query_mut(&mut self) -> &mut Query {
        match self {
            Source::Plain(query) => query,
            Source::Joined { base, .. }
            | Source::Merged { base, .. }
            | Source::WithAdds { base, .. } => base.query_mut(),
        }
    }

    /// Collection read by the query at the bottom of the tree.
    pub fn collection_name(&self) -> &str {
        &self.query().collection
    }

    /// Adds a `where` condition.
    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.query_mut().predicates.push(predicate);
        self
    }

    /// Sets the order clause.
    pub fn order_by(mut self, order: Order) -> Self {
        self.query_mut().order = Some(order);
        self
    }

    /// Limits the number of documents read.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query_mut().limit = Some(limit);
        self
    }

    /// Projects only the named fields.
    pub fn fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.query_mut().projection = Projection::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Projects documents through a custom mapper.
    pub fn map<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&Document, usize, &MapContext<'_>, &mut RowSink) -> Option<Map<String, Value>>
            + Send
            + Sync
            + 'static,
    {
        self.query_mut().projection = Projection::Custom(Arc::new(mapper));
        self
    }

    /// Sets the change test.
    pub fn test(mut self, test: ChangeTest) -> Self {
        self.query_mut().test = test;
        self
    }

    /// Sets a custom comparator as change test.
    pub fn test_with<F>(self, comparator: F) -> Self
    where
        F: Fn(&Map<String, Value>, &Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.test(ChangeTest::Custom(Arc::new(comparator)))
    }

    /// Enriches every item 1:1 with the document of `join` sharing its id.
    pub fn join(self, join: Source) -> Self {
        Source::Joined {
            base: Box::new(self),
            join: Box::new(join),
        }
    }

    /// Enriches every item with the document of `merge` whose id is `item[field]`.
    pub fn merge(self, field: impl Into<String>, merge: Source) -> Self {
        Source::Merged {
            base: Box::new(self),
            field: field.into(),
            merge: Box::new(merge),
        }
    }

    /// Attaches the rows of `add` to every item under `name`.
    pub fn add(self, name: impl Into<String>, add: AddSource) -> Self {
        match self {
            Source::WithAdds { base, mut adds } => {
                adds.insert(name.into(), add);
                Source::WithAdds { base, adds }
            }
            other => {
                let mut adds = BTreeMap::new();
                adds.insert(name.into(), add);
                Source::WithAdds {
                    base: Box::new(other),
                    adds,
                }
            }
        }
    }

    /// Visits every query in the tree with its role.
    ///
    /// The bottom query of this tree gets `role`; every join, merge, and
    /// add target (transitively) is visited as [`NodeRole::Nested`].
    pub fn walk<'a>(&'a self, role: NodeRole, visit: &mut impl FnMut(&'a Query, NodeRole)) {
        match self {
            Source::Plain(query) => visit(query, role),
            Source::Joined { base, join } => {
                base.walk(role, visit);
                join.walk(NodeRole::Nested, visit);
            }
            Source::Merged { base, merge, .. } => {
                base.walk(role, visit);
                merge.walk(NodeRole::Nested, visit);
            }
            Source::WithAdds { base, adds } => {
                base.walk(role, visit);
                for add in adds.values() {
                    add.source.walk(NodeRole::Nested, visit);
                }
            }
        }
    }

    /// Checks the tree for malformed nodes, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        let mut problem = None;
        self.walk(NodeRole::Primary, &mut |query, _| {
            if problem.is_none() {
                problem = validate_query(query).err();
            }
        });
        if let Some(problem) = problem {
            return Err(problem);
        }
        self.validate_layers()
    }

    fn validate_layers(&self) -> Result<(), String> {
        match self {
            Source::Plain(_) => Ok(()),
            Source::Joined { base, join } => {
                base.validate_layers()?;
                join.validate_layers()
            }
            Source::Merged { base, field, merge } => {
                if field.trim().is_empty() {
                    return Err("merge field must not be empty".to_string());
                }
                base.validate_layers()?;
                merge.validate_layers()
            }
            Source::WithAdds { base, adds } => {
                base.validate_layers()?;
                for (name, add) in adds {
                    if name.trim().is_empty() {
                        return Err("add entry name must not be empty".to_string());
                    }
                    if name == crate::item::ID_FIELD || name == crate::item::REF_FIELD {
                        return Err(format!("add entry name {name:?} is reserved"));
                    }
                    if let AddLink::ById(field) | AddLink::ByRef(field) = &add.link
                        && field.trim().is_empty()
                    {
                        return Err(format!("add entry {name:?} has an empty link field"));
                    }
                    add.source.validate_layers()?;
                }
                Ok(())
            }
        }
    }
}

fn validate_query(query: &Query) -> Result<(), String> {
    if query.collection.trim().is_empty() {
        return Err("collection name must not be empty".to_string());
    }
    if let Some(p) = query.predicates.iter().find(|p| p.field.trim().is_empty()) {
        return Err(format!(
            "predicate on collection {:?} has an empty field name (operator {})",
            query.collection, p.op
        ));
    }
    if query
        .order
        .as_ref()
        .is_some_and(|o| o.field.trim().is_empty())
    {
        return Err(format!(
            "order clause on collection {:?} has an empty field name",
            query.collection
        ));
    }
    if query.limit == Some(0) {
        return Err(format!(
            "limit on collection {:?} must be at least 1",
            query.collection
        ));
    }
    if let Projection::Fields(names) = &query.projection
        && names.iter().any(|n| n.trim().is_empty())
    {
        return Err(format!(
            "projection on collection {:?} names an empty field",
            query.collection
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> Source {
        Source::collection("assets")
            .matching(Predicate::equals("isApproved", true))
            .join(Source::collection("assetStats"))
            .merge("owner", Source::collection("users").fields(["name"]))
            .add(
                "comments",
                AddSource::by_id("assetId", Source::collection("comments")),
            )
            .limit(10)
    }

    #[test]
    fn test_builder_configures_bottom_query() {
        let source = nested();
        assert_eq!(source.collection_name(), "assets");
        assert_eq!(source.query().limit, Some(10));
        assert_eq!(source.query().predicates.len(), 1);
        assert!(matches!(source, Source::WithAdds { .. }));
    }

    #[test]
    fn test_add_reuses_existing_layer() {
        let source = Source::collection("assets")
            .add("a", AddSource::unlinked(Source::collection("x")))
            .add("b", AddSource::unlinked(Source::collection("y")));
        match source {
            Source::WithAdds { base, adds } => {
                assert!(matches!(*base, Source::Plain(_)));
                assert_eq!(adds.len(), 2);
            }
            other => panic!("unexpected layer: {other:?}"),
        }
    }

    #[test]
    fn test_walk_visits_every_node_with_role() {
        let mut seen = Vec::new();
        nested().walk(NodeRole::Primary, &mut |q, role| {
            seen.push((q.collection.clone(), role));
        });
        assert_eq!(
            seen,
            vec![
                ("assets".to_string(), NodeRole::Primary),
                ("assetStats".to_string(), NodeRole::Nested),
                ("users".to_string(), NodeRole::Nested),
                ("comments".to_string(), NodeRole::Nested),
            ]
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_tree() {
        assert!(nested().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let err = Source::collection("assets").limit(0).validate().unwrap_err();
        assert!(err.contains("limit"));
    }

    #[test]
    fn test_validate_rejects_nested_empty_collection() {
        let source = Source::collection("assets").join(Source::collection(""));
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_add_name() {
        let source =
            Source::collection("assets").add("id", AddSource::unlinked(Source::collection("x")));
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_add_link_builds_predicates() {
        let item = ResolvedItem::new(DocumentRef::new("assets", "a1"), Map::new());
        assert_eq!(AddLink::Unlinked.predicate_for(&item), None);
        assert_eq!(
            AddLink::ById("assetId".into()).predicate_for(&item),
            Some(Predicate::equals("assetId", "a1"))
        );
        assert_eq!(
            AddLink::ByRef("asset".into()).predicate_for(&item),
            Some(Predicate::equals("asset", json!({"$ref": "assets/a1"})))
        );
    }
}
