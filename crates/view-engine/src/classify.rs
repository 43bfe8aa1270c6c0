//! Change classification: does a document transition affect a view?

use document_store::{Document, DocumentRef, Predicate, matches, values_equal};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::source::{ChangeTest, NodeRole, Query};

/// Effect of a document change on a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// The change cannot affect the view.
    Ignore,
    /// A document started matching.
    Add,
    /// A matching document changed a watched field.
    Update,
    /// A document stopped matching.
    Remove,
}

impl Classification {
    /// Whether the view must be rebuilt.
    pub fn requires_rebuild(&self) -> bool {
        !matches!(self, Classification::Ignore)
    }

    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ignore => "ignore",
            Classification::Add => "add",
            Classification::Update => "update",
            Classification::Remove => "remove",
        }
    }

    fn weight(&self) -> u8 {
        match self {
            Classification::Ignore => 0,
            Classification::Update => 1,
            Classification::Add => 2,
            Classification::Remove => 3,
        }
    }

    /// Combines the verdicts of several nodes of one view.
    pub fn strongest(self, other: Classification) -> Classification {
        if other.weight() > self.weight() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChangeTest {
    /// Reports whether the fields this test watches differ between two snapshots.
    ///
    /// `watched` narrows a basic test to the projected fields.
    pub fn differs(&self, before: &Document, after: &Document, watched: Option<&[String]>) -> bool {
        match self {
            ChangeTest::Always => true,
            ChangeTest::BasicEquality => scalar_fields_differ(before.data(), after.data(), watched),
            ChangeTest::Custom(compare) => compare(before.data(), after.data()),
        }
    }
}

/// Scalars plus references, which compare by identity.
fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    ) || DocumentRef::from_value(value).is_some()
}

fn scalar_fields_differ(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    watched: Option<&[String]>,
) -> bool {
    let field_differs = |field: &str| {
        let (b, a) = (before.get(field), after.get(field));
        let scalar_involved = b.is_some_and(is_scalar) || a.is_some_and(is_scalar);
        scalar_involved
            && match (b, a) {
                (Some(b), Some(a)) => !values_equal(b, a),
                _ => true,
            }
    };

    match watched {
        Some(fields) => fields.iter().any(|f| field_differs(f.as_str())),
        None => before
            .keys()
            .chain(after.keys())
            .any(|f| field_differs(f.as_str())),
    }
}

/// Classifies a transition against a predicate list.
///
/// Rules, first match wins:
/// 1. no `before`: Add if `after` matches, else Ignore
/// 2. neither snapshot matches: Ignore
/// 3. `after` does not match: Remove
/// 4. only `after` matches: Add
/// 5. both match: Update if `test` reports a difference, else Ignore
pub fn classify(
    before: Option<&Document>,
    after: Option<&Document>,
    predicates: &[Predicate],
    test: &ChangeTest,
) -> Classification {
    classify_watching(before, after, predicates, test, None)
}

fn classify_watching(
    before: Option<&Document>,
    after: Option<&Document>,
    predicates: &[Predicate],
    test: &ChangeTest,
    watched: Option<&[String]>,
) -> Classification {
    let after_matches = matches(after, predicates);
    let Some(before_doc) = before else {
        return if after_matches {
            Classification::Add
        } else {
            Classification::Ignore
        };
    };

    let before_matches = matches(Some(before_doc), predicates);
    match (before_matches, after_matches, after) {
        (false, false, _) => Classification::Ignore,
        (true, false, _) => Classification::Remove,
        (false, true, _) => Classification::Add,
        (true, true, Some(after_doc)) => {
            if test.differs(before_doc, after_doc, watched) {
                Classification::Update
            } else {
                Classification::Ignore
            }
        }
        (true, true, None) => Classification::Remove,
    }
}

/// Classifies a transition against one node of a source tree.
///
/// Nested nodes (join, merge, add targets) with no `before` snapshot are
/// always an Update. A basic test on a node projecting named fields only
/// watches those fields.
pub fn classify_node(
    query: &Query,
    role: NodeRole,
    before: Option<&Document>,
    after: Option<&Document>,
) -> Classification {
    if role == NodeRole::Nested && before.is_none() {
        return Classification::Update;
    }
    classify_watching(
        before,
        after,
        &query.predicates,
        &query.test,
        query.projection.field_names(),
    )
}
