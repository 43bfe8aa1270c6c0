//! JSON view definition files.
//!
//! ```json
//! {
//!   "views": [{
//!     "name": "approvedAssets",
//!     "source": {
//!       "collection": "assets",
//!       "where": [["isApproved", "==", true]],
//!       "orderBy": {"field": "title", "direction": "asc"},
//!       "test": "basic",
//!       "merge": {"field": "owner", "source": {"collection": "users", "fields": ["name"]}},
//!       "add": {"comments": {"source": {"collection": "comments"}, "linkField": "assetId"}}
//!     },
//!     "summary": [{"name": "tags", "source": {"collection": "tags"}}]
//!   }]
//! }
//! ```
//!
//! Custom mappers, comparators, and summary filters cannot be expressed
//! here; build such views in Rust.

use std::collections::BTreeMap;
use std::path::Path;

use document_store::{Operator, Order, Predicate};
use serde::Deserialize;
use serde_json::Value;

use crate::source::{AddLink, AddSource, ChangeTest, Source};
use crate::view::{SummarySource, ViewDefinition};
use crate::{Result, ViewError};

/// Marker selecting [`ChangeTest::BasicEquality`].
pub const BASIC_TEST_MARKER: &str = "basic";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    views: Vec<RawView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawView {
    name: String,
    #[serde(default)]
    use_item_id_as_document_id: bool,
    source: RawSource,
    #[serde(default)]
    summary: Vec<RawSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSummary {
    name: String,
    source: RawSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSource {
    collection: String,
    #[serde(default, rename = "where")]
    conditions: Vec<(String, String, Value)>,
    order_by: Option<Order>,
    limit: Option<usize>,
    fields: Option<Vec<String>>,
    test: Option<String>,
    join: Option<Box<RawSource>>,
    merge: Option<RawMerge>,
    #[serde(default)]
    add: BTreeMap<String, RawAdd>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMerge {
    field: String,
    source: Box<RawSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAdd {
    source: RawSource,
    link_field: Option<String>,
    link_by: Option<LinkBy>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LinkBy {
    Id,
    Ref,
}

impl RawSource {
    fn into_source(self, view: &str) -> Result<Source> {
        let mut source = Source::collection(self.collection);
        for (field, op, value) in self.conditions {
            let op = op
                .parse::<Operator>()
                .map_err(|e| ViewError::configuration(view, e.to_string()))?;
            source = source.matching(Predicate::new(field, op, value));
        }
        if let Some(order) = self.order_by {
            source = source.order_by(order);
        }
        if let Some(limit) = self.limit {
            source = source.limit(limit);
        }
        if let Some(fields) = self.fields {
            source = source.fields(fields);
        }
        match self.test.as_deref() {
            None => {}
            Some(BASIC_TEST_MARKER) => source = source.test(ChangeTest::BasicEquality),
            Some(other) => {
                return Err(ViewError::configuration(
                    view,
                    format!("unknown change test {other:?}"),
                ));
            }
        }

        if let Some(join) = self.join {
            source = source.join(join.into_source(view)?);
        }
        if let Some(merge) = self.merge {
            source = source.merge(merge.field, merge.source.into_source(view)?);
        }
        for (name, add) in self.add {
            let link = match (add.link_field, add.link_by) {
                (None, None) => AddLink::Unlinked,
                (Some(field), None | Some(LinkBy::Id)) => AddLink::ById(field),
                (Some(field), Some(LinkBy::Ref)) => AddLink::ByRef(field),
                (None, Some(_)) => {
                    return Err(ViewError::configuration(
                        view,
                        format!("add entry {name:?} sets linkBy without linkField"),
                    ));
                }
            };
            let nested = add.source.into_source(view)?;
            source = source.add(name, AddSource { source: nested, link });
        }
        Ok(source)
    }
}

impl RawView {
    fn into_definition(self) -> Result<ViewDefinition> {
        let name = self.name;
        let mut view = ViewDefinition::new(name.clone(), self.source.into_source(&name)?);
        view.use_item_id_as_document_id = self.use_item_id_as_document_id;
        for summary in self.summary {
            view = view.summary(SummarySource::new(
                summary.name,
                summary.source.into_source(&name)?,
            ));
        }
        view.validate()?;
        Ok(view)
    }
}

/// Parses a definition file's contents.
pub fn parse_definitions(json: &str) -> Result<Vec<ViewDefinition>> {
    let file: DefinitionFile = serde_json::from_str(json)?;
    file.views
        .into_iter()
        .map(RawView::into_definition)
        .collect()
}

/// Reads and parses the definition file at `path`.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<ViewDefinition>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let views = parse_definitions(&json)?;
    tracing::info!(path = %path.display(), views = views.len(), "loaded view definitions");
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Projection;
    use document_store::Direction;

    #[test]
    fn test_parses_full_definition() {
        let views = parse_definitions(
            r#"{
                "views": [{
                    "name": "approved",
                    "useItemIdAsDocumentId": true,
                    "source": {
                        "collection": "assets",
                        "where": [["isApproved", "==", true], ["size", ">", 10]],
                        "orderBy": {"field": "title", "direction": "desc"},
                        "limit": 50,
                        "fields": ["title", "owner"],
                        "test": "basic",
                        "join": {"collection": "assetStats"},
                        "merge": {"field": "owner", "source": {"collection": "users"}},
                        "add": {
                            "comments": {"source": {"collection": "comments"}, "linkField": "assetId"},
                            "likes": {"source": {"collection": "likes"}, "linkField": "asset", "linkBy": "ref"}
                        }
                    },
                    "summary": [{"name": "tags", "source": {"collection": "tags"}}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert!(view.use_item_id_as_document_id);
        let query = view.source.query();
        assert_eq!(query.collection, "assets");
        assert_eq!(query.predicates.len(), 2);
        assert_eq!(query.predicates[1].op, Operator::GreaterThan);
        assert_eq!(query.order.as_ref().unwrap().direction, Direction::Desc);
        assert_eq!(query.limit, Some(50));
        assert!(matches!(query.test, ChangeTest::BasicEquality));
        assert!(matches!(query.projection, Projection::Fields(_)));

        match &view.source {
            Source::WithAdds { base, adds } => {
                assert!(matches!(**base, Source::Merged { .. }));
                assert_eq!(adds["comments"].link, AddLink::ById("assetId".into()));
                assert_eq!(adds["likes"].link, AddLink::ByRef("asset".into()));
            }
            other => panic!("unexpected layer {other:?}"),
        }
        assert_eq!(view.summaries[0].name, "tags");
    }

    #[test]
    fn test_unknown_operator_names_the_view() {
        let err = parse_definitions(
            r#"{"views": [{"name": "v", "source": {"collection": "a", "where": [["x", "<", 1]]}}]}"#,
        )
        .unwrap_err();
        match err {
            ViewError::Configuration { view, message } => {
                assert_eq!(view, "v");
                assert!(message.contains('<'));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_test_marker_is_rejected() {
        let result = parse_definitions(
            r#"{"views": [{"name": "v", "source": {"collection": "a", "test": "deep"}}]}"#,
        );
        assert!(matches!(result, Err(ViewError::Configuration { .. })));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let result = parse_definitions(
            r#"{"views": [{"name": "v", "source": {"collection": "a", "limit": 0}}]}"#,
        );
        assert!(matches!(result, Err(ViewError::Configuration { .. })));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = parse_definitions(
            r#"{"views": [{"name": "v", "source": {"collection": "a", "filter": []}}]}"#,
        );
        assert!(matches!(result, Err(ViewError::Definition(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        assert!(matches!(
            load_definitions("/nonexistent/views.json"),
            Err(ViewError::Io(_))
        ));
    }
}
