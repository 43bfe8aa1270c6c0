//! View definitions: a primary source plus optional summary arrays.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::item::ResolvedItem;
use crate::source::Source;
use crate::{Result, ViewError};

/// Summary field holding the number of cached page documents.
pub const PAGE_COUNT_FIELD: &str = "pageCount";

/// Post-resolution inclusion test for summary rows.
pub type FilterFn = dyn Fn(&ResolvedItem, &SummaryContext<'_>) -> bool + Send + Sync;

/// What a summary filter can see: the already-resolved primary items.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    pub view: &'a str,
    pub items: &'a [ResolvedItem],
}

/// A named array written to the view's summary document.
#[derive(Clone)]
pub struct SummarySource {
    pub name: String,
    pub source: Source,
    pub filter: Option<Arc<FilterFn>>,
}

impl SummarySource {
    /// Creates a summary array named `name` from `source`.
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            source,
            filter: None,
        }
    }

    /// Keeps only rows accepted by `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ResolvedItem, &SummaryContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl std::fmt::Debug for SummarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarySource")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A named, cached, paginated projection of one or more collections.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    pub name: String,
    pub source: Source,
    pub summaries: Vec<SummarySource>,
    /// Write one document per item id instead of ordinal pages.
    pub use_item_id_as_document_id: bool,
}

impl ViewDefinition {
    /// Creates a paged view over `source`.
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            source,
            summaries: Vec::new(),
            use_item_id_as_document_id: false,
        }
    }

    /// Adds a summary array.
    pub fn summary(mut self, summary: SummarySource) -> Self {
        self.summaries.push(summary);
        self
    }

    /// Keys cached documents by item id.
    pub fn keyed_by_item_id(mut self) -> Self {
        self.use_item_id_as_document_id = true;
        self
    }

    /// Checks every source of the view.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ViewError::configuration(&self.name, "view name must not be empty"));
        }
        if self.name.contains('/') {
            return Err(ViewError::configuration(
                &self.name,
                "view name must not contain '/'",
            ));
        }

        self.source
            .validate()
            .map_err(|message| ViewError::configuration(&self.name, message))?;

        let mut names = BTreeSet::new();
        for summary in &self.summaries {
            if summary.name.trim().is_empty() || summary.name == PAGE_COUNT_FIELD {
                return Err(ViewError::configuration(
                    &self.name,
                    format!("invalid summary name {:?}", summary.name),
                ));
            }
            if !names.insert(summary.name.as_str()) {
                return Err(ViewError::configuration(
                    &self.name,
                    format!("duplicate summary name {:?}", summary.name),
                ));
            }
            summary.source.validate().map_err(|message| {
                ViewError::configuration(&self.name, format!("summary {:?}: {message}", summary.name))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_view_passes() {
        let view = ViewDefinition::new("approved", Source::collection("assets"))
            .summary(SummarySource::new("tags", Source::collection("tags")));
        assert!(view.validate().is_ok());
    }

    #[test]
    fn test_reserved_summary_name_fails() {
        let view = ViewDefinition::new("approved", Source::collection("assets"))
            .summary(SummarySource::new("pageCount", Source::collection("tags")));
        let err = view.validate().unwrap_err();
        assert_eq!(err.view(), Some("approved"));
    }

    #[test]
    fn test_duplicate_summary_name_fails() {
        let view = ViewDefinition::new("approved", Source::collection("assets"))
            .summary(SummarySource::new("tags", Source::collection("tags")))
            .summary(SummarySource::new("tags", Source::collection("labels")));
        assert!(matches!(
            view.validate(),
            Err(ViewError::Configuration { .. })
        ));
    }

    #[test]
    fn test_malformed_source_reports_view_name() {
        let view = ViewDefinition::new("broken", Source::collection("assets").limit(0));
        match view.validate() {
            Err(ViewError::Configuration { view, message }) => {
                assert_eq!(view, "broken");
                assert!(message.contains("limit"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
