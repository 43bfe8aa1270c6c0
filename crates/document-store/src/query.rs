use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::predicate::{Predicate, compare_values, matches};

/// Sort direction of an order clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

/// Order clause: a top-level field plus direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Order {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Compares two documents under this clause. Missing fields sort first.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// Builder for collection queries.
///
/// Results are filtered by every predicate, sorted by the order clause
/// (ties and unordered queries fall back to document id), then truncated
/// to `limit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    /// Collection to read.
    pub collection: String,

    /// Conditions every returned document satisfies.
    pub predicates: Vec<Predicate>,

    /// Optional sort clause.
    pub order: Option<Order>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query returning every document of `collection`.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds a condition.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds several conditions.
    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Sets the order clause.
    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets an optional order clause.
    pub fn maybe_order(mut self, order: Option<Order>) -> Self {
        self.order = order;
        self
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets an optional limit.
    pub fn maybe_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Applies filter, order, and limit to documents already scoped to the collection.
    ///
    /// Backends that cannot push the whole query down finish it here.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = documents
            .into_iter()
            .filter(|d| matches(Some(d), &self.predicates))
            .collect();

        docs.sort_by(|a, b| {
            self.order
                .as_ref()
                .map_or(Ordering::Equal, |o| o.compare(a, b))
                .then_with(|| a.id().cmp(b.id()))
        });

        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}
