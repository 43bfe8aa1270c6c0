//! Splitting resolved items into cache documents.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::item::ResolvedItem;

/// One cached page, numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub number: usize,
    pub items: &'a [ResolvedItem],
}

/// Number of pages needed for `len` items.
pub fn page_count(len: usize, page_size: NonZeroUsize) -> usize {
    len.div_ceil(page_size.get())
}

/// Splits `items` into consecutive pages of at most `page_size` items.
///
/// Zero items produce zero pages.
pub fn paginate(items: &[ResolvedItem], page_size: NonZeroUsize) -> Vec<Page<'_>> {
    items
        .chunks(page_size.get())
        .enumerate()
        .map(|(index, items)| Page {
            number: index + 1,
            items,
        })
        .collect()
}

/// Groups rows by item id, in first-seen order.
///
/// Fan-out rows share their source document's id, so one group may hold
/// several rows.
pub fn group_by_item_id(items: &[ResolvedItem]) -> Vec<(&str, Vec<&ResolvedItem>)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&ResolvedItem>)> = Vec::new();
    for item in items {
        match positions.get(item.id()) {
            Some(&index) => groups[index].1.push(item),
            None => {
                positions.insert(item.id(), groups.len());
                groups.push((item.id(), vec![item]));
            }
        }
    }
    groups
}
