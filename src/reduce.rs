/// Common-metric reduction: metric names present in every member of a
/// collection. Comparative charts can only be built over this set.
use crate::table::EntityMetrics;
use std::collections::BTreeSet;

/// Intersect the key sets of every table in `tables`.
///
/// An empty collection yields an empty set, meaning there is nothing to chart.
pub fn common_metrics<'a, I>(tables: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a EntityMetrics>,
{
    let mut iter = tables.into_iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };

    let mut common: BTreeSet<String> = first.keys().cloned().collect();
    for table in iter {
        common.retain(|k| table.contains_key(k));
        if common.is_empty() {
            break;
        }
    }
    common
}
