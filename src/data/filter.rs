use std::collections::{BTreeMap, BTreeSet};

use super::model::{Dataset, Scalar};

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of accepted values.
/// A column absent from the map is not constrained.
pub type FilterState = BTreeMap<String, BTreeSet<Scalar>>;

/// Rows accepted by every filter, in order.
///
/// * a column absent from `filters` is unconstrained
/// * an empty set accepts no row
/// * otherwise the row's value must be in the set
///
/// Filters may name column annotations. `n_rows` is the dataset's row
/// count; callers check the shape first.
pub fn filtered_indices(dataset: &Dataset, n_rows: usize, filters: &FilterState) -> Vec<usize> {
    let active: Vec<(Option<&[Scalar]>, &BTreeSet<Scalar>)> = filters
        .iter()
        .filter(|(col, selected)| {
            // Everything selected → no effective filter
            !(!selected.is_empty()
                && dataset
                    .unique_values(col)
                    .is_some_and(|all| all.is_subset(selected)))
        })
        .map(|(col, selected)| (dataset.resolve(col).map(|c| c.values()), selected))
        .collect();

    (0..n_rows)
        .filter(|&row| {
            active.iter().all(|(values, selected)| match values {
                Some(values) => values.get(row).is_some_and(|v| selected.contains(v)),
                // dataset doesn't have this column → include only if Null is selected
                None => selected.contains(&Scalar::Null),
            })
        })
        .collect()
}
