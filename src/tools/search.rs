//! Name lookup against a text column, exact or fuzzy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::model::{Annotation, Column, DType, Dataset, Scalar};
use crate::error::ComputationError;

/// Options for [`find_matches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Text column to search.
    pub column: String,
    pub exact: bool,
    /// Minimum token-set ratio (0–100) for fuzzy matches.
    pub fuzzy_threshold: u8,
    /// Keep at most this many rows.
    pub limit: Option<usize>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            column: "alias_name".to_string(),
            exact: true,
            fuzzy_threshold: 90,
            limit: None,
        }
    }
}

impl MatchOptions {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }

    pub fn fuzzy(mut self, threshold: u8) -> Self {
        self.exact = false;
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Rows whose `options.column` matches `query`.
///
/// Exact lookups compare whole values. Fuzzy lookups compare lowercased,
/// space-free forms and keep rows scoring at least the threshold, best
/// first; the result carries `fuzzy_score` and `edit_distance` column
/// annotations. No match gives an empty dataset.
pub fn find_matches(
    dataset: &Dataset,
    query: &str,
    options: &MatchOptions,
) -> Result<Dataset, ComputationError> {
    let n_rows = dataset
        .row_count()
        .map_err(ComputationError::InconsistentShape)?;
    let column = dataset
        .resolve(&options.column)
        .ok_or_else(|| ComputationError::MissingColumn(options.column.clone()))?;
    if column.dtype() != DType::String {
        return Err(ComputationError::IncompatibleType {
            column: options.column.clone(),
            dtype: column.dtype(),
            operation: "name lookup".to_string(),
        });
    }
    if options.fuzzy_threshold > 100 {
        return Err(ComputationError::InvalidOption(format!(
            "fuzzy_threshold {} is above 100",
            options.fuzzy_threshold
        )));
    }
    let limit = options.limit.unwrap_or(n_rows);

    if options.exact {
        let rows: Vec<usize> = column
            .values()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_str() == Some(query))
            .map(|(row, _)| row)
            .take(limit)
            .collect();
        log::debug!("exact lookup of '{query}': {} rows", rows.len());
        return Ok(dataset.select_rows(&rows));
    }

    for name in ["fuzzy_score", "edit_distance"] {
        if dataset.column(name).is_some() {
            return Err(ComputationError::NameConflict(name.to_string()));
        }
    }

    let needle = clean(query);
    let mut scored: Vec<(usize, u8, usize)> = column
        .values()
        .iter()
        .enumerate()
        .filter_map(|(row, v)| {
            let candidate = clean(v.as_str()?);
            let score = token_set_ratio(&candidate, &needle);
            (score >= options.fuzzy_threshold)
                .then(|| (row, score, levenshtein(&candidate, &needle)))
        })
        .collect();

    if scored.is_empty() {
        log::warn!("Drug {query} not found.");
        return Ok(dataset.select_rows(&[]));
    }

    // stable: equal scores keep their row order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(limit);

    let rows: Vec<usize> = scored.iter().map(|(row, _, _)| *row).collect();
    let mut out = dataset.select_rows(&rows);
    out.attach(
        "fuzzy_score",
        Annotation::Column(Column::from_values(
            "fuzzy_score",
            scored.iter().map(|(_, score, _)| i64::from(*score)),
        )),
    );
    out.attach(
        "edit_distance",
        Annotation::Column(Column::from_values(
            "edit_distance",
            scored.iter().map(|(_, _, d)| *d as i64),
        )),
    );
    log::debug!("fuzzy lookup of '{query}': {} rows", rows.len());
    Ok(out)
}

fn clean(s: &str) -> String {
    s.to_lowercase().replace(' ', "")
}

/// Levenshtein distance in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Similarity 0–100 from the insertion/deletion distance. Empty input scores 0.
fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // longest common subsequence
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let lcs = prev[b.len()];
    let score = 200.0 * lcs as f64 / (a.len() + b.len()) as f64;
    score.round() as u8
}

/// Token-set similarity 0–100: word order and repeated words are ignored,
/// and one side being a subset of the other scores 100.
///
/// Both sides are lowercased and split on anything that is not alphanumeric.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens = |s: &str| -> BTreeSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0;
    }

    let join = |set: Vec<&String>| -> String {
        set.into_iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    };
    let common = join(ta.intersection(&tb).collect());
    let only_a = join(ta.difference(&tb).collect());
    let only_b = join(tb.difference(&ta).collect());

    let combined_a = format!("{common} {only_a}").trim().to_string();
    let combined_b = format!("{common} {only_b}").trim().to_string();

    ratio(&common, &combined_a)
        .max(ratio(&common, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}
