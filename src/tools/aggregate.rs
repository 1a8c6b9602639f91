//! Aggregate and transform kernels behind [`basic_tool`](super::basic_tool).

use std::collections::BTreeMap;

use crate::data::model::{DType, Scalar};
use crate::error::ComputationError;

use super::Metric;

/// Row indices per non-null group key.
pub(crate) fn group_rows(keys: &[Scalar]) -> BTreeMap<&Scalar, Vec<usize>> {
    let mut groups: BTreeMap<&Scalar, Vec<usize>> = BTreeMap::new();
    for (row, key) in keys.iter().enumerate() {
        if !key.is_null() {
            groups.entry(key).or_default().push(row);
        }
    }
    groups
}

/// Reduce the non-null values of one group to a single scalar.
pub(crate) fn aggregate<'a>(
    metric: Metric,
    dtype: DType,
    values: impl Iterator<Item = &'a Scalar>,
) -> Result<Scalar, ComputationError> {
    let present: Vec<&Scalar> = values.filter(|v| !v.is_null()).collect();
    if metric == Metric::Count {
        return Ok(Scalar::Integer(present.len() as i64));
    }
    if present.is_empty() {
        return Ok(Scalar::Null);
    }

    let result = match metric {
        Metric::Min => present.iter().min().map_or(Scalar::Null, |v| (*v).clone()),
        Metric::Max => present.iter().max().map_or(Scalar::Null, |v| (*v).clone()),
        Metric::Sum if dtype == DType::Integer => {
            let mut total: i64 = 0;
            for v in &present {
                if let Scalar::Integer(i) = v {
                    total = total
                        .checked_add(*i)
                        .ok_or_else(|| ComputationError::Overflow(metric.to_string()))?;
                }
            }
            Scalar::Integer(total)
        }
        _ => {
            let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
            numeric_aggregate(metric, &numbers).map_or(Scalar::Null, Scalar::Float)
        }
    };
    Ok(result)
}

fn numeric_aggregate(metric: Metric, numbers: &[f64]) -> Option<f64> {
    match metric {
        Metric::Sum => Some(numbers.iter().sum()),
        Metric::Mean => mean(numbers),
        Metric::Median => median(numbers),
        Metric::Std => std_dev(numbers),
        _ => None,
    }
}

fn mean(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        None
    } else {
        Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }
}

fn median(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n − 1).
fn std_dev(numbers: &[f64]) -> Option<f64> {
    if numbers.len() < 2 {
        return None;
    }
    let m = mean(numbers)?;
    let ss: f64 = numbers.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (numbers.len() - 1) as f64).sqrt())
}

/// Per-row transform, computed within each group (or over all rows when
/// `groups` is `None`). Rows with a null value or null key get `Null`.
pub(crate) fn transform(
    metric: Metric,
    values: &[Scalar],
    groups: Option<&[Scalar]>,
) -> Vec<Scalar> {
    let mut out = vec![Scalar::Null; values.len()];
    let partitions: Vec<Vec<usize>> = match groups {
        Some(keys) => group_rows(keys).into_values().collect(),
        None => vec![(0..values.len()).collect()],
    };

    for rows in partitions {
        let present: Vec<(usize, f64)> = rows
            .into_iter()
            .filter_map(|row| values[row].as_f64().map(|x| (row, x)))
            .collect();
        for (row, value) in transform_group(metric, &present) {
            out[row] = Scalar::Float(value);
        }
    }
    out
}

fn transform_group(metric: Metric, present: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let numbers: Vec<f64> = present.iter().map(|(_, x)| *x).collect();
    match metric {
        Metric::ZScore => {
            let (Some(m), Some(sd)) = (mean(&numbers), std_dev(&numbers)) else {
                return Vec::new();
            };
            present
                .iter()
                .map(|&(row, x)| (row, if sd == 0.0 { 0.0 } else { (x - m) / sd }))
                .collect()
        }
        Metric::MinMax => {
            let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            present
                .iter()
                .map(|&(row, x)| {
                    if range.abs() < f64::EPSILON {
                        (row, 0.0)
                    } else {
                        (row, (x - min) / range)
                    }
                })
                .collect()
        }
        Metric::Rank => average_ranks(present),
        _ => Vec::new(),
    }
}

/// 1-based ranks; ties share the mean of the ranks they span.
fn average_ranks(present: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let mut order: Vec<(usize, f64)> = present.to_vec();
    order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut ranks = Vec::with_capacity(order.len());
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && order[end].1 == order[start].1 {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        let rank = (start + 1 + end) as f64 / 2.0;
        ranks.extend(order[start..end].iter().map(|&(row, _)| (row, rank)));
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(values: &[f64]) -> Vec<Scalar> {
        values.iter().map(|&v| Scalar::Float(v)).collect()
    }

    #[test]
    fn aggregates_skip_nulls() {
        let values = vec![Scalar::Float(1.0), Scalar::Null, Scalar::Float(3.0)];
        let agg = |m| aggregate(m, DType::Float, values.iter()).unwrap();
        assert_eq!(agg(Metric::Sum), Scalar::Float(4.0));
        assert_eq!(agg(Metric::Mean), Scalar::Float(2.0));
        assert_eq!(agg(Metric::Median), Scalar::Float(2.0));
        assert_eq!(agg(Metric::Count), Scalar::Integer(2));
        assert_eq!(agg(Metric::Max), Scalar::Float(3.0));
        assert_eq!(agg(Metric::Std), Scalar::Float(2.0f64.sqrt()));
    }

    #[test]
    fn integer_sum_stays_integer_and_checks_overflow() {
        let values = vec![Scalar::Integer(2), Scalar::Integer(3)];
        assert_eq!(
            aggregate(Metric::Sum, DType::Integer, values.iter()).unwrap(),
            Scalar::Integer(5)
        );

        let values = vec![Scalar::Integer(i64::MAX), Scalar::Integer(1)];
        assert!(matches!(
            aggregate(Metric::Sum, DType::Integer, values.iter()),
            Err(ComputationError::Overflow(_))
        ));
    }

    #[test]
    fn empty_input_gives_null_except_count() {
        let values = vec![Scalar::Null];
        assert_eq!(
            aggregate(Metric::Mean, DType::Float, values.iter()).unwrap(),
            Scalar::Null
        );
        assert_eq!(
            aggregate(Metric::Count, DType::Float, values.iter()).unwrap(),
            Scalar::Integer(0)
        );
        let one = floats(&[5.0]);
        assert_eq!(
            aggregate(Metric::Std, DType::Float, one.iter()).unwrap(),
            Scalar::Null
        );
    }

    #[test]
    fn min_max_scaling_within_groups() {
        let values = floats(&[1.0, 3.0, 10.0, 10.0]);
        let keys = vec![
            Scalar::from("a"),
            Scalar::from("a"),
            Scalar::from("b"),
            Scalar::from("b"),
        ];
        assert_eq!(
            transform(Metric::MinMax, &values, Some(&keys)),
            floats(&[0.0, 1.0, 0.0, 0.0])
        );
    }

    #[test]
    fn zscore_of_a_single_value_is_null() {
        let values = vec![Scalar::Float(4.0), Scalar::Null];
        assert_eq!(
            transform(Metric::ZScore, &values, None),
            vec![Scalar::Null, Scalar::Null]
        );
        assert_eq!(
            transform(Metric::ZScore, &floats(&[1.0, 3.0]), None),
            floats(&[-1.0 / 2.0f64.sqrt(), 1.0 / 2.0f64.sqrt()])
        );
    }

    #[test]
    fn ties_share_the_average_rank() {
        let values = floats(&[10.0, 20.0, 10.0, 5.0]);
        assert_eq!(
            transform(Metric::Rank, &values, None),
            floats(&[2.5, 4.0, 2.5, 1.0])
        );
    }
}
