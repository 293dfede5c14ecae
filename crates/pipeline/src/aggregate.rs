use regfin_core::{AggregateRow, EnrichedExpense, Money, UNKNOWN_NAME};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::HashMap;

type GroupKey = (String, Option<String>);

/// Groups expenses by (legal name, region) and computes total, mean and
/// sample standard deviation per group, largest total first.
///
/// Expenses without a legal name are grouped under [`UNKNOWN_NAME`]. Groups
/// with equal totals keep the order in which they were first seen.
pub fn aggregate(expenses: &[EnrichedExpense]) -> Vec<AggregateRow> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Decimal>)> = Vec::new();

    for expense in expenses {
        let key = (
            expense
                .legal_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            expense.region.clone(),
        );
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(expense.value.as_decimal());
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|((legal_name, region), values)| {
            let total = values
                .iter()
                .fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v));
            let mean = total / Decimal::from(values.len());
            AggregateRow {
                legal_name,
                region,
                total: Money::from_decimal(total),
                mean: Money::from_decimal(mean),
                stddev: sample_stddev(&values, mean).map(Money::from_decimal),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

/// Bessel-corrected standard deviation; undefined below two samples.
/// Squares that overflow `Decimal` are computed in `f64` instead.
fn sample_stddev(values: &[Decimal], mean: Decimal) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let squares = values.iter().try_fold(Decimal::ZERO, |acc, v| {
        let d = v.checked_sub(mean)?;
        acc.checked_add(d.checked_mul(d)?)
    });
    match squares {
        Some(squares) => (squares / Decimal::from(values.len() - 1)).sqrt(),
        None => stddev_f64(values),
    }
}

fn stddev_f64(values: &[Decimal]) -> Option<Decimal> {
    let values: Vec<f64> = values.iter().filter_map(|v| v.to_f64()).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Decimal::from_f64((squares / (n - 1.0)).sqrt())
}
