use regfin_core::{ExpenseRecord, Identifier, ReferenceEntity};
use serde::Serialize;
use std::collections::HashMap;

/// Identifiers whose median length is below this are registry codes.
pub const TAX_ID_MIN_MEDIAN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    TaxId,
    RegistryCode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub scheme: Scheme,
    pub median_length: Option<f64>,
    pub matched: usize,
    pub unmatched: usize,
}

/// Median length of the non-empty unresolved identifiers in a batch.
pub fn median_length(records: &[ExpenseRecord]) -> Option<f64> {
    let mut lengths: Vec<usize> = records
        .iter()
        .filter(|r| matches!(r.identifier, Identifier::Unresolved(_)))
        .map(|r| r.identifier.value().len())
        .filter(|len| *len > 0)
        .collect();
    if lengths.is_empty() {
        return None;
    }
    lengths.sort_unstable();

    let mid = lengths.len() / 2;
    let median = if lengths.len() % 2 == 0 {
        (lengths[mid - 1] + lengths[mid]) as f64 / 2.0
    } else {
        lengths[mid] as f64
    };
    Some(median)
}

/// One decision for the whole batch. A batch with no identifiers at all is
/// left as tax identifiers for the validator to reject.
pub fn detect_scheme(records: &[ExpenseRecord]) -> Scheme {
    match median_length(records) {
        Some(median) if median < TAX_ID_MIN_MEDIAN_LEN as f64 => Scheme::RegistryCode,
        _ => Scheme::TaxId,
    }
}

/// Join key for registry codes: the integer value when numeric (so
/// `"005711"` and `"5711"` meet), the trimmed text otherwise.
pub fn registry_key(code: &str) -> String {
    let code = code.trim();
    match code.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => code.to_string(),
    }
}

/// Rewrites unresolved identifiers according to the batch scheme. Registry
/// codes with a reference match become the entity's tax identifier; the
/// rest are kept as registry codes, never dropped.
pub fn reconcile(
    records: Vec<ExpenseRecord>,
    reference: &[ReferenceEntity],
) -> (Vec<ExpenseRecord>, ReconcileReport) {
    let median = median_length(&records);
    let scheme = detect_scheme(&records);
    let mut report = ReconcileReport {
        scheme,
        median_length: median,
        matched: 0,
        unmatched: 0,
    };

    let mut by_registry: HashMap<String, &str> = HashMap::new();
    if scheme == Scheme::RegistryCode {
        for entity in reference {
            if let Some(code) = entity.registry_code.as_deref() {
                let key = registry_key(code);
                if !key.is_empty() {
                    by_registry.entry(key).or_insert(entity.tax_id.as_str());
                }
            }
        }
    }

    let records = records
        .into_iter()
        .map(|mut record| {
            let Identifier::Unresolved(raw) = &record.identifier else {
                return record;
            };
            record.identifier = match scheme {
                Scheme::TaxId => Identifier::TaxId(raw.clone()),
                Scheme::RegistryCode => match by_registry.get(&registry_key(raw)) {
                    Some(tax_id) => {
                        report.matched += 1;
                        Identifier::TaxId(tax_id.to_string())
                    }
                    None => {
                        report.unmatched += 1;
                        Identifier::RegistryCode(raw.clone())
                    }
                },
            };
            record
        })
        .collect();

    (records, report)
}
