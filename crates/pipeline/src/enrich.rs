use regfin_core::{canonical_tax_id, is_valid_tax_id, EnrichedExpense, ExpenseRecord, ReferenceEntity};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub accepted: usize,
    pub invalid_identifier: usize,
    pub non_positive_value: usize,
    /// Accepted records with no reference entry.
    pub without_reference: usize,
}

/// Keeps records with a valid tax identifier and a positive value, and
/// attaches what the reference registry knows about each entity.
pub fn enrich(
    records: &[ExpenseRecord],
    reference: &[ReferenceEntity],
) -> (Vec<EnrichedExpense>, ValidationReport) {
    let mut by_tax_id: HashMap<String, &ReferenceEntity> = HashMap::new();
    for entity in reference {
        by_tax_id.entry(canonical_tax_id(&entity.tax_id)).or_insert(entity);
    }

    let mut report = ValidationReport::default();
    let mut enriched = Vec::new();

    for record in records {
        let Some(tax_id) = record
            .identifier
            .tax_id()
            .map(canonical_tax_id)
            .filter(|id| is_valid_tax_id(id))
        else {
            report.invalid_identifier += 1;
            continue;
        };
        if !record.value.is_positive() {
            report.non_positive_value += 1;
            continue;
        }

        let entity = by_tax_id.get(&tax_id);
        if entity.is_none() {
            report.without_reference += 1;
        }
        report.accepted += 1;

        enriched.push(EnrichedExpense {
            registry_code: entity.and_then(|e| e.registry_code.clone()),
            legal_name: entity
                .map(|e| e.legal_name.clone())
                .filter(|name| !name.is_empty()),
            region: entity.and_then(|e| e.region.clone()),
            line_of_business: entity.and_then(|e| e.line_of_business.clone()),
            tax_id,
            value: record.value,
            period: record.period,
        });
    }

    (enriched, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regfin_core::{Identifier, Money, Period, Quarter};

    fn record(identifier: Identifier, cents: i64) -> ExpenseRecord {
        ExpenseRecord::new(identifier, Money::from_cents(cents), Period::new(2024, Quarter::Q2))
    }

    fn reference() -> Vec<ReferenceEntity> {
        vec![ReferenceEntity {
            tax_id: "00000000000191".into(),
            registry_code: Some("000477".into()),
            legal_name: "BANCO SAUDE".into(),
            region: Some("DF".into()),
            line_of_business: Some("Autogestão".into()),
        }]
    }

    #[test]
    fn joins_reference_by_canonical_tax_id() {
        let records = vec![record(Identifier::TaxId("191".into()), 5000)];
        let (enriched, report) = enrich(&records, &reference());

        assert_eq!(report.accepted, 1);
        assert_eq!(enriched[0].tax_id, "00000000000191");
        assert_eq!(enriched[0].legal_name.as_deref(), Some("BANCO SAUDE"));
        assert_eq!(enriched[0].region.as_deref(), Some("DF"));
        assert_eq!(enriched[0].registry_code.as_deref(), Some("000477"));
    }

    #[test]
    fn rejects_invalid_identifiers_and_values() {
        let records = vec![
            record(Identifier::TaxId("11111111111111".into()), 100),
            record(Identifier::RegistryCode("419761".into()), 100),
            record(Identifier::Unresolved("11222333000181".into()), 100),
            record(Identifier::TaxId("11222333000181".into()), 0),
            record(Identifier::TaxId("11222333000181".into()), 100),
        ];
        let (enriched, report) = enrich(&records, &[]);

        assert_eq!(enriched.len(), 1);
        assert_eq!(report.invalid_identifier, 3);
        assert_eq!(report.non_positive_value, 1);
        assert_eq!(report.without_reference, 1);
        assert_eq!(enriched[0].legal_name, None);
    }
}
