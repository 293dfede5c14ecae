use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::money::Money;
use super::period::Period;

/// Placeholder name for entities the reference registry could not name.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// One expense line item for one entity in one intake period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub identifier: Identifier,
    pub value: Money,
    pub period: Period,
}

impl ExpenseRecord {
    pub fn new(identifier: Identifier, value: Money, period: Period) -> Self {
        ExpenseRecord { identifier, value, period }
    }
}

/// A row of the reference registry of active entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub tax_id: String,
    pub registry_code: Option<String>,
    pub legal_name: String,
    pub region: Option<String>,
    pub line_of_business: Option<String>,
}

/// A validated expense joined with whatever the reference registry knows
/// about its entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedExpense {
    pub tax_id: String,
    pub registry_code: Option<String>,
    pub legal_name: Option<String>,
    pub region: Option<String>,
    pub line_of_business: Option<String>,
    pub value: Money,
    pub period: Period,
}

/// Per-(legal name, region) expense statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub legal_name: String,
    pub region: Option<String>,
    pub total: Money,
    pub mean: Money,
    /// Sample standard deviation; `None` for single-member groups.
    pub stddev: Option<Money>,
}
