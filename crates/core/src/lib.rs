pub mod identifier;
pub mod money;
pub mod period;
pub mod record;

pub use identifier::{canonical_tax_id, digits_only, is_valid_tax_id, Identifier, IdentifierKind};
pub use money::Money;
pub use period::{Period, PeriodError, Quarter};
pub use record::{AggregateRow, EnrichedExpense, ExpenseRecord, ReferenceEntity, UNKNOWN_NAME};
