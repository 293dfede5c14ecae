use regfin_core::{digits_only, ExpenseRecord, Identifier, Money, Period};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::columns::{resolve_disclosure, DisclosureColumns};
use crate::table::{Cell, RawTable};
use crate::util::{decimal_from_f64, parse_locale_decimal};

/// Account codes of the expense class start with this digit.
pub const EXPENSE_CLASS_PREFIX: &str = "4";

/// Description terms that mark an expense row when no account code exists.
pub const EXPENSE_TERMS: &[&str] = &["DESPESA", "EVENTO", "SINISTRO"];

/// Why a table produced no usable rows.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Skip {
    #[error("no identifier or value column")]
    MissingColumns,
    #[error("no expense rows")]
    NoExpenseRows,
    #[error("no parseable values")]
    NoParseableValues,
}

fn is_expense_row(table: &RawTable, row: usize, cols: &DisclosureColumns) -> bool {
    if let Some(category) = cols.category {
        table.cell(row, category).text().trim().starts_with(EXPENSE_CLASS_PREFIX)
    } else if let Some(description) = cols.description {
        let text = table.cell(row, description).text().to_uppercase();
        EXPENSE_TERMS.iter().any(|term| text.contains(term))
    } else {
        // Nothing to filter on; accept everything.
        true
    }
}

fn parse_value(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => parse_locale_decimal(s),
        Cell::Number(n) => decimal_from_f64(*n),
    }
}

/// Extracts expense records from one disclosure table, or says why it could not.
pub fn normalize_table(table: &RawTable, period: Period) -> Result<Vec<ExpenseRecord>, Skip> {
    let cols = resolve_disclosure(&table.headers).ok_or(Skip::MissingColumns)?;

    let expense_rows: Vec<usize> = (0..table.len())
        .filter(|&row| is_expense_row(table, row, &cols))
        .collect();
    if expense_rows.is_empty() {
        return Err(Skip::NoExpenseRows);
    }

    let records: Vec<ExpenseRecord> = expense_rows
        .into_iter()
        .filter_map(|row| {
            let value = Money::from_decimal(parse_value(table.cell(row, cols.value))?);
            // Amounts beyond the storable cents range count as unparseable.
            value.to_cents()?;
            let identifier = digits_only(&table.cell(row, cols.identifier).text());
            Some(ExpenseRecord::new(
                Identifier::Unresolved(identifier),
                value,
                period,
            ))
        })
        .collect();
    if records.is_empty() {
        return Err(Skip::NoParseableValues);
    }

    Ok(records)
}

/// Expense records of one table; empty when the table has none.
pub fn normalize(table: &RawTable, period: Period) -> Vec<ExpenseRecord> {
    normalize_table(table, period).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::read_csv;
    use regfin_core::Quarter;

    fn period() -> Period {
        Period::new(2024, Quarter::Q3)
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn keeps_only_expense_class_rows() {
        let table = RawTable::new(
            vec!["CD_CONTA".into(), "VL_SALDO_FINAL".into(), "CNPJ".into()],
            vec![
                vec![text("4111"), text("1.234,56"), text("11.222.333/0001-81")],
                vec![text("3999"), text("500,00"), text("11.222.333/0001-81")],
            ],
        );

        let records = normalize(&table, period());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier, Identifier::Unresolved("11222333000181".into()));
        assert_eq!(records[0].value, Money::from_cents(123456));
        assert_eq!(records[0].period, period());
    }

    #[test]
    fn description_filter_when_no_account_code() {
        let data = "REG_ANS;DESCRICAO;VL_SALDO_FINAL\n\
                    123456;Eventos indenizáveis líquidos;100,00\n\
                    123456;Receita de contraprestações;900,00\n\
                    654321;Despesas administrativas;50,00\n";
        let table = read_csv(data.as_bytes()).unwrap();

        let records = normalize(&table, period());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].identifier.value(), "654321");
        assert_eq!(records[1].value, Money::from_cents(5000));
    }

    #[test]
    fn no_filter_column_keeps_every_row() {
        let table = RawTable::new(
            vec!["CNPJ".into(), "VL_TOTAL".into()],
            vec![vec![text("1"), text("1,00")], vec![text("2"), text("2,00")]],
        );
        assert_eq!(normalize(&table, period()).len(), 2);
    }

    #[test]
    fn unparseable_values_are_dropped() {
        let table = RawTable::new(
            vec!["CNPJ".into(), "VL_SALDO_FINAL".into()],
            vec![
                vec![text("1"), text("abc")],
                vec![text("2"), Cell::Empty],
                vec![text("3"), text("-7,50")],
            ],
        );
        let records = normalize(&table, period());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, Money::from_cents(750));
    }

    #[test]
    fn oversized_values_are_dropped() {
        let table = RawTable::new(
            vec!["CNPJ".into(), "VL_SALDO_FINAL".into()],
            vec![
                vec![text("1"), text("500.000.000.000.000.000.000.000.000,00")],
                vec![text("2"), text("1,00")],
            ],
        );
        let records = normalize(&table, period());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier.value(), "2");

        let only_huge = RawTable::new(
            vec!["CNPJ".into(), "VL_SALDO_FINAL".into()],
            vec![vec![text("1"), text("500.000.000.000.000.000.000.000.000,00")]],
        );
        assert_eq!(normalize_table(&only_huge, period()), Err(Skip::NoParseableValues));
    }

    #[test]
    fn account_code_wins_over_description() {
        let table = RawTable::new(
            vec![
                "CNPJ".into(),
                "CD_CONTA_CONTABIL".into(),
                "DESCRICAO".into(),
                "VL_SALDO_FINAL".into(),
            ],
            vec![
                vec![text("1"), text("3111"), text("DESPESAS ADMINISTRATIVAS"), text("10,00")],
                vec![text("2"), text("4111"), text("RECEITAS"), text("20,00")],
            ],
        );
        let records = normalize(&table, period());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier.value(), "2");
        assert_eq!(records[0].value, Money::from_cents(2000));
    }

    #[test]
    fn spreadsheet_numbers_are_not_locale_parsed() {
        let table = RawTable::new(
            vec!["REG_ANS".into(), "CD_CONTA_CONTABIL".into(), "VL_SALDO_FINAL".into()],
            vec![vec![Cell::Number(123456.0), Cell::Number(41.0), Cell::Number(1234.56)]],
        );
        let records = normalize(&table, period());
        assert_eq!(records[0].identifier.value(), "123456");
        assert_eq!(records[0].value, Money::from_cents(123456));
    }

    #[test]
    fn skip_reasons() {
        let no_cols = RawTable::new(vec!["A".into()], vec![vec![text("1")]]);
        assert_eq!(normalize_table(&no_cols, period()), Err(Skip::MissingColumns));

        let no_expense = RawTable::new(
            vec!["CNPJ".into(), "CD_CONTA".into(), "VL_X".into()],
            vec![vec![text("1"), text("3111"), text("1,00")]],
        );
        assert_eq!(normalize_table(&no_expense, period()), Err(Skip::NoExpenseRows));

        let no_values = RawTable::new(
            vec!["CNPJ".into(), "VL_X".into()],
            vec![vec![text("1"), text("-")]],
        );
        assert_eq!(normalize_table(&no_values, period()), Err(Skip::NoParseableValues));
        assert!(normalize(&no_values, period()).is_empty());
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let data = "CNPJ;CD_CONTA;VL_SALDO_FINAL\n11222333000181;411;10,00\n33000167000101;412;\"2.000,01\"\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(normalize(&table, period()), normalize(&table, period()));
    }
}
