use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Identifier,
    Value,
    Category,
    Description,
    TaxId,
    RegistryCode,
    LegalName,
    LineOfBusiness,
    Region,
}

/// How a header name is tested. Headers are trimmed and uppercased first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact(&'static str),
    Prefix(&'static str),
    Contains(&'static str),
}

impl MatchRule {
    pub fn matches(&self, header: &str) -> bool {
        match self {
            MatchRule::Exact(token) => header == *token,
            MatchRule::Prefix(token) => header.starts_with(token),
            MatchRule::Contains(token) => header.contains(token),
        }
    }
}

/// Column rules for disclosure tables, highest priority first per field.
pub const DISCLOSURE_RULES: &[(Field, MatchRule)] = &[
    (Field::Identifier, MatchRule::Prefix("CNPJ")),
    (Field::Identifier, MatchRule::Prefix("REG_ANS")),
    (Field::Value, MatchRule::Exact("VL_SALDO_FINAL")),
    (Field::Value, MatchRule::Prefix("VL_")),
    (Field::Category, MatchRule::Prefix("CD_CONTA")),
    (Field::Description, MatchRule::Contains("DESC")),
];

/// Column rules for the reference registry of active entities.
pub const REGISTRY_RULES: &[(Field, MatchRule)] = &[
    (Field::TaxId, MatchRule::Contains("CNPJ")),
    (Field::RegistryCode, MatchRule::Contains("REGISTRO")),
    (Field::LegalName, MatchRule::Contains("RAZAO")),
    (Field::LegalName, MatchRule::Contains("NOME")),
    (Field::LineOfBusiness, MatchRule::Contains("MODALIDADE")),
    (Field::Region, MatchRule::Exact("UF")),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: HashMap<Field, usize>,
}

impl ResolvedColumns {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }
}

/// Resolves fields to column indices. For each field the first rule that
/// matches any header wins; within a rule the first header in file order
/// wins.
pub fn resolve(headers: &[String], rules: &[(Field, MatchRule)]) -> ResolvedColumns {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_uppercase()).collect();
    let mut columns = HashMap::new();

    for (field, rule) in rules {
        if columns.contains_key(field) {
            continue;
        }
        if let Some(idx) = normalized.iter().position(|h| rule.matches(h)) {
            columns.insert(*field, idx);
        }
    }

    ResolvedColumns { columns }
}

/// The columns a disclosure table must (identifier, value) or may
/// (category, description) provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisclosureColumns {
    pub identifier: usize,
    pub value: usize,
    pub category: Option<usize>,
    pub description: Option<usize>,
}

/// `None` when the table is not a financial disclosure table.
pub fn resolve_disclosure(headers: &[String]) -> Option<DisclosureColumns> {
    let resolved = resolve(headers, DISCLOSURE_RULES);
    Some(DisclosureColumns {
        identifier: resolved.get(Field::Identifier)?,
        value: resolved.get(Field::Value)?,
        category: resolved.get(Field::Category),
        description: resolved.get(Field::Description),
    })
}
