use regfin_core::{digits_only, ReferenceEntity};
use thiserror::Error;

use crate::columns::{resolve, Field, REGISTRY_RULES};
use crate::table::{read_csv, RawTable, TableError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry file unreadable: {0}")]
    Table(#[from] TableError),
    #[error("Registry has no {0} column")]
    MissingColumn(&'static str),
}

fn optional_text(table: &RawTable, row: usize, col: Option<usize>) -> Option<String> {
    let text = table.cell(row, col?).text().trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Builds reference entities from a parsed registry table. Rows without a
/// tax identifier are dropped.
pub fn registry_from_table(table: &RawTable) -> Result<Vec<ReferenceEntity>, RegistryError> {
    let resolved = resolve(&table.headers, REGISTRY_RULES);
    let tax_col = resolved
        .get(Field::TaxId)
        .ok_or(RegistryError::MissingColumn("tax identifier"))?;
    let name_col = resolved
        .get(Field::LegalName)
        .ok_or(RegistryError::MissingColumn("legal name"))?;
    let registry_col = resolved.get(Field::RegistryCode);
    let business_col = resolved.get(Field::LineOfBusiness);
    let region_col = resolved.get(Field::Region);

    let entities: Vec<ReferenceEntity> = (0..table.len())
        .filter_map(|row| {
            let tax_id = digits_only(&table.cell(row, tax_col).text());
            if tax_id.is_empty() {
                return None;
            }
            Some(ReferenceEntity {
                tax_id,
                registry_code: optional_text(table, row, registry_col),
                legal_name: table.cell(row, name_col).text().trim().to_string(),
                region: optional_text(table, row, region_col),
                line_of_business: optional_text(table, row, business_col),
            })
        })
        .collect();

    tracing::debug!("Registry parsed: {} entities from {} rows", entities.len(), table.len());
    Ok(entities)
}

/// Parses the semicolon-delimited, Latin-1 registry file.
pub fn parse_registry(bytes: &[u8]) -> Result<Vec<ReferenceEntity>, RegistryError> {
    let table = read_csv(bytes)?;
    registry_from_table(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CADOP: &[u8] = b"Registro_ANS;CNPJ;Razao_Social;Nome_Fantasia;Modalidade;Cidade;UF\n\
419761;19.541.931/0001-25;SA\xDADE PLENA LTDA;PLENA;Medicina de Grupo;Recife;PE\n\
;;SEM CNPJ;;;;\n\
005711;11.222.333/0001-81;ALFA COOPERATIVA;;Cooperativa M\xE9dica;Natal;\n";

    #[test]
    fn parses_latin1_registry() {
        let entities = parse_registry(CADOP).unwrap();
        assert_eq!(entities.len(), 2);

        assert_eq!(entities[0].tax_id, "19541931000125");
        assert_eq!(entities[0].registry_code.as_deref(), Some("419761"));
        assert_eq!(entities[0].legal_name, "SAÚDE PLENA LTDA");
        assert_eq!(entities[0].region.as_deref(), Some("PE"));
        assert_eq!(entities[0].line_of_business.as_deref(), Some("Medicina de Grupo"));

        assert_eq!(entities[1].registry_code.as_deref(), Some("005711"));
        assert_eq!(entities[1].line_of_business.as_deref(), Some("Cooperativa Médica"));
        assert_eq!(entities[1].region, None);
    }

    #[test]
    fn registry_without_name_column_is_unusable() {
        let err = parse_registry(b"CNPJ;UF\n1;SP\n").unwrap_err();
        assert!(matches!(err, RegistryError::MissingColumn("legal name")));
    }

    #[test]
    fn registry_without_tax_id_column_is_unusable() {
        let err = parse_registry(b"REGISTRO;RAZAO_SOCIAL\n1;X\n").unwrap_err();
        assert!(matches!(err, RegistryError::MissingColumn("tax identifier")));
    }
}
