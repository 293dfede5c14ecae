use async_trait::async_trait;
use regfin_core::{AggregateRow, ExpenseRecord, ReferenceEntity};
use std::sync::Mutex;

use crate::db::{self, DbPool, StorageError};

/// Read-all / replace-all access to the three persisted tables. Every
/// `replace_*` is atomic: either all new rows land or the old rows stay.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn read_expenses(&self) -> Result<Vec<ExpenseRecord>, StorageError>;
    async fn replace_expenses(&self, records: &[ExpenseRecord]) -> Result<(), StorageError>;

    async fn read_entities(&self) -> Result<Vec<ReferenceEntity>, StorageError>;
    async fn replace_entities(&self, entities: &[ReferenceEntity]) -> Result<(), StorageError>;

    async fn read_aggregates(&self) -> Result<Vec<AggregateRow>, StorageError>;
    async fn replace_aggregates(&self, rows: &[AggregateRow]) -> Result<(), StorageError>;
}

pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn read_expenses(&self) -> Result<Vec<ExpenseRecord>, StorageError> {
        db::get_expense_records(&self.pool).await
    }

    async fn replace_expenses(&self, records: &[ExpenseRecord]) -> Result<(), StorageError> {
        db::replace_expense_records(&self.pool, records).await
    }

    async fn read_entities(&self) -> Result<Vec<ReferenceEntity>, StorageError> {
        db::get_active_entities(&self.pool).await
    }

    async fn replace_entities(&self, entities: &[ReferenceEntity]) -> Result<(), StorageError> {
        db::replace_active_entities(&self.pool, entities).await
    }

    async fn read_aggregates(&self) -> Result<Vec<AggregateRow>, StorageError> {
        db::get_aggregates(&self.pool).await
    }

    async fn replace_aggregates(&self, rows: &[AggregateRow]) -> Result<(), StorageError> {
        db::replace_aggregates(&self.pool, rows).await
    }
}

#[derive(Debug, Default)]
struct Tables {
    expenses: Vec<ExpenseRecord>,
    entities: Vec<ReferenceEntity>,
    aggregates: Vec<AggregateRow>,
}

/// Process-local repository for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        // Replaces are single assignments; a poisoned table is still whole.
        let mut guard = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn read_expenses(&self) -> Result<Vec<ExpenseRecord>, StorageError> {
        Ok(self.with_tables(|t| t.expenses.clone()))
    }

    async fn replace_expenses(&self, records: &[ExpenseRecord]) -> Result<(), StorageError> {
        self.with_tables(|t| t.expenses = records.to_vec());
        Ok(())
    }

    async fn read_entities(&self) -> Result<Vec<ReferenceEntity>, StorageError> {
        Ok(self.with_tables(|t| t.entities.clone()))
    }

    async fn replace_entities(&self, entities: &[ReferenceEntity]) -> Result<(), StorageError> {
        self.with_tables(|t| t.entities = entities.to_vec());
        Ok(())
    }

    async fn read_aggregates(&self) -> Result<Vec<AggregateRow>, StorageError> {
        Ok(self.with_tables(|t| t.aggregates.clone()))
    }

    async fn replace_aggregates(&self, rows: &[AggregateRow]) -> Result<(), StorageError> {
        self.with_tables(|t| t.aggregates = rows.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regfin_core::{Identifier, Money, Period, Quarter};

    async fn exercise(repo: &dyn Repository) {
        let records = vec![ExpenseRecord::new(
            Identifier::TaxId("11222333000181".into()),
            Money::from_cents(999),
            Period::new(2023, Quarter::Q4),
        )];
        repo.replace_expenses(&records).await.unwrap();
        assert_eq!(repo.read_expenses().await.unwrap(), records);

        repo.replace_expenses(&[]).await.unwrap();
        assert!(repo.read_expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_repository_replaces_tables() {
        exercise(&MemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn sqlite_repository_replaces_tables() {
        let pool = db::create_memory_db().await.unwrap();
        exercise(&SqliteRepository::new(pool)).await;
    }
}
