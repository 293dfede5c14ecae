use regfin_core::{
    AggregateRow, ExpenseRecord, Identifier, IdentifierKind, Money, Period, ReferenceEntity,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Amount out of range: {0}")]
    ValueOutOfRange(String),
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

fn corrupt(table: &'static str, reason: impl ToString) -> StorageError {
    StorageError::Corrupt { table, reason: reason.to_string() }
}

fn cents(value: Money) -> Result<i64, StorageError> {
    value
        .to_cents()
        .ok_or_else(|| StorageError::ValueOutOfRange(value.to_string()))
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    configure(&pool).await?;
    Ok(pool)
}

/// A private in-memory database, alive as long as the pool.
pub async fn create_memory_db() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    configure(&pool).await?;
    Ok(pool)
}

async fn configure(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;

    run_migrations(pool).await
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expense_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT NOT NULL,
            identifier_kind TEXT NOT NULL,
            year INTEGER NOT NULL,
            quarter INTEGER NOT NULL,
            value_cents INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS active_entities (
            tax_id TEXT PRIMARY KEY,
            registry_code TEXT,
            legal_name TEXT NOT NULL,
            region TEXT,
            line_of_business TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expense_aggregates (
            position INTEGER PRIMARY KEY,
            legal_name TEXT NOT NULL,
            region TEXT,
            total_cents INTEGER NOT NULL,
            mean_cents INTEGER NOT NULL,
            stddev_cents INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_expense_records(pool: &DbPool) -> Result<Vec<ExpenseRecord>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String, i64, i64, i64)>(
        "SELECT identifier, identifier_kind, year, quarter, value_cents FROM expense_records ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(identifier, kind, year, quarter, value_cents)| {
            let kind = IdentifierKind::from_str(&kind).map_err(|e| corrupt("expense_records", e))?;
            let year = u16::try_from(year).map_err(|e| corrupt("expense_records", e))?;
            let quarter = u8::try_from(quarter).map_err(|e| corrupt("expense_records", e))?;
            let period = Period::from_parts(year, quarter).map_err(|e| corrupt("expense_records", e))?;
            Ok(ExpenseRecord::new(
                Identifier::new(kind, identifier),
                Money::from_cents(value_cents),
                period,
            ))
        })
        .collect()
}

/// Truncate-and-insert in one transaction; any failure leaves the old rows.
pub async fn replace_expense_records(
    pool: &DbPool,
    records: &[ExpenseRecord],
) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM expense_records")
        .execute(&mut *tx)
        .await?;

    for record in records {
        sqlx::query(
            "INSERT INTO expense_records (identifier, identifier_kind, year, quarter, value_cents) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.identifier.value())
        .bind(record.identifier.kind().to_string())
        .bind(i64::from(record.period.year))
        .bind(i64::from(record.period.quarter.number()))
        .bind(cents(record.value)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!("expense_records replaced with {} rows", records.len());
    Ok(())
}

pub async fn get_active_entities(pool: &DbPool) -> Result<Vec<ReferenceEntity>, StorageError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, String, Option<String>, Option<String>)>(
        "SELECT tax_id, registry_code, legal_name, region, line_of_business FROM active_entities ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ReferenceEntity {
            tax_id: r.0,
            registry_code: r.1,
            legal_name: r.2,
            region: r.3,
            line_of_business: r.4,
        })
        .collect())
}

/// The first row for a tax identifier wins; later duplicates are ignored.
pub async fn replace_active_entities(
    pool: &DbPool,
    entities: &[ReferenceEntity],
) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM active_entities")
        .execute(&mut *tx)
        .await?;

    for entity in entities {
        sqlx::query(
            "INSERT OR IGNORE INTO active_entities (tax_id, registry_code, legal_name, region, line_of_business) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entity.tax_id)
        .bind(&entity.registry_code)
        .bind(&entity.legal_name)
        .bind(&entity.region)
        .bind(&entity.line_of_business)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!("active_entities replaced with {} rows", entities.len());
    Ok(())
}

pub async fn get_aggregates(pool: &DbPool) -> Result<Vec<AggregateRow>, StorageError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, i64, i64, Option<i64>)>(
        "SELECT legal_name, region, total_cents, mean_cents, stddev_cents FROM expense_aggregates ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| AggregateRow {
            legal_name: r.0,
            region: r.1,
            total: Money::from_cents(r.2),
            mean: Money::from_cents(r.3),
            stddev: r.4.map(Money::from_cents),
        })
        .collect())
}

/// Rows are stored with their position so reads return the ranking order.
pub async fn replace_aggregates(pool: &DbPool, rows: &[AggregateRow]) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM expense_aggregates")
        .execute(&mut *tx)
        .await?;

    for (position, row) in rows.iter().enumerate() {
        let stddev = row.stddev.map(cents).transpose()?;
        sqlx::query(
            "INSERT INTO expense_aggregates (position, legal_name, region, total_cents, mean_cents, stddev_cents) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(position as i64)
        .bind(&row.legal_name)
        .bind(&row.region)
        .bind(cents(row.total)?)
        .bind(cents(row.mean)?)
        .bind(stddev)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!("expense_aggregates replaced with {} rows", rows.len());
    Ok(())
}
