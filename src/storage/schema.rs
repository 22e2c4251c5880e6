//! Ledger schema bootstrap
//!
//! Idempotent DDL for the two tables the ledger needs. Safe to run on every
//! start; existing tables are left untouched.

use sqlx::PgPool;

const CREATE_BANK_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS bank_accounts (
    id                BIGSERIAL PRIMARY KEY,
    organization_name TEXT NOT NULL,
    balance_cents     BIGINT NOT NULL CHECK (balance_cents >= 0),
    iban              TEXT NOT NULL UNIQUE,
    bic               TEXT NOT NULL
)
"#;

const CREATE_LEDGER_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id                BIGSERIAL PRIMARY KEY,
    bank_account_id   BIGINT NOT NULL REFERENCES bank_accounts (id),
    counterparty_name TEXT NOT NULL,
    counterparty_iban TEXT NOT NULL,
    counterparty_bic  TEXT NOT NULL,
    amount_cents      BIGINT NOT NULL CHECK (amount_cents > 0),
    amount_currency   CHAR(3) NOT NULL,
    description       TEXT NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_LEDGER_ENTRIES_ACCOUNT_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS ledger_entries_account_idx
    ON ledger_entries (bank_account_id)
"#;

/// Statements in dependency order
pub const STATEMENTS: [&str; 3] = [
    CREATE_BANK_ACCOUNTS,
    CREATE_LEDGER_ENTRIES,
    CREATE_LEDGER_ENTRIES_ACCOUNT_IDX,
];

/// Create the ledger tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        for statement in STATEMENTS {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }

    #[test]
    fn test_non_negative_constraints_present() {
        assert!(CREATE_BANK_ACCOUNTS.contains("CHECK (balance_cents >= 0)"));
        assert!(CREATE_LEDGER_ENTRIES.contains("CHECK (amount_cents > 0)"));
    }
}
