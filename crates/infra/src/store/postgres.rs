//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (check constraint violation) | `23514` | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | N/A | `Backend` |
//!
//! The `LedgerStore` impl is synchronous and drives the async queries on the
//! ambient tokio runtime, so it must be called from inside a multi-threaded
//! runtime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_accounting::{Account, AccountKind, JournalEntry, JournalLine};
use stockledger_core::{
    AccountId, ItemId, JournalEntryId, PartyId, SubmissionKey, TransactionId,
};
use stockledger_inventory::Item;
use stockledger_orders::OrderKind;
use stockledger_parties::{ContactInfo, Party, PartyKind, PartyStatus};

use super::r#trait::{LedgerStore, StoreError, TransactionRecord};

/// Idempotent schema bootstrap.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id              UUID PRIMARY KEY,
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL,
    opening_balance NUMERIC NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS items (
    id                 UUID PRIMARY KEY,
    name               TEXT NOT NULL,
    sku                TEXT NOT NULL,
    quantity           BIGINT NOT NULL CHECK (quantity >= 0),
    cost_price         NUMERIC NOT NULL,
    selling_price      NUMERIC NOT NULL,
    shipment_threshold BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS parties (
    id     UUID PRIMARY KEY,
    kind   TEXT NOT NULL,
    name   TEXT NOT NULL,
    email  TEXT,
    phone  TEXT,
    status TEXT NOT NULL DEFAULT 'active'
);

CREATE TABLE IF NOT EXISTS journal_entries (
    id          UUID PRIMARY KEY,
    description TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS journal_lines (
    line_id    BIGSERIAL PRIMARY KEY,
    entry_id   UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    debit      NUMERIC NOT NULL CHECK (debit >= 0),
    credit     NUMERIC NOT NULL CHECK (credit >= 0),
    CHECK ((debit = 0) <> (credit = 0))
);

CREATE TABLE IF NOT EXISTS transactions (
    id             UUID PRIMARY KEY,
    submission_key UUID NOT NULL,
    item_id        UUID NOT NULL REFERENCES items(id),
    kind           TEXT NOT NULL,
    quantity       BIGINT NOT NULL,
    counterparty   TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS transactions_submission_idx ON transactions (submission_key);
"#;

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub async fn upsert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, kind, opening_balance)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                opening_balance = EXCLUDED.opening_balance
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account_kind_str(account.kind))
        .bind(account.balance)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_account", e))?;
        Ok(())
    }

    pub async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, sku, quantity, cost_price, selling_price, shipment_threshold)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                quantity = EXCLUDED.quantity,
                cost_price = EXCLUDED.cost_price,
                selling_price = EXCLUDED.selling_price,
                shipment_threshold = EXCLUDED.shipment_threshold
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.sku)
        .bind(item.quantity)
        .bind(item.cost_price)
        .bind(item.selling_price)
        .bind(item.shipment_threshold)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_item", e))?;
        Ok(())
    }

    pub async fn upsert_party(&self, party: &Party) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO parties (id, kind, name, email, phone, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                kind = EXCLUDED.kind,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                status = EXCLUDED.status
            "#,
        )
        .bind(party.id.as_uuid())
        .bind(party.kind.to_string())
        .bind(&party.name)
        .bind(party.contact.email.as_deref())
        .bind(party.contact.phone.as_deref())
        .bind(party_status_str(party.status))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_party", e))?;
        Ok(())
    }

    async fn fetch_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id,
                a.name,
                a.kind,
                a.opening_balance,
                COALESCE(SUM(l.debit), 0) AS debits,
                COALESCE(SUM(l.credit), 0) AS credits
            FROM accounts a
            LEFT JOIN journal_lines l ON l.account_id = a.id
            GROUP BY a.id, a.name, a.kind, a.opening_balance
            ORDER BY a.name ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter()
            .map(|row| {
                let row = AccountRow::from_row(row).map_err(|e| decode_error("account", e))?;
                row.try_into()
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn insert_entry(&self, description: &str) -> Result<JournalEntryId, StoreError> {
        let id = JournalEntryId::new();
        sqlx::query("INSERT INTO journal_entries (id, description, created_at) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(description)
            .bind(Utc::now())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_journal_entry", e))?;
        Ok(id)
    }

    #[instrument(skip(self, lines), fields(line_count = lines.len()), err)]
    async fn insert_lines(&self, lines: &[JournalLine]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO journal_lines (entry_id, account_id, debit, credit)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(line.entry_id.as_uuid())
            .bind(line.account_id.as_uuid())
            .bind(line.debit)
            .bind(line.credit)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_journal_lines", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn remove_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_journal_entry", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("journal entry {id}")));
        }
        Ok(())
    }

    async fn fetch_journal(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let headers = sqlx::query(
            "SELECT id, description, created_at FROM journal_entries ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_journal_entries", e))?;

        let lines = sqlx::query(
            "SELECT entry_id, account_id, debit, credit FROM journal_lines ORDER BY line_id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_journal_lines", e))?;

        let lines = lines
            .iter()
            .map(|row| {
                JournalLineRow::from_row(row)
                    .map(JournalLine::from)
                    .map_err(|e| decode_error("journal line", e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(headers.len());
        for row in &headers {
            let id: Uuid = row.try_get("id").map_err(|e| decode_error("journal entry", e))?;
            entries.push(JournalEntry {
                id: JournalEntryId::from_uuid(id),
                description: row
                    .try_get("description")
                    .map_err(|e| decode_error("journal entry", e))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| decode_error("journal entry", e))?,
                lines: Vec::new(),
            });
        }
        attach_lines(&mut entries, lines);
        Ok(entries)
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, sku, quantity, cost_price, selling_price, shipment_threshold
            FROM items
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter()
            .map(|row| {
                ItemRow::from_row(row)
                    .map(Item::from)
                    .map_err(|e| decode_error("item", e))
            })
            .collect()
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Item, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, sku, quantity, cost_price, selling_price, shipment_threshold
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?
        .ok_or_else(|| StoreError::NotFound(format!("item {id}")))?;

        ItemRow::from_row(&row)
            .map(Item::from)
            .map_err(|e| decode_error("item", e))
    }

    /// Conditional update; zero rows affected means the quantity moved.
    #[instrument(skip(self), err)]
    async fn swap_quantity(
        &self,
        id: ItemId,
        expected: i64,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE items SET quantity = $3 WHERE id = $1 AND quantity = $2")
            .bind(id.as_uuid())
            .bind(expected)
            .bind(new_quantity)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_item_quantity", e))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM items WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_item_quantity", e))?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(format!(
                    "item {id}: quantity no longer {expected}"
                )),
                None => StoreError::NotFound(format!("item {id}")),
            });
        }
        Ok(())
    }

    async fn insert_record(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, submission_key, item_id, kind, quantity, counterparty, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.submission_key.as_uuid())
        .bind(record.item_id.as_uuid())
        .bind(record.kind.to_string())
        .bind(record.quantity)
        .bind(&record.counterparty)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    async fn remove_record(&self, id: TransactionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_transaction", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    async fn fetch_records(
        &self,
        key: Option<SubmissionKey>,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, submission_key, item_id, kind, quantity, counterparty, created_at
            FROM transactions
            WHERE ($1::uuid IS NULL OR submission_key = $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(key.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter()
            .map(|row| {
                let row = TransactionRow::from_row(row).map_err(|e| decode_error("transaction", e))?;
                row.try_into()
            })
            .collect()
    }

    async fn fetch_parties(&self, kind: PartyKind) -> Result<Vec<Party>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, name, email, phone, status
            FROM parties
            WHERE kind = $1
            ORDER BY name ASC
            "#,
        )
        .bind(kind.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_parties", e))?;

        rows.iter()
            .map(|row| {
                let row = PartyRow::from_row(row).map_err(|e| decode_error("party", e))?;
                row.try_into()
            })
            .collect()
    }
}

/// Distribute `lines` onto their entries, keeping line order. Lines whose
/// entry is not in `entries` are dropped.
fn attach_lines(entries: &mut [JournalEntry], lines: Vec<JournalLine>) {
    let mut by_entry: HashMap<JournalEntryId, Vec<JournalLine>> = HashMap::new();
    for line in lines {
        by_entry.entry(line.entry_id).or_default().push(line);
    }
    for entry in entries {
        if let Some(lines) = by_entry.remove(&entry.id) {
            entry.lines = lines;
        }
    }
}

/// Run a query future to completion from synchronous code.
fn block_on<F, T>(fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresLedgerStore requires a tokio runtime; call it from within one".to_string(),
        )
    })?;
    // block_in_place panics on a current-thread runtime.
    if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
        return Err(StoreError::Backend(
            "PostgresLedgerStore requires a multi-threaded tokio runtime".to_string(),
        ));
    }
    tokio::task::block_in_place(|| handle.block_on(fut))
}

impl LedgerStore for PostgresLedgerStore {
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        block_on(self.fetch_accounts())
    }

    fn create_journal_entry(&self, description: &str) -> Result<JournalEntryId, StoreError> {
        block_on(self.insert_entry(description))
    }

    fn insert_journal_lines(&self, lines: &[JournalLine]) -> Result<(), StoreError> {
        block_on(self.insert_lines(lines))
    }

    fn delete_journal_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        block_on(self.remove_entry(id))
    }

    fn list_journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        block_on(self.fetch_journal())
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        block_on(self.fetch_items())
    }

    fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        block_on(self.fetch_item(id))
    }

    fn update_item_quantity(
        &self,
        id: ItemId,
        expected: i64,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        block_on(self.swap_quantity(id, expected, new_quantity))
    }

    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        block_on(self.insert_record(record))
    }

    fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        block_on(self.remove_record(id))
    }

    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        block_on(self.fetch_records(None))
    }

    fn transactions_for_submission(
        &self,
        key: SubmissionKey,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        block_on(self.fetch_records(Some(key)))
    }

    fn list_customers(&self) -> Result<Vec<Party>, StoreError> {
        block_on(self.fetch_parties(PartyKind::Customer))
    }

    fn list_suppliers(&self) -> Result<Vec<Party>, StoreError> {
        block_on(self.fetch_parties(PartyKind::Supplier))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn decode_error(what: &str, err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode {what} row: {err}"))
}

fn account_kind_str(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Asset => "asset",
        AccountKind::Liability => "liability",
        AccountKind::Revenue => "revenue",
        AccountKind::Expense => "expense",
    }
}

fn parse_account_kind(value: &str) -> Result<AccountKind, StoreError> {
    match value {
        "asset" => Ok(AccountKind::Asset),
        "liability" => Ok(AccountKind::Liability),
        "revenue" => Ok(AccountKind::Revenue),
        "expense" => Ok(AccountKind::Expense),
        other => Err(StoreError::Backend(format!("unknown account kind '{other}'"))),
    }
}

fn party_status_str(status: PartyStatus) -> &'static str {
    match status {
        PartyStatus::Active => "active",
        PartyStatus::Suspended => "suspended",
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    name: String,
    kind: String,
    opening_balance: Decimal,
    debits: Decimal,
    credits: Decimal,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            opening_balance: row.try_get("opening_balance")?,
            debits: row.try_get("debits")?,
            credits: row.try_get("credits")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let kind = parse_account_kind(&row.kind)?;
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            name: row.name,
            kind,
            balance: row
                .opening_balance
                .checked_add(kind.signed_balance(row.debits, row.credits))
                .ok_or_else(|| StoreError::Backend("account balance overflows".to_string()))?,
        })
    }
}

#[derive(Debug)]
struct JournalLineRow {
    entry_id: Uuid,
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

impl<'r> FromRow<'r, PgRow> for JournalLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JournalLineRow {
            entry_id: row.try_get("entry_id")?,
            account_id: row.try_get("account_id")?,
            debit: row.try_get("debit")?,
            credit: row.try_get("credit")?,
        })
    }
}

impl From<JournalLineRow> for JournalLine {
    fn from(row: JournalLineRow) -> Self {
        JournalLine {
            entry_id: JournalEntryId::from_uuid(row.entry_id),
            account_id: AccountId::from_uuid(row.account_id),
            debit: row.debit,
            credit: row.credit,
        }
    }
}

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    name: String,
    sku: String,
    quantity: i64,
    cost_price: Decimal,
    selling_price: Decimal,
    shipment_threshold: i64,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            quantity: row.try_get("quantity")?,
            cost_price: row.try_get("cost_price")?,
            selling_price: row.try_get("selling_price")?,
            shipment_threshold: row.try_get("shipment_threshold")?,
        })
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: ItemId::from_uuid(row.id),
            name: row.name,
            sku: row.sku,
            quantity: row.quantity,
            cost_price: row.cost_price,
            selling_price: row.selling_price,
            shipment_threshold: row.shipment_threshold,
        }
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: Uuid,
    submission_key: Uuid,
    item_id: Uuid,
    kind: String,
    quantity: i64,
    counterparty: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            submission_key: row.try_get("submission_key")?,
            item_id: row.try_get("item_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            counterparty: row.try_get("counterparty")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "sale" => OrderKind::Sale,
            "purchase" => OrderKind::Purchase,
            other => {
                return Err(StoreError::Backend(format!(
                    "unknown transaction kind '{other}'"
                )));
            }
        };
        Ok(TransactionRecord {
            id: TransactionId::from_uuid(row.id),
            submission_key: SubmissionKey::from_uuid(row.submission_key),
            item_id: ItemId::from_uuid(row.item_id),
            kind,
            quantity: row.quantity,
            counterparty: row.counterparty,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct PartyRow {
    id: Uuid,
    kind: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    status: String,
}

impl<'r> FromRow<'r, PgRow> for PartyRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PartyRow {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            status: row.try_get("status")?,
        })
    }
}

impl TryFrom<PartyRow> for Party {
    type Error = StoreError;

    fn try_from(row: PartyRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "customer" => PartyKind::Customer,
            "supplier" => PartyKind::Supplier,
            other => return Err(StoreError::Backend(format!("unknown party kind '{other}'"))),
        };
        let status = match row.status.as_str() {
            "suspended" => PartyStatus::Suspended,
            _ => PartyStatus::Active,
        };
        Ok(Party {
            id: PartyId::from_uuid(row.id),
            kind,
            name: row.name,
            contact: ContactInfo {
                email: row.email,
                phone: row.phone,
            },
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_kinds_round_trip_through_text() {
        for kind in [
            AccountKind::Asset,
            AccountKind::Liability,
            AccountKind::Revenue,
            AccountKind::Expense,
        ] {
            assert_eq!(parse_account_kind(account_kind_str(kind)).unwrap(), kind);
        }
        assert!(parse_account_kind("equity").is_err());
    }

    #[test]
    fn sync_calls_outside_a_runtime_fail_cleanly() {
        let err = block_on(async { Ok::<_, StoreError>(()) }).unwrap_err();
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("tokio runtime")));
    }

    #[tokio::test]
    async fn sync_calls_on_a_current_thread_runtime_fail_cleanly() {
        let err = block_on(async { Ok::<_, StoreError>(()) }).unwrap_err();
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("multi-threaded")));

        let pool = PgPool::connect_lazy("postgres://localhost/stockledger").unwrap();
        let store = PostgresLedgerStore::new(pool);
        let err = store.get_item(ItemId::new()).unwrap_err();
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("multi-threaded")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sync_calls_on_a_multi_thread_runtime_run_the_query() {
        let value = block_on(async { Ok::<_, StoreError>(7) }).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn lines_are_attached_to_their_own_entries_in_order() {
        let entry = |description: &str| JournalEntry {
            id: JournalEntryId::new(),
            description: description.to_string(),
            created_at: Utc::now(),
            lines: Vec::new(),
        };
        let line = |entry_id, debit, credit| JournalLine {
            entry_id,
            account_id: AccountId::new(),
            debit,
            credit,
        };
        let mut entries = vec![entry("purchase"), entry("sale")];
        let (purchase, sale) = (entries[0].id, entries[1].id);
        let lines = vec![
            line(sale, Decimal::from(50), Decimal::ZERO),
            line(purchase, Decimal::from(40), Decimal::ZERO),
            line(JournalEntryId::new(), Decimal::from(1), Decimal::ZERO),
            line(sale, Decimal::ZERO, Decimal::from(50)),
            line(purchase, Decimal::ZERO, Decimal::from(40)),
        ];

        attach_lines(&mut entries, lines);

        assert_eq!(entries[0].lines.len(), 2);
        assert_eq!(entries[1].lines.len(), 2);
        assert!(entries[0].lines.iter().all(|l| l.entry_id == purchase));
        assert_eq!(entries[1].lines[0].debit, Decimal::from(50));
        assert_eq!(entries[1].lines[1].credit, Decimal::from(50));
    }

    #[test]
    fn schema_declares_conditional_quantity_guard() {
        assert!(SCHEMA.contains("CHECK (quantity >= 0)"));
        assert!(SCHEMA.contains("ON DELETE CASCADE"));
    }
}
