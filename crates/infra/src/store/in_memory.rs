use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use stockledger_accounting::{Account, JournalEntry, JournalLine};
use stockledger_core::{Amount, ItemId, JournalEntryId, SubmissionKey, TransactionId};
use stockledger_inventory::Item;
use stockledger_parties::{Party, PartyKind};

use super::r#trait::{LedgerStore, StoreError, TransactionRecord};

/// Store operation that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateJournalEntry,
    InsertJournalLines,
    DeleteJournalEntry,
    UpdateItemQuantity,
    InsertTransaction,
    DeleteTransaction,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    /// Calls to let through before failing.
    skip: usize,
    sticky: bool,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Seeded account balances act as opening balances;
/// journal lines are added on top when accounts are listed.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    accounts: RwLock<Vec<Account>>,
    items: RwLock<HashMap<ItemId, Item>>,
    parties: RwLock<Vec<Party>>,
    journal: RwLock<Vec<JournalEntry>>,
    transactions: RwLock<Vec<TransactionRecord>>,
    faults: Mutex<HashMap<FaultPoint, Fault>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = write(&self.accounts)?;
        accounts.retain(|a| a.id != account.id);
        accounts.push(account);
        Ok(())
    }

    pub fn add_item(&self, item: Item) -> Result<(), StoreError> {
        write(&self.items)?.insert(item.id, item);
        Ok(())
    }

    pub fn add_party(&self, party: Party) -> Result<(), StoreError> {
        let mut parties = write(&self.parties)?;
        parties.retain(|p| p.id != party.id);
        parties.push(party);
        Ok(())
    }

    /// Fail the next call at `point`.
    pub fn fail_next(&self, point: FaultPoint) {
        self.fail_nth(point, 1);
    }

    /// Fail the `n`-th call (1-based) at `point`, once.
    pub fn fail_nth(&self, point: FaultPoint, n: usize) {
        self.set_fault(
            point,
            Fault {
                skip: n.saturating_sub(1),
                sticky: false,
            },
        );
    }

    /// Fail every call at `point` until cleared.
    pub fn fail_always(&self, point: FaultPoint) {
        self.fail_from_nth(point, 1);
    }

    /// Let `n - 1` calls at `point` through, then fail every call until
    /// cleared.
    pub fn fail_from_nth(&self, point: FaultPoint, n: usize) {
        self.set_fault(
            point,
            Fault {
                skip: n.saturating_sub(1),
                sticky: true,
            },
        );
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn set_fault(&self, point: FaultPoint, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point, fault);
        }
    }

    fn check_fault(&self, point: FaultPoint) -> Result<(), StoreError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let Some(fault) = faults.get_mut(&point) else {
            return Ok(());
        };
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        if !fault.sticky {
            faults.remove(&point);
        }
        Err(StoreError::Backend(format!("injected failure at {point:?}")))
    }

    fn parties_of(&self, kind: PartyKind) -> Result<Vec<Party>, StoreError> {
        let mut parties: Vec<Party> = read(&self.parties)?
            .iter()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parties)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn checked_balance(total: Amount, amount: Amount) -> Result<Amount, StoreError> {
    total
        .checked_add(amount)
        .ok_or_else(|| StoreError::Backend("account balance overflows".to_string()))
}

impl LedgerStore for InMemoryLedgerStore {
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let journal = read(&self.journal)?;
        let mut totals: HashMap<_, (Amount, Amount)> = HashMap::new();
        for line in journal.iter().flat_map(|e| e.lines.iter()) {
            let entry = totals.entry(line.account_id).or_default();
            entry.0 = checked_balance(entry.0, line.debit)?;
            entry.1 = checked_balance(entry.1, line.credit)?;
        }

        let mut accounts = read(&self.accounts)?.clone();
        for account in &mut accounts {
            if let Some((debits, credits)) = totals.get(&account.id) {
                let movement = account.kind.signed_balance(*debits, *credits);
                account.balance = checked_balance(account.balance, movement)?;
            }
        }
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    fn create_journal_entry(&self, description: &str) -> Result<JournalEntryId, StoreError> {
        self.check_fault(FaultPoint::CreateJournalEntry)?;

        let entry = JournalEntry {
            id: JournalEntryId::new(),
            description: description.to_string(),
            created_at: Utc::now(),
            lines: Vec::new(),
        };
        let id = entry.id;
        write(&self.journal)?.push(entry);
        Ok(id)
    }

    fn insert_journal_lines(&self, lines: &[JournalLine]) -> Result<(), StoreError> {
        self.check_fault(FaultPoint::InsertJournalLines)?;

        {
            let accounts = read(&self.accounts)?;
            for line in lines {
                line.validate()
                    .map_err(|e| StoreError::Backend(format!("line rejected: {e}")))?;
                if !accounts.iter().any(|a| a.id == line.account_id) {
                    return Err(StoreError::NotFound(format!("account {}", line.account_id)));
                }
            }
        }

        // All-or-nothing: every entry must exist before any line is attached.
        let mut journal = write(&self.journal)?;
        for line in lines {
            if !journal.iter().any(|e| e.id == line.entry_id) {
                return Err(StoreError::NotFound(format!("journal entry {}", line.entry_id)));
            }
        }
        for line in lines {
            if let Some(entry) = journal.iter_mut().find(|e| e.id == line.entry_id) {
                entry.lines.push(line.clone());
            }
        }
        Ok(())
    }

    fn delete_journal_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        self.check_fault(FaultPoint::DeleteJournalEntry)?;

        let mut journal = write(&self.journal)?;
        let before = journal.len();
        journal.retain(|e| e.id != id);
        if journal.len() == before {
            return Err(StoreError::NotFound(format!("journal entry {id}")));
        }
        Ok(())
    }

    fn list_journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(read(&self.journal)?.iter().rev().cloned().collect())
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items: Vec<Item> = read(&self.items)?.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        read(&self.items)?
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))
    }

    fn update_item_quantity(
        &self,
        id: ItemId,
        expected: i64,
        new_quantity: i64,
    ) -> Result<(), StoreError> {
        self.check_fault(FaultPoint::UpdateItemQuantity)?;

        if new_quantity < 0 {
            return Err(StoreError::Backend(format!(
                "quantity for item {id} cannot be negative"
            )));
        }

        let mut items = write(&self.items)?;
        let item = items
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))?;
        if item.quantity != expected {
            return Err(StoreError::Conflict(format!(
                "item {id}: expected quantity {expected}, found {}",
                item.quantity
            )));
        }
        item.quantity = new_quantity;
        Ok(())
    }

    fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.check_fault(FaultPoint::InsertTransaction)?;

        let mut transactions = write(&self.transactions)?;
        if transactions.iter().any(|t| t.id == record.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already exists",
                record.id
            )));
        }
        transactions.push(record.clone());
        Ok(())
    }

    fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        self.check_fault(FaultPoint::DeleteTransaction)?;

        let mut transactions = write(&self.transactions)?;
        let before = transactions.len();
        transactions.retain(|t| t.id != id);
        if transactions.len() == before {
            return Err(StoreError::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(read(&self.transactions)?.iter().rev().cloned().collect())
    }

    fn transactions_for_submission(
        &self,
        key: SubmissionKey,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(read(&self.transactions)?
            .iter()
            .filter(|t| t.submission_key == key)
            .cloned()
            .collect())
    }

    fn list_customers(&self) -> Result<Vec<Party>, StoreError> {
        self.parties_of(PartyKind::Customer)
    }

    fn list_suppliers(&self) -> Result<Vec<Party>, StoreError> {
        self.parties_of(PartyKind::Supplier)
    }
}
