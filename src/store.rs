//! Document-store seam.
//!
//! The engine never owns persistence; it talks to a store through
//! find/update-by-filter shaped calls. Link writes are add-if-absent set
//! unions on both sides of the reference, so two racing link attempts
//! converge on the same state instead of double-linking or overwriting.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{LedgerError, Result};
use crate::records::{
    Bill, CustomerRecord, EntryKind, GigOrder, LedgerEntry, MileageClass, MileageEntry,
    UserSettings,
};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn settings(&self, user_id: &str) -> Result<Option<UserSettings>>;

    /// Entries whose civil date falls inside the inclusive window.
    async fn entries_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerEntry>>;

    /// All income-kind entries for a user.
    async fn income_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Income entries currently flagged active.
    async fn active_income_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;

    async fn entry(&self, id: &str) -> Result<Option<LedgerEntry>>;

    async fn orders(&self, user_id: &str) -> Result<Vec<GigOrder>>;

    async fn order(&self, id: &str) -> Result<Option<GigOrder>>;

    async fn customers(&self, user_id: &str) -> Result<Vec<CustomerRecord>>;

    async fn active_bills(&self, user_id: &str) -> Result<Vec<Bill>>;

    /// Work-classified odometer readings inside the inclusive window.
    async fn work_mileage_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MileageEntry>>;

    /// Work-classified odometer readings strictly before `date`.
    async fn work_mileage_before(&self, user_id: &str, date: NaiveDate)
        -> Result<Vec<MileageEntry>>;

    /// Cross-reference an entry and an order on both sides (add-if-absent).
    async fn link_entry_order(&self, entry_id: &str, order_id: &str) -> Result<()>;

    /// Cross-reference an entry and a customer on both sides (add-if-absent).
    async fn link_entry_customer(&self, entry_id: &str, customer_id: &str) -> Result<()>;

    /// Cross-reference a customer and an order on both sides (add-if-absent).
    async fn link_customer_order(&self, customer_id: &str, order_id: &str) -> Result<()>;

    async fn set_entry_active(&self, entry_id: &str, active: bool) -> Result<()>;
}

fn push_if_absent(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

#[derive(Default)]
struct MemoryState {
    settings: BTreeMap<String, UserSettings>,
    entries: BTreeMap<String, LedgerEntry>,
    orders: BTreeMap<String, GigOrder>,
    customers: BTreeMap<String, CustomerRecord>,
    bills: BTreeMap<String, Bill>,
    mileage: BTreeMap<String, MileageEntry>,
}

/// In-memory store for tests and embedders without a database.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_settings(&self, settings: UserSettings) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.settings.insert(settings.user_id.clone(), settings);
    }

    pub fn insert_entry(&self, entry: LedgerEntry) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.entries.insert(entry.id.clone(), entry);
    }

    pub fn insert_order(&self, order: GigOrder) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.orders.insert(order.id.clone(), order);
    }

    pub fn insert_customer(&self, customer: CustomerRecord) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.customers.insert(customer.id.clone(), customer);
    }

    pub fn insert_bill(&self, bill: Bill) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.bills.insert(bill.id.clone(), bill);
    }

    pub fn insert_mileage(&self, entry: MileageEntry) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.mileage.insert(entry.id.clone(), entry);
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Store("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        Ok(self.read()?.settings.get(user_id).cloned())
    }

    async fn entries_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.date >= start && e.date <= end)
            .cloned()
            .collect())
    }

    async fn income_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.kind == EntryKind::Income)
            .cloned()
            .collect())
    }

    async fn active_income_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.kind == EntryKind::Income && e.active)
            .cloned()
            .collect())
    }

    async fn entry(&self, id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.entries.get(id).cloned())
    }

    async fn orders(&self, user_id: &str) -> Result<Vec<GigOrder>> {
        Ok(self
            .read()?
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn order(&self, id: &str) -> Result<Option<GigOrder>> {
        Ok(self.read()?.orders.get(id).cloned())
    }

    async fn customers(&self, user_id: &str) -> Result<Vec<CustomerRecord>> {
        Ok(self
            .read()?
            .customers
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_bills(&self, user_id: &str) -> Result<Vec<Bill>> {
        Ok(self
            .read()?
            .bills
            .values()
            .filter(|b| b.user_id == user_id && b.is_active)
            .cloned()
            .collect())
    }

    async fn work_mileage_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MileageEntry>> {
        Ok(self
            .read()?
            .mileage
            .values()
            .filter(|m| {
                m.user_id == user_id
                    && m.classification == MileageClass::Work
                    && m.date >= start
                    && m.date <= end
            })
            .cloned()
            .collect())
    }

    async fn work_mileage_before(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<MileageEntry>> {
        Ok(self
            .read()?
            .mileage
            .values()
            .filter(|m| {
                m.user_id == user_id && m.classification == MileageClass::Work && m.date < date
            })
            .cloned()
            .collect())
    }

    async fn link_entry_order(&self, entry_id: &str, order_id: &str) -> Result<()> {
        let mut state = self.write()?;
        // Both sides must exist before either is written, or a missing
        // record would leave a dangling reference behind the error.
        if !state.entries.contains_key(entry_id) {
            return Err(LedgerError::NotFound(format!("entry {}", entry_id)));
        }
        if !state.orders.contains_key(order_id) {
            return Err(LedgerError::NotFound(format!("order {}", order_id)));
        }
        if let Some(entry) = state.entries.get_mut(entry_id) {
            push_if_absent(&mut entry.linked_order_ids, order_id);
        }
        if let Some(order) = state.orders.get_mut(order_id) {
            push_if_absent(&mut order.linked_entry_ids, entry_id);
        }
        Ok(())
    }

    async fn link_entry_customer(&self, entry_id: &str, customer_id: &str) -> Result<()> {
        let mut state = self.write()?;
        if !state.entries.contains_key(entry_id) {
            return Err(LedgerError::NotFound(format!("entry {}", entry_id)));
        }
        if !state.customers.contains_key(customer_id) {
            return Err(LedgerError::NotFound(format!("customer {}", customer_id)));
        }
        if let Some(entry) = state.entries.get_mut(entry_id) {
            push_if_absent(&mut entry.linked_customer_ids, customer_id);
        }
        if let Some(customer) = state.customers.get_mut(customer_id) {
            push_if_absent(&mut customer.linked_entry_ids, entry_id);
        }
        Ok(())
    }

    async fn link_customer_order(&self, customer_id: &str, order_id: &str) -> Result<()> {
        let mut state = self.write()?;
        if !state.customers.contains_key(customer_id) {
            return Err(LedgerError::NotFound(format!("customer {}", customer_id)));
        }
        if !state.orders.contains_key(order_id) {
            return Err(LedgerError::NotFound(format!("order {}", order_id)));
        }
        if let Some(customer) = state.customers.get_mut(customer_id) {
            push_if_absent(&mut customer.linked_order_ids, order_id);
        }
        if let Some(order) = state.orders.get_mut(order_id) {
            push_if_absent(&mut order.linked_customer_ids, customer_id);
        }
        Ok(())
    }

    async fn set_entry_active(&self, entry_id: &str, active: bool) -> Result<()> {
        let mut state = self.write()?;
        let entry = state
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", entry_id)))?;
        entry.active = active;
        Ok(())
    }
}
