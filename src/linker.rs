//! Auto-linking reconciler.
//!
//! Income entries, delivery orders, and OCR customer exports are created
//! by independent ingestion paths; this module cross-references them
//! after the fact. Four of the five operations share one shape: collect
//! the unlinked counterparts, require exactly one candidate, link both
//! sides. The fifth (`link_customer_to_active_orders`) is a deliberate
//! fan-out with no uniqueness gate, because a customer screenshot can
//! belong to whichever order is presently being worked.
//!
//! Every operation only ever adds references. An existing link, whether
//! auto-created or human-made, is never removed or replaced.

use log::{debug, warn};

use crate::civil::{hour_of, to_civil};
use crate::error::Result;
use crate::records::{amounts_match, labels_match, CustomerRecord, GigOrder, LedgerEntry};
use crate::store::RecordStore;

/// Ids linked by the bulk customer-to-active-orders broadcast.
#[derive(Debug, Clone, Default)]
pub struct FanoutLinks {
    pub entry_ids: Vec<String>,
    pub order_ids: Vec<String>,
}

impl FanoutLinks {
    pub fn is_empty(&self) -> bool {
        self.entry_ids.is_empty() && self.order_ids.is_empty()
    }
}

pub struct AutoLinker<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> AutoLinker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Link a new income entry to the single customer export whose app
    /// name matches its tag. Returns the linked customer id, or `None`
    /// when zero or multiple candidates exist.
    pub async fn link_entry_to_customer(&self, entry: &LedgerEntry) -> Result<Option<String>> {
        if !entry.is_income() || !entry.linked_customer_ids.is_empty() || entry.tag.trim().is_empty()
        {
            return Ok(None);
        }

        let customers = self.store.customers(&entry.user_id).await?;
        let mut candidates = customers.iter().filter(|c| {
            c.app_name
                .as_deref()
                .map(|name| labels_match(name, &entry.tag))
                .unwrap_or(false)
        });

        let first = candidates.next();
        if candidates.next().is_some() {
            debug!(
                "entry {}: multiple customer candidates for tag '{}', not linking",
                entry.id, entry.tag
            );
            return Ok(None);
        }

        match first {
            Some(customer) => {
                self.store
                    .link_entry_customer(&entry.id, &customer.id)
                    .await?;
                debug!("entry {} linked to customer {}", entry.id, customer.id);
                Ok(Some(customer.id.clone()))
            }
            None => Ok(None),
        }
    }

    /// Link a new income entry to the single unlinked order with a
    /// matching app name and payout. A match also marks the entry active: the amount
    /// and platform agreeing signals this is the order being worked.
    pub async fn link_entry_to_order(&self, entry: &LedgerEntry) -> Result<Option<String>> {
        if !entry.is_income() || !entry.linked_order_ids.is_empty() || entry.tag.trim().is_empty() {
            return Ok(None);
        }

        let orders = self.store.orders(&entry.user_id).await?;
        let mut candidates = orders.iter().filter(|o| {
            o.linked_entry_ids.is_empty()
                && labels_match(&o.app_name, &entry.tag)
                && o.money.map(|m| amounts_match(entry.amount, m)).unwrap_or(false)
        });

        let first = candidates.next();
        if candidates.next().is_some() {
            debug!(
                "entry {}: multiple order candidates for tag '{}', not linking",
                entry.id, entry.tag
            );
            return Ok(None);
        }

        match first {
            Some(order) => {
                self.store.link_entry_order(&entry.id, &order.id).await?;
                self.store.set_entry_active(&entry.id, true).await?;
                debug!("entry {} linked to order {} and marked active", entry.id, order.id);
                Ok(Some(order.id.clone()))
            }
            None => Ok(None),
        }
    }

    /// Reverse of `link_entry_to_order`, used when the order arrives
    /// after its income entry. On top of the tag and amount gates, the
    /// order's processed-at instant must land on the entry's civil date
    /// and within the same clock hour.
    pub async fn link_order_to_entry(&self, order: &GigOrder) -> Result<Option<String>> {
        let money = match order.money {
            Some(m) => m,
            None => return Ok(None),
        };
        let processed = to_civil(order.processed_at);
        let processed_hour = hour_of(&processed.time)?;

        let entries = self.store.income_entries(&order.user_id).await?;
        let mut candidates = entries.iter().filter(|e| {
            e.linked_order_ids.is_empty()
                && labels_match(&e.tag, &order.app_name)
                && amounts_match(e.amount, money)
                && e.date == processed.date
                && hour_of(&e.time).map(|h| h == processed_hour).unwrap_or(false)
        });

        let first = candidates.next();
        if candidates.next().is_some() {
            debug!(
                "order {}: multiple entry candidates for app '{}', not linking",
                order.id, order.app_name
            );
            return Ok(None);
        }

        match first {
            Some(entry) => {
                self.store.link_entry_order(&entry.id, &order.id).await?;
                self.store.set_entry_active(&entry.id, true).await?;
                debug!("order {} linked to entry {} and marked active", order.id, entry.id);
                Ok(Some(entry.id.clone()))
            }
            None => Ok(None),
        }
    }

    /// Link a customer export to the most recent matching income entry.
    /// An amount hint, when supplied, narrows the candidates to entries
    /// within currency tolerance of it.
    pub async fn link_customer_to_entry(
        &self,
        customer: &CustomerRecord,
        amount_hint: Option<f64>,
    ) -> Result<Option<String>> {
        let app_name = match customer.app_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Ok(None),
        };

        let entries = self.store.income_entries(&customer.user_id).await?;
        let mut candidates: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| {
                e.linked_customer_ids.is_empty()
                    && labels_match(&e.tag, app_name)
                    && amount_hint
                        .map(|hint| amounts_match(e.amount, hint))
                        .unwrap_or(true)
            })
            .collect();

        // Most recent first, so a unique survivor is the freshest match.
        candidates.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

        if candidates.len() != 1 {
            if candidates.len() > 1 {
                debug!(
                    "customer {}: {} entry candidates for app '{}', not linking",
                    customer.id,
                    candidates.len(),
                    app_name
                );
            }
            return Ok(None);
        }

        let entry = candidates[0];
        self.store
            .link_entry_customer(&entry.id, &customer.id)
            .await?;
        debug!("customer {} linked to entry {}", customer.id, entry.id);
        Ok(Some(entry.id.clone()))
    }

    /// Broadcast a customer export across every currently-active income
    /// entry and every order already linked to one of them. No
    /// exactly-one gate: the screenshot belongs to whichever order is
    /// open right now, and there may be several in flight.
    pub async fn link_customer_to_active_orders(
        &self,
        customer: &CustomerRecord,
    ) -> Result<FanoutLinks> {
        let active = self.store.active_income_entries(&customer.user_id).await?;

        let mut links = FanoutLinks::default();
        for entry in &active {
            if !entry.linked_customer_ids.iter().any(|id| id == &customer.id) {
                self.store
                    .link_entry_customer(&entry.id, &customer.id)
                    .await?;
                links.entry_ids.push(entry.id.clone());
            }

            for order_id in &entry.linked_order_ids {
                if links.order_ids.iter().any(|id| id == order_id) {
                    continue;
                }
                let already_linked = customer.linked_order_ids.iter().any(|id| id == order_id);
                if !already_linked {
                    self.store
                        .link_customer_order(&customer.id, order_id)
                        .await?;
                    links.order_ids.push(order_id.clone());
                }
            }
        }

        if !links.is_empty() {
            debug!(
                "customer {} fanned out to {} entries and {} orders",
                customer.id,
                links.entry_ids.len(),
                links.order_ids.len()
            );
        }
        Ok(links)
    }

    /// Fail-soft linking for a freshly created entry: attempts the
    /// customer and order scans independently, logging and swallowing
    /// failures so the creation flow that triggered them still succeeds.
    pub async fn link_new_entry(&self, entry: &LedgerEntry) -> (Option<String>, Option<String>) {
        let customer_id = match self.link_entry_to_customer(entry).await {
            Ok(id) => id,
            Err(e) => {
                warn!("customer link for entry {} failed: {}", entry.id, e);
                None
            }
        };
        let order_id = match self.link_entry_to_order(entry).await {
            Ok(id) => id,
            Err(e) => {
                warn!("order link for entry {} failed: {}", entry.id, e);
                None
            }
        };
        (customer_id, order_id)
    }

    /// Fail-soft linking for a freshly observed order.
    pub async fn observe_order(&self, order: &GigOrder) -> Option<String> {
        match self.link_order_to_entry(order).await {
            Ok(id) => id,
            Err(e) => {
                warn!("entry link for order {} failed: {}", order.id, e);
                None
            }
        }
    }

    /// Fail-soft linking for a freshly observed customer export: the
    /// unique-match scan when an app name is present, the active-order
    /// broadcast otherwise.
    pub async fn observe_customer(
        &self,
        customer: &CustomerRecord,
        amount_hint: Option<f64>,
    ) -> FanoutLinks {
        if customer.app_name.as_deref().map(|n| !n.trim().is_empty()) == Some(true) {
            let mut links = FanoutLinks::default();
            match self.link_customer_to_entry(customer, amount_hint).await {
                Ok(Some(entry_id)) => links.entry_ids.push(entry_id),
                Ok(None) => {}
                Err(e) => warn!("entry link for customer {} failed: {}", customer.id, e),
            }
            links
        } else {
            match self.link_customer_to_active_orders(customer).await {
                Ok(links) => links,
                Err(e) => {
                    warn!("active-order fanout for customer {} failed: {}", customer.id, e);
                    FanoutLinks::default()
                }
            }
        }
    }
}
