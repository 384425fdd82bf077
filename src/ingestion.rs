//! Payloads handed over by the ingestion collaborators (manual entry
//! forms, the order-screenshot pipeline, the OCR customer extractor).
//!
//! The engine never parses images or talks to vision APIs; collaborators
//! deliver already-extracted fields in these shapes. Each payload derives
//! `JsonSchema` so a collaborator can be handed a machine-readable
//! contract for what it must produce. Conversion into domain records is
//! where validation happens: a bad payload fails its own operation and
//! nothing else.

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::records::{
    money_per_mile, Bill, CustomerRecord, EntryKind, GigOrder, LedgerEntry,
};

/// A manually entered or screenshot-extracted income/expense event.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryPayload {
    pub kind: EntryKind,
    #[schemars(description = "Positive amount at currency precision")]
    pub amount: f64,
    #[schemars(description = "Civil calendar date in the fixed business timezone")]
    pub date: NaiveDate,
    #[schemars(description = "Zero-padded 24-hour HH:MM wall-clock time")]
    pub time: String,
    #[schemars(description = "Source label, e.g. the gig platform name")]
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub is_bill: bool,
    #[serde(default)]
    pub is_balance_adjustment: bool,
}

impl EntryPayload {
    pub fn into_entry(
        self,
        id: impl Into<String>,
        user_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        let entry = LedgerEntry {
            id: id.into(),
            user_id: user_id.into(),
            kind: self.kind,
            amount: self.amount,
            date: self.date,
            time: self.time,
            is_bill: self.is_bill,
            tag: self.tag,
            active: false,
            is_balance_adjustment: self.is_balance_adjustment,
            linked_order_ids: Vec::new(),
            linked_customer_ids: Vec::new(),
            created_at,
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// A delivery offer captured from a gig-platform screen.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderPayload {
    pub app_name: String,
    #[schemars(description = "Offered payout, when visible")]
    pub money: Option<f64>,
    #[schemars(description = "Offered distance in miles, when visible")]
    pub miles: Option<f64>,
    pub processed_at: DateTime<Utc>,
}

impl OrderPayload {
    pub fn into_order(self, id: impl Into<String>, user_id: impl Into<String>) -> GigOrder {
        let miles_to_money_ratio = money_per_mile(self.money, self.miles);
        GigOrder {
            id: id.into(),
            user_id: user_id.into(),
            app_name: self.app_name,
            money: self.money,
            miles: self.miles,
            miles_to_money_ratio,
            processed_at: self.processed_at,
            linked_entry_ids: Vec::new(),
            linked_customer_ids: Vec::new(),
        }
    }
}

/// Customer name and address extracted from a delivery screenshot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CustomerPayload {
    #[schemars(description = "Gig platform the screenshot came from, when identifiable")]
    pub app_name: Option<String>,
    pub customer_name: String,
    pub customer_address: String,
}

impl CustomerPayload {
    pub fn into_customer(
        self,
        id: impl Into<String>,
        user_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> CustomerRecord {
        CustomerRecord {
            id: id.into(),
            user_id: user_id.into(),
            app_name: self.app_name,
            customer_name: self.customer_name,
            customer_address: self.customer_address,
            linked_entry_ids: Vec::new(),
            linked_order_ids: Vec::new(),
            created_at,
        }
    }
}

/// A recurring bill definition from the bill-management UI.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BillPayload {
    pub name: String,
    pub amount: f64,
    #[schemars(description = "Day of month the bill is due, 1-31")]
    pub due_day: u32,
    #[serde(default)]
    pub use_in_plan: bool,
}

impl BillPayload {
    pub fn into_bill(self, id: impl Into<String>, user_id: impl Into<String>) -> Result<Bill> {
        let bill = Bill {
            id: id.into(),
            user_id: user_id.into(),
            name: self.name,
            amount: self.amount,
            due_day: self.due_day,
            is_active: true,
            use_in_plan: self.use_in_plan,
        };
        bill.validate()?;
        Ok(bill)
    }
}
