use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::civil::parse_hhmm;
use crate::error::{LedgerError, Result};

/// Default IRS per-mile deduction rate applied when a user has no settings
/// record.
pub const DEFAULT_MILEAGE_RATE: f64 = 0.70;

/// Two amounts are considered equal when they differ by strictly less than
/// this (currency precision).
pub const AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single income or expense record ("transaction" in the ingestion
/// collaborators' vocabulary).
///
/// `date` and `time` are civil wall-clock values in the fixed business
/// timezone (see `civil`). The linked-id lists are mutual references
/// maintained by the auto-linker; they are only ever grown, never
/// overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: f64,
    pub date: NaiveDate,
    /// Zero-padded 24-hour "HH:MM".
    pub time: String,
    /// Bills are expenses but are excluded from day-to-day cash flow.
    pub is_bill: bool,
    /// Free-text source label, e.g. the gig platform name.
    pub tag: String,
    /// Marks the income event the user is currently working against.
    pub active: bool,
    /// True-up records that correct a running balance; excluded from all
    /// summary aggregates.
    pub is_balance_adjustment: bool,
    #[serde(default)]
    pub linked_order_ids: Vec<String>,
    #[serde(default)]
    pub linked_customer_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_income(&self) -> bool {
        self.kind == EntryKind::Income
    }

    /// Validate the fields an ingestion path is allowed to supply.
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        parse_hhmm(&self.time)?;
        Ok(())
    }
}

/// A gig-platform delivery order observed by the order-ingestion
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GigOrder {
    pub id: String,
    pub user_id: String,
    pub app_name: String,
    /// Offered payout, when the screenshot showed one.
    pub money: Option<f64>,
    /// Offered distance in miles.
    pub miles: Option<f64>,
    /// money / miles, derived at ingestion time.
    pub miles_to_money_ratio: Option<f64>,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub linked_entry_ids: Vec<String>,
    #[serde(default)]
    pub linked_customer_ids: Vec<String>,
}

/// Derive the payout-per-mile ratio; `None` when either side is missing or
/// the distance is zero.
pub fn money_per_mile(money: Option<f64>, miles: Option<f64>) -> Option<f64> {
    match (money, miles) {
        (Some(m), Some(d)) if d > 0.0 => Some(m / d),
        _ => None,
    }
}

/// A customer extracted from a delivery screenshot by the OCR collaborator
/// (an "OCR export").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub user_id: String,
    /// Gig platform the screenshot came from, when known.
    pub app_name: Option<String>,
    pub customer_name: String,
    pub customer_address: String,
    #[serde(default)]
    pub linked_entry_ids: Vec<String>,
    #[serde(default)]
    pub linked_order_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A recurring monthly obligation. `due_day` is a day of month (1-31),
/// clamped to shorter months when resolved against a calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub amount: f64,
    pub due_day: u32,
    pub is_active: bool,
    /// Opt-in for the payment plan allocator.
    pub use_in_plan: bool,
}

impl Bill {
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.amount)?;
        validate_due_day(self.due_day)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MileageClass {
    Work,
    Personal,
}

impl MileageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
        }
    }
}

impl std::str::FromStr for MileageClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "personal" => Ok(Self::Personal),
            _ => Err(format!("Unknown mileage classification: {}", s)),
        }
    }
}

impl std::fmt::Display for MileageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw odometer reading. Readings with no `car_id` all belong to one
/// implicit vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MileageEntry {
    pub id: String,
    pub user_id: String,
    pub odometer: f64,
    pub date: NaiveDate,
    pub classification: MileageClass,
    pub car_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// Per-mile reimbursement rate used for the mileage-savings figure.
    pub mileage_rate: f64,
}

impl UserSettings {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mileage_rate: DEFAULT_MILEAGE_RATE,
        }
    }
}

pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

pub fn validate_due_day(due_day: u32) -> Result<()> {
    if !(1..=31).contains(&due_day) {
        return Err(LedgerError::InvalidDueDay(due_day));
    }
    Ok(())
}

/// Case-insensitive comparison used for every tag/app-name match.
pub fn labels_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Currency-precision amount comparison (strictly within tolerance).
pub fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() < AMOUNT_TOLERANCE
}
