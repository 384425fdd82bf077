//! # Gig Ledger
//!
//! A library for reconciling a gig worker's loosely-coupled financial
//! records (manual entries, OCR-extracted screenshots, platform order
//! captures) into a consistent picture, then projecting it forward.
//!
//! ## Core Concepts
//!
//! - **Auto-linking**: income entries, delivery orders, and OCR customer
//!   exports arrive through independent ingestion paths; the linker
//!   cross-references them, creating a bidirectional link only when the
//!   match is unambiguous (exactly one unlinked candidate)
//! - **Mileage differencing**: raw per-vehicle odometer readings become
//!   trustworthy mileage deltas; negative deltas (resets, rollbacks)
//!   contribute zero
//! - **Period summaries**: day/month/year cash-flow, bill-coverage,
//!   burn-rate, and break-even metrics over the reconciled records
//! - **Payment planning**: a greedy earliest-due-first simulation of how
//!   a fixed daily budget pays down the opted-in bills
//! - **Fixed civil timezone**: all wall-clock fields are interpreted at a
//!   fixed UTC-5 offset, isolated in the `civil` module
//!
//! ## Example
//!
//! ```rust,ignore
//! use gig_ledger::*;
//! use chrono::NaiveDate;
//!
//! let store = MemoryStore::new();
//! // ... ingestion collaborators insert records ...
//!
//! let linker = AutoLinker::new(&store);
//! let summary = SummaryCalculator::new(&store)
//!     .summarize("user-1", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), ViewMode::Month)
//!     .await?;
//! ```

pub mod civil;
pub mod error;
pub mod ingestion;
pub mod linker;
pub mod mileage;
pub mod payment_plan;
pub mod records;
pub mod store;
pub mod summary;

pub use civil::{
    civil_today, from_civil, parse_hhmm, period_window, to_civil, CivilStamp, ViewMode,
};
pub use error::{LedgerError, Result};
pub use ingestion::{BillPayload, CustomerPayload, EntryPayload, OrderPayload};
pub use linker::{AutoLinker, FanoutLinks};
pub use mileage::differenced_miles;
pub use payment_plan::{
    allocate, allocate_with_policy, AllocationPolicy, PaymentPlan, ScheduledPayment,
    MAX_PLAN_DAYS,
};
pub use records::{
    Bill, CustomerRecord, EntryKind, GigOrder, LedgerEntry, MileageClass, MileageEntry,
    UserSettings, AMOUNT_TOLERANCE, DEFAULT_MILEAGE_RATE,
};
pub use store::{MemoryStore, RecordStore};
pub use summary::{Summary, SummaryCalculator, TagTotal};
