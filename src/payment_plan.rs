//! Greedy multi-day bill payment simulation.
//!
//! The allocation policy is earliest-due-first: each simulated day the
//! open bills are re-sorted by due date (ties keep their input order) and
//! the daily budget is poured into them in that order. Bills join the
//! plan as soon as they opt in; payment is never deferred until the due
//! date arrives. Greedy is the policy, not an accident — when the budget
//! runs short, the soonest-due bill is the one kept whole.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::civil::next_due_date;
use crate::error::{LedgerError, Result};
use crate::records::{Bill, AMOUNT_TOLERANCE};

/// Hard bound on the simulation; bills still open at this point produce a
/// warning instead of an endless loop.
pub const MAX_PLAN_DAYS: u64 = 365;

/// How the daily budget is distributed among open bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Pay the bill with the soonest due date first; ties preserve the
    /// bills' input order.
    #[default]
    EarliestDueFirst,
}

/// One payment in the simulated schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub date: NaiveDate,
    pub bill_id: String,
    pub bill_name: String,
    pub amount: f64,
    /// Balance remaining on the bill after this payment.
    pub remaining_balance: f64,
    pub due_date: NaiveDate,
}

/// The full simulated schedule plus a per-date view for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub policy: AllocationPolicy,
    pub schedule: Vec<ScheduledPayment>,
    pub by_date: BTreeMap<NaiveDate, Vec<ScheduledPayment>>,
    pub warnings: Vec<String>,
}

struct OpenBill {
    id: String,
    name: String,
    amount_due: f64,
    due_date: NaiveDate,
    /// Input position, the tie-break when due dates collide.
    position: usize,
}

/// Simulate paying down every opted-in bill with a fixed daily budget,
/// starting at `start`.
pub fn allocate(bills: &[Bill], start: NaiveDate, daily_budget: f64) -> Result<PaymentPlan> {
    allocate_with_policy(bills, start, daily_budget, AllocationPolicy::EarliestDueFirst)
}

pub fn allocate_with_policy(
    bills: &[Bill],
    start: NaiveDate,
    daily_budget: f64,
    policy: AllocationPolicy,
) -> Result<PaymentPlan> {
    if !daily_budget.is_finite() || daily_budget <= 0.0 {
        return Err(LedgerError::InvalidAmount(daily_budget));
    }

    let mut open: Vec<OpenBill> = bills
        .iter()
        .filter(|b| b.use_in_plan)
        .enumerate()
        .map(|(position, b)| OpenBill {
            id: b.id.clone(),
            name: b.name.clone(),
            amount_due: b.amount,
            due_date: next_due_date(b.due_day, start),
            position,
        })
        .collect();

    debug!(
        "allocating {:.2}/day across {} bills from {}",
        daily_budget,
        open.len(),
        start
    );

    let mut schedule = Vec::new();
    let mut warnings = Vec::new();
    let mut day = start;

    for _ in 0..MAX_PLAN_DAYS {
        if open.is_empty() {
            break;
        }

        match policy {
            AllocationPolicy::EarliestDueFirst => {
                open.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.position.cmp(&b.position)));
            }
        }

        let mut budget = daily_budget;
        for bill in open.iter_mut() {
            if budget <= 0.0 {
                break;
            }
            let payment = budget.min(bill.amount_due);
            if payment <= 0.0 {
                continue;
            }
            budget -= payment;
            bill.amount_due -= payment;
            schedule.push(ScheduledPayment {
                date: day,
                bill_id: bill.id.clone(),
                bill_name: bill.name.clone(),
                amount: payment,
                remaining_balance: bill.amount_due.max(0.0),
                due_date: bill.due_date,
            });
        }

        open.retain(|b| b.amount_due > AMOUNT_TOLERANCE);
        day = day + Days::new(1);
    }

    if !open.is_empty() {
        for bill in &open {
            warn!(
                "payment plan did not converge: '{}' still owes {:.2} after {} days",
                bill.name, bill.amount_due, MAX_PLAN_DAYS
            );
            warnings.push(format!(
                "'{}' still owes {:.2} after {} simulated days; raise the daily budget",
                bill.name, bill.amount_due, MAX_PLAN_DAYS
            ));
        }
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<ScheduledPayment>> = BTreeMap::new();
    for payment in &schedule {
        by_date.entry(payment.date).or_default().push(payment.clone());
    }

    Ok(PaymentPlan {
        policy,
        schedule,
        by_date,
        warnings,
    })
}
