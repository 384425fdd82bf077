//! Period summary: cash flow, bill coverage, mileage, burn rate, and
//! break-even projection for a day, month, or year window.

use chrono::{NaiveDate, Utc};
use futures::try_join;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::civil::{civil_today, days_elapsed, due_date_in_month, parse_hhmm, period_window, ViewMode};
use crate::error::Result;
use crate::mileage::differenced_miles;
use crate::records::{Bill, LedgerEntry, UserSettings};
use crate::store::RecordStore;

/// Income summed per source tag, sorted descending by amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagTotal {
    pub tag: String,
    pub total: f64,
}

/// Everything the dashboard needs for one period, computed in a single
/// synchronous pass over already-fetched records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub user_id: String,
    pub mode: ViewMode,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    pub gross_income: f64,
    pub non_bill_expenses: f64,
    pub bill_expenses_recorded: f64,
    pub total_bills_due: f64,
    /// max(0, total_bills_due - bill_expenses_recorded)
    pub unpaid_bills: f64,
    /// gross_income - non_bill_expenses - total_bills_due
    pub free_cash: f64,
    pub last_due_date: Option<NaiveDate>,
    pub days_until_last_bill: i64,

    pub mileage_rate: f64,
    pub miles_in_period: f64,
    pub miles_today: f64,
    pub mileage_savings: f64,
    pub mileage_savings_today: f64,

    pub actual_days_elapsed: i64,
    pub average_daily_income: f64,
    pub average_daily_expenses: f64,
    pub net_daily_cash_flow: f64,
    pub daily_burn_rate: f64,
    /// Projected days until free cash covers all unpaid bills. `None`
    /// when there is nothing unpaid.
    pub days_to_break_even: Option<i64>,

    pub today_income: f64,
    pub today_expenses: f64,
    pub today_net: f64,

    pub hours_worked: f64,
    pub earnings_per_hour: Option<f64>,
    pub earnings_per_mile: Option<f64>,

    pub income_breakdown: Vec<TagTotal>,
}

pub struct SummaryCalculator<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> SummaryCalculator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Summarize the period anchored at `reference`, using the current
    /// civil date as "today".
    pub async fn summarize(
        &self,
        user_id: &str,
        reference: NaiveDate,
        mode: ViewMode,
    ) -> Result<Summary> {
        self.summarize_at(user_id, reference, mode, civil_today(Utc::now()))
            .await
    }

    /// Summarize with an explicit "today", for deterministic callers.
    pub async fn summarize_at(
        &self,
        user_id: &str,
        reference: NaiveDate,
        mode: ViewMode,
        today: NaiveDate,
    ) -> Result<Summary> {
        let (period_start, period_end) = period_window(reference, mode);
        debug!(
            "summarizing {} for {} ({:?}: {}..{})",
            user_id, reference, mode, period_start, period_end
        );

        // The three record sets are independent; fetch them together.
        let (settings, entries, bills) = try_join!(
            self.store.settings(user_id),
            self.store.entries_in_range(user_id, period_start, period_end),
            self.store.active_bills(user_id),
        )?;
        let mileage_rate = settings
            .unwrap_or_else(|| UserSettings::for_user(user_id))
            .mileage_rate;

        // Balance adjustments true-up running totals; they are not cash flow.
        let entries: Vec<&LedgerEntry> =
            entries.iter().filter(|e| !e.is_balance_adjustment).collect();

        let gross_income: f64 = entries.iter().filter(|e| e.is_income()).map(|e| e.amount).sum();
        let non_bill_expenses: f64 = entries
            .iter()
            .filter(|e| !e.is_income() && !e.is_bill)
            .map(|e| e.amount)
            .sum();
        let bill_expenses_recorded: f64 = entries
            .iter()
            .filter(|e| !e.is_income() && e.is_bill)
            .map(|e| e.amount)
            .sum();

        let (total_bills_due, last_due_date) =
            bills_due_in_period(&bills, reference, mode, period_start, period_end);
        let unpaid_bills = (total_bills_due - bill_expenses_recorded).max(0.0);
        let free_cash = gross_income - non_bill_expenses - total_bills_due;
        let days_until_last_bill = last_due_date
            .map(|due| (due - reference).num_days().max(0))
            .unwrap_or(0);

        // Mileage over the period, and again for today when it is inside
        // the window. Priors anchor the first in-window reading.
        let (period_readings, prior_readings) = try_join!(
            self.store.work_mileage_in_range(user_id, period_start, period_end),
            self.store.work_mileage_before(user_id, period_start),
        )?;
        let miles_in_period = differenced_miles(&period_readings, &prior_readings);

        let today_in_period = today >= period_start && today <= period_end;
        let miles_today = if today_in_period {
            let (today_readings, before_today) = try_join!(
                self.store.work_mileage_in_range(user_id, today, today),
                self.store.work_mileage_before(user_id, today),
            )?;
            differenced_miles(&today_readings, &before_today)
        } else {
            0.0
        };

        let elapsed_end = if today < period_end { today } else { period_end };
        let actual_days_elapsed = days_elapsed(period_start, elapsed_end);

        let average_daily_income = gross_income / actual_days_elapsed as f64;
        let average_daily_expenses =
            (non_bill_expenses + bill_expenses_recorded) / actual_days_elapsed as f64;
        let net_daily_cash_flow = average_daily_income - average_daily_expenses;
        let daily_burn_rate = if net_daily_cash_flow != 0.0 {
            net_daily_cash_flow.abs()
        } else {
            average_daily_expenses
        };

        let days_to_break_even = if unpaid_bills > 0.0 {
            let shortfall = unpaid_bills - free_cash;
            if shortfall <= 0.0 {
                Some(days_until_last_bill)
            } else if average_daily_income > 0.0 {
                Some((shortfall / average_daily_income).ceil() as i64)
            } else {
                Some(days_until_last_bill)
            }
        } else {
            None
        };

        let today_entries: Vec<&&LedgerEntry> =
            entries.iter().filter(|e| e.date == today).collect();
        let today_income: f64 = today_entries
            .iter()
            .filter(|e| e.is_income())
            .map(|e| e.amount)
            .sum();
        let today_expenses: f64 = today_entries
            .iter()
            .filter(|e| !e.is_income() && !e.is_bill)
            .map(|e| e.amount)
            .sum();
        let today_net = today_income - today_expenses;

        let hours_worked = match mode {
            ViewMode::Day => {
                let todays: Vec<&LedgerEntry> = entries
                    .iter()
                    .filter(|e| e.is_income() && e.date == reference)
                    .copied()
                    .collect();
                day_hours(&todays)
            }
            ViewMode::Month | ViewMode::Year => {
                average_day_hours(&entries) * actual_days_elapsed as f64
            }
        };

        // Productivity is income over the period's own hours and miles.
        // In Day mode the period is the reference day itself, so these
        // remain that day's figures even when it lies in the past.
        let earnings_per_hour = if hours_worked > 0.0 {
            Some(gross_income / hours_worked)
        } else {
            None
        };
        let earnings_per_mile = if miles_in_period > 0.0 {
            Some(gross_income / miles_in_period)
        } else {
            None
        };

        let breakdown_entries: Vec<&LedgerEntry> = match mode {
            ViewMode::Day => entries
                .iter()
                .filter(|e| e.is_income() && e.date == reference)
                .copied()
                .collect(),
            ViewMode::Month | ViewMode::Year => {
                entries.iter().filter(|e| e.is_income()).copied().collect()
            }
        };
        let income_breakdown = breakdown_by_tag(&breakdown_entries);

        Ok(Summary {
            user_id: user_id.to_string(),
            mode,
            period_start,
            period_end,
            gross_income,
            non_bill_expenses,
            bill_expenses_recorded,
            total_bills_due,
            unpaid_bills,
            free_cash,
            last_due_date,
            days_until_last_bill,
            mileage_rate,
            miles_in_period,
            miles_today,
            mileage_savings: miles_in_period * mileage_rate,
            mileage_savings_today: miles_today * mileage_rate,
            actual_days_elapsed,
            average_daily_income,
            average_daily_expenses,
            net_daily_cash_flow,
            daily_burn_rate,
            days_to_break_even,
            today_income,
            today_expenses,
            today_net,
            hours_worked,
            earnings_per_hour,
            earnings_per_mile,
            income_breakdown,
        })
    }
}

/// Total amount due and the latest due date among active bills inside the
/// period. Bills are monthly obligations: day and month views count each
/// bill once against the reference month (no forward rolling — that is the
/// payment plan's concern); the year view resolves each bill against all
/// twelve months.
fn bills_due_in_period(
    bills: &[Bill],
    reference: NaiveDate,
    mode: ViewMode,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> (f64, Option<NaiveDate>) {
    use chrono::Datelike;

    let mut total = 0.0;
    let mut last_due: Option<NaiveDate> = None;

    match mode {
        ViewMode::Day | ViewMode::Month => {
            for bill in bills {
                let due = due_date_in_month(reference.year(), reference.month(), bill.due_day);
                total += bill.amount;
                last_due = Some(last_due.map_or(due, |d| d.max(due)));
            }
        }
        ViewMode::Year => {
            for month in 1..=12 {
                for bill in bills {
                    let due = due_date_in_month(reference.year(), month, bill.due_day);
                    if due >= period_start && due <= period_end {
                        total += bill.amount;
                        last_due = Some(last_due.map_or(due, |d| d.max(due)));
                    }
                }
            }
        }
    }

    (total, last_due)
}

/// Wall-clock spread between the earliest and latest income times of a
/// single day, floored at one hour so a lone data point cannot blow up a
/// per-hour rate. Zero when the day has no income entries.
fn day_hours(day_entries: &[&LedgerEntry]) -> f64 {
    let mut earliest: Option<chrono::NaiveTime> = None;
    let mut latest: Option<chrono::NaiveTime> = None;
    for entry in day_entries {
        if let Ok(t) = parse_hhmm(&entry.time) {
            earliest = Some(earliest.map_or(t, |e| e.min(t)));
            latest = Some(latest.map_or(t, |l| l.max(t)));
        }
    }
    match (earliest, latest) {
        (Some(e), Some(l)) => {
            let spread = (l - e).num_minutes() as f64 / 60.0;
            spread.max(1.0)
        }
        _ => 0.0,
    }
}

/// Mean per-day spread across the days that actually have income entries.
fn average_day_hours(entries: &[&LedgerEntry]) -> f64 {
    use std::collections::BTreeMap;

    let mut by_day: BTreeMap<NaiveDate, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in entries {
        if entry.is_income() {
            by_day.entry(entry.date).or_default().push(entry);
        }
    }
    if by_day.is_empty() {
        return 0.0;
    }

    let total: f64 = by_day.values().map(|day| day_hours(day)).sum();
    total / by_day.len() as f64
}

fn breakdown_by_tag(entries: &[&LedgerEntry]) -> Vec<TagTotal> {
    use std::collections::BTreeMap;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for entry in entries {
        *totals.entry(entry.tag.clone()).or_insert(0.0) += entry.amount;
    }

    let mut breakdown: Vec<TagTotal> = totals
        .into_iter()
        .map(|(tag, total)| TagTotal { tag, total })
        .collect();
    breakdown.sort_by(|a, b| b.total.total_cmp(&a.total));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EntryKind, MileageClass, MileageEntry};
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn entry(id: &str, kind: EntryKind, amount: f64, day: u32, time: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            user_id: "u1".to_string(),
            kind,
            amount,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            time: time.to_string(),
            is_bill: false,
            tag: "doordash".to_string(),
            active: false,
            is_balance_adjustment: false,
            linked_order_ids: vec![],
            linked_customer_ids: vec![],
            created_at: Utc::now(),
        }
    }

    fn bill(id: &str, amount: f64, due_day: u32) -> Bill {
        Bill {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: format!("bill {}", id),
            amount,
            due_day,
            is_active: true,
            use_in_plan: true,
        }
    }

    fn reading(day: u32, odometer: f64) -> MileageEntry {
        MileageEntry {
            id: format!("m{}", odometer),
            user_id: "u1".to_string(),
            odometer,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            classification: MileageClass::Work,
            car_id: None,
        }
    }

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn test_free_cash_and_unpaid_bills() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 100.0, 10, "10:00"));
        let mut exp = entry("e2", EntryKind::Expense, 40.0, 11, "12:00");
        exp.tag = "gas".to_string();
        store.insert_entry(exp);
        store.insert_bill(bill("b1", 20.0, 25));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        assert!((summary.gross_income - 100.0).abs() < 0.01);
        assert!((summary.non_bill_expenses - 40.0).abs() < 0.01);
        assert!((summary.total_bills_due - 20.0).abs() < 0.01);
        assert!(
            (summary.free_cash - 40.0).abs() < 0.01,
            "free cash should be 100 - 40 - 20 = 40, got {}",
            summary.free_cash
        );
        assert!((summary.unpaid_bills - 20.0).abs() < 0.01);
        assert_eq!(
            summary.last_due_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 25).unwrap())
        );
        assert_eq!(summary.days_until_last_bill, 10);
    }

    #[tokio::test]
    async fn test_recorded_bill_expense_reduces_unpaid() {
        let store = MemoryStore::new();
        store.insert_bill(bill("b1", 50.0, 20));
        let mut paid = entry("e1", EntryKind::Expense, 30.0, 5, "09:00");
        paid.is_bill = true;
        store.insert_entry(paid);

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        assert!((summary.bill_expenses_recorded - 30.0).abs() < 0.01);
        assert!((summary.unpaid_bills - 20.0).abs() < 0.01);
        // Bill-flagged expenses stay out of day-to-day cash flow.
        assert!((summary.non_bill_expenses - 0.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_overpaid_bills_floor_at_zero() {
        let store = MemoryStore::new();
        store.insert_bill(bill("b1", 20.0, 20));
        let mut paid = entry("e1", EntryKind::Expense, 35.0, 5, "09:00");
        paid.is_bill = true;
        store.insert_entry(paid);

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();
        assert_eq!(summary.unpaid_bills, 0.0);
        assert!(summary.days_to_break_even.is_none());
    }

    #[tokio::test]
    async fn test_balance_adjustments_are_excluded() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 100.0, 10, "10:00"));
        let mut adjustment = entry("e2", EntryKind::Income, 500.0, 10, "10:30");
        adjustment.is_balance_adjustment = true;
        store.insert_entry(adjustment);

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();
        assert!((summary.gross_income - 100.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_break_even_projection() {
        let store = MemoryStore::new();
        // 150 income over 15 elapsed days -> 10/day average.
        store.insert_entry(entry("e1", EntryKind::Income, 150.0, 10, "10:00"));
        store.insert_bill(bill("b1", 200.0, 25));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        // unpaid = 200, free_cash = 150 - 200 = -50, shortfall = 250.
        assert!((summary.average_daily_income - 10.0).abs() < 0.01);
        assert_eq!(summary.days_to_break_even, Some(25));
    }

    #[tokio::test]
    async fn test_break_even_with_cash_on_hand_uses_last_due() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 500.0, 10, "10:00"));
        store.insert_bill(bill("b1", 100.0, 25));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        // free_cash = 400 covers unpaid 100: break-even is the wait for
        // the last due date (Mar 25 from Mar 15).
        assert_eq!(summary.days_to_break_even, Some(10));
    }

    #[tokio::test]
    async fn test_break_even_without_income_falls_back() {
        let store = MemoryStore::new();
        store.insert_bill(bill("b1", 100.0, 20));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();
        assert_eq!(summary.days_to_break_even, Some(5));
        // No income and no expenses: burn metrics stay at zero sentinels.
        assert_eq!(summary.average_daily_income, 0.0);
        assert_eq!(summary.daily_burn_rate, 0.0);
    }

    #[tokio::test]
    async fn test_year_mode_counts_each_month() {
        let store = MemoryStore::new();
        store.insert_bill(bill("b1", 20.0, 31));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Year, reference())
            .await
            .unwrap();

        assert!(
            (summary.total_bills_due - 240.0).abs() < 0.01,
            "12 months x 20, got {}",
            summary.total_bills_due
        );
        assert_eq!(
            summary.last_due_date,
            Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
        );
    }

    #[tokio::test]
    async fn test_mileage_and_savings() {
        let store = MemoryStore::new();
        store.insert_mileage(reading(1, 100.0)); // before the day window
        store.insert_mileage(reading(15, 160.0));
        store.insert_entry(entry("e1", EntryKind::Income, 30.0, 15, "10:00"));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Day, reference())
            .await
            .unwrap();

        assert!((summary.miles_in_period - 60.0).abs() < 0.01);
        assert!((summary.miles_today - 60.0).abs() < 0.01);
        // Default rate 0.70.
        assert!((summary.mileage_savings - 42.0).abs() < 0.01);
        assert_eq!(summary.earnings_per_mile, Some(0.5));
    }

    #[tokio::test]
    async fn test_past_day_productivity_uses_reference_day() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 30.0, 10, "10:00"));
        store.insert_mileage(reading(9, 100.0));
        store.insert_mileage(reading(10, 160.0));

        // Summarize Mar 10 while today is Mar 15.
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", day, ViewMode::Day, reference())
            .await
            .unwrap();

        assert!((summary.hours_worked - 1.0).abs() < 0.01);
        assert_eq!(summary.earnings_per_hour, Some(30.0));
        assert_eq!(summary.earnings_per_mile, Some(0.5));
        // The "today" figures stay zero for a day in the past.
        assert_eq!(summary.today_income, 0.0);
        assert_eq!(summary.miles_today, 0.0);
    }

    #[tokio::test]
    async fn test_day_hours_floor_and_earnings_per_hour() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 30.0, 15, "10:00"));
        store.insert_entry(entry("e2", EntryKind::Income, 20.0, 15, "10:20"));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Day, reference())
            .await
            .unwrap();

        // 20-minute spread floors at one hour.
        assert!((summary.hours_worked - 1.0).abs() < 0.01);
        assert_eq!(summary.earnings_per_hour, Some(50.0));
    }

    #[tokio::test]
    async fn test_month_hours_scale_by_elapsed_days() {
        let store = MemoryStore::new();
        // Two working days, each with a 2-hour spread.
        store.insert_entry(entry("e1", EntryKind::Income, 30.0, 10, "10:00"));
        store.insert_entry(entry("e2", EntryKind::Income, 20.0, 10, "12:00"));
        store.insert_entry(entry("e3", EntryKind::Income, 25.0, 12, "14:00"));
        store.insert_entry(entry("e4", EntryKind::Income, 15.0, 12, "16:00"));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        // Average 2h/day across 15 elapsed days.
        assert!(
            (summary.hours_worked - 30.0).abs() < 0.01,
            "got {}",
            summary.hours_worked
        );
    }

    #[tokio::test]
    async fn test_income_breakdown_sorted_descending() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 10.0, 10, "10:00"));
        let mut grubhub = entry("e2", EntryKind::Income, 45.0, 11, "11:00");
        grubhub.tag = "grubhub".to_string();
        store.insert_entry(grubhub);
        store.insert_entry(entry("e3", EntryKind::Income, 20.0, 12, "12:00"));

        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, reference())
            .await
            .unwrap();

        assert_eq!(summary.income_breakdown.len(), 2);
        assert_eq!(summary.income_breakdown[0].tag, "grubhub");
        assert!((summary.income_breakdown[0].total - 45.0).abs() < 0.01);
        assert_eq!(summary.income_breakdown[1].tag, "doordash");
        assert!((summary.income_breakdown[1].total - 30.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_elapsed_days_clamp_to_today() {
        let store = MemoryStore::new();
        store.insert_entry(entry("e1", EntryKind::Income, 50.0, 1, "10:00"));

        // Today is the 5th; only 5 of the month's 31 days have elapsed.
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let summary = SummaryCalculator::new(&store)
            .summarize_at("u1", reference(), ViewMode::Month, today)
            .await
            .unwrap();
        assert_eq!(summary.actual_days_elapsed, 5);
        assert!((summary.average_daily_income - 10.0).abs() < 0.01);
    }
}
