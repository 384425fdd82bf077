//! Odometer differencing: converts absolute per-vehicle readings into
//! attributable mileage totals. Pure functions, no I/O.

use std::collections::BTreeMap;

use crate::records::MileageEntry;

/// Total attributable miles for one user over a period.
///
/// `current` holds the readings inside the period; `prior` holds every
/// reading strictly before the period start and supplies the baseline each
/// vehicle is differenced against. Both are expected to be pre-filtered to
/// work-classified entries for a single user.
///
/// Readings never difference across vehicles, and a negative delta (meter
/// reset, rollback, a swap misrecorded under one vehicle) contributes
/// zero, so the result is always non-negative.
pub fn differenced_miles(current: &[MileageEntry], prior: &[MileageEntry]) -> f64 {
    let mut by_vehicle: BTreeMap<Option<String>, Vec<&MileageEntry>> = BTreeMap::new();
    for entry in current {
        by_vehicle
            .entry(entry.car_id.clone())
            .or_default()
            .push(entry);
    }

    let mut total = 0.0;
    for (car_id, mut readings) in by_vehicle {
        // Odometer breaks ties because two readings can share a date.
        readings.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.odometer.total_cmp(&b.odometer))
        });

        let baseline = most_recent_for_vehicle(prior, &car_id);

        let mut previous = match baseline {
            Some(anchor) => anchor.odometer,
            None => match readings.first() {
                // No baseline: the first in-period reading becomes it.
                Some(first) => first.odometer,
                None => continue,
            },
        };
        let start_index = if baseline.is_some() { 0 } else { 1 };

        for reading in &readings[start_index.min(readings.len())..] {
            let delta = reading.odometer - previous;
            if delta > 0.0 {
                total += delta;
            }
            previous = reading.odometer;
        }
    }

    total
}

fn most_recent_for_vehicle<'a>(
    prior: &'a [MileageEntry],
    car_id: &Option<String>,
) -> Option<&'a MileageEntry> {
    prior
        .iter()
        .filter(|e| &e.car_id == car_id)
        .max_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.odometer.total_cmp(&b.odometer))
        })
}
