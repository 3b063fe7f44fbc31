// Progress tracking: chaining each month's measurement onto the closest
// earlier one, and keeping every entry's cumulative value consistent.
pub mod advancement;

pub use advancement::{advancement, with_advancement, Advancement};

use crate::config::settings::ProgressSettings;
use crate::error::EngineError;
use shared::models::{LineItem, Measurement, MeasurementEntry};
use shared::Period;
use std::cmp::Reverse;

/// The measurement a new period draws its baseline from: the latest one
/// strictly before `target`. Same-month and later measurements never qualify.
pub fn find_predecessor(target: Period, history: &[Measurement]) -> Option<&Measurement> {
    history
        .iter()
        .filter(|m| m.period < target)
        .min_by_key(|m| (target.months_since(m.period), Reverse(m.id)))
}

/// Ids of entries whose cumulative value does not match previous + monthly.
pub fn inconsistent_entries(measurement: &Measurement, tolerance: f64) -> Vec<&str> {
    measurement
        .entries
        .iter()
        .filter(|(_, entry)| !entry.is_consistent(tolerance))
        .map(|(id, _)| id.as_str())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    settings: ProgressSettings,
}

impl ProgressTracker {
    pub fn new(settings: ProgressSettings) -> Self {
        Self { settings }
    }

    /// Builds the opening state of `target` for every current budget item.
    ///
    /// Items found in the predecessor carry its cumulative value into both
    /// `cumulative_previous` and `cumulative_current`; items added to the
    /// budget since then, and every item when there is no predecessor, start
    /// at zero.
    pub fn seed_measurement<'a, I>(
        &self,
        project_id: i64,
        budget_id: Option<i64>,
        target: Period,
        history: &[Measurement],
        budget_items: I,
    ) -> Measurement
    where
        I: IntoIterator<Item = &'a LineItem>,
    {
        let foreign = history.iter().filter(|m| m.project_id != project_id).count();
        if foreign > 0 {
            tracing::debug!(project_id, foreign, "Ignoring measurements of other projects in history");
        }
        let own: Vec<Measurement> = history
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        let predecessor = find_predecessor(target, &own);

        match predecessor {
            Some(prev) => tracing::debug!(
                project_id,
                target = %target,
                predecessor_period = %prev.period,
                predecessor_id = ?prev.id,
                "Seeding measurement from previous period"
            ),
            None => tracing::debug!(project_id, target = %target, "No earlier measurement; seeding from zero"),
        }

        let mut measurement = Measurement::new(project_id, target);
        measurement.budget_id = budget_id;

        for item in budget_items {
            let entry = predecessor
                .and_then(|prev| prev.entry(&item.id))
                .map(|prev_entry| MeasurementEntry::carried(prev_entry.cumulative_current))
                .unwrap_or_default();
            measurement.entries.insert(item.id.clone(), entry);
        }

        measurement
    }

    /// Sets this period's progress for one item and recomputes its cumulative
    /// value. `cumulative_previous` is never changed here.
    pub fn update_entry(
        &self,
        measurement: &Measurement,
        item_id: &str,
        monthly_progress: f64,
    ) -> Result<Measurement, EngineError> {
        let current = measurement
            .entry(item_id)
            .ok_or_else(|| EngineError::UnknownLineItem(item_id.to_string()))?;

        let monthly_progress = if monthly_progress.is_finite() { monthly_progress } else { 0.0 };
        let monthly_progress = self.apply_policy(item_id, current.cumulative_previous, monthly_progress);

        let mut updated = measurement.clone();
        updated
            .entries
            .insert(item_id.to_string(), MeasurementEntry::new(current.cumulative_previous, monthly_progress));
        // Stored advancement no longer matches the entries.
        updated.avance_medicion = None;
        updated.avance_acumulado = None;
        updated.presupuesto_total = None;
        Ok(updated)
    }

    fn apply_policy(&self, item_id: &str, previous: f64, monthly: f64) -> f64 {
        if !self.settings.clamp_to_percent || !previous.is_finite() {
            return monthly;
        }
        let clamped = monthly.clamp(-previous, 100.0 - previous);
        if clamped != monthly {
            tracing::info!(item_id, requested = monthly, applied = clamped, "Monthly progress clamped to keep cumulative within 0-100");
        }
        clamped
    }
}

/// Seeding with default settings.
pub fn seed_measurement<'a, I>(project_id: i64, target: Period, history: &[Measurement], budget_items: I) -> Measurement
where
    I: IntoIterator<Item = &'a LineItem>,
{
    ProgressTracker::default().seed_measurement(project_id, None, target, history, budget_items)
}

/// Entry update with default settings (no clamping).
pub fn update_entry(measurement: &Measurement, item_id: &str, monthly_progress: f64) -> Result<Measurement, EngineError> {
    ProgressTracker::default().update_entry(measurement, item_id, monthly_progress)
}
