// Measurement handlers: seeding a period, editing entries, committing.
use super::ObraService;
use crate::data::RecordStore;
use crate::error::EngineError;
use crate::progress::{inconsistent_entries, with_advancement};
use shared::models::Measurement;
use shared::Period;

const CONSISTENCY_TOLERANCE: f64 = 1e-6;

impl<S: RecordStore> ObraService<S> {
    /// Opening state of `period` for every item of the budget, seeded from the
    /// project's closest earlier measurement.
    pub fn start_measurement(&self, project_id: i64, budget_id: i64, period: Period) -> Result<Measurement, EngineError> {
        let budget = self.load_budget(budget_id)?;
        if budget.project_id != project_id {
            return Err(EngineError::project_mismatch(
                format!("budget {}", budget_id),
                project_id,
                budget.project_id,
            ));
        }

        let history = self.store.measurements_for_project(project_id)?;
        if history.iter().any(|m| m.period == period) {
            tracing::info!(project_id, period = %period, "Period already measured; committing will replace it");
        }

        let measurement = self
            .tracker
            .seed_measurement(project_id, Some(budget_id), period, &history, budget.data.items());
        tracing::info!(
            project_id,
            budget_id,
            period = %period,
            entries = measurement.entries.len(),
            "Measurement started"
        );
        Ok(measurement)
    }

    pub fn record_progress(&self, measurement: &Measurement, item_id: &str, monthly_progress: f64) -> Result<Measurement, EngineError> {
        self.tracker.update_entry(measurement, item_id, monthly_progress)
    }

    /// Stores the measurement with its advancement figures. A project holds
    /// one measurement per period: committing a period that is already stored
    /// replaces that record.
    pub fn commit_measurement(&mut self, measurement: Measurement) -> Result<Measurement, EngineError> {
        let mut measurement = match measurement.budget_id {
            Some(budget_id) => {
                let budget = self.allocated_budget(budget_id)?;
                if budget.project_id != measurement.project_id {
                    return Err(EngineError::project_mismatch(
                        format!("budget {}", budget_id),
                        measurement.project_id,
                        budget.project_id,
                    ));
                }
                with_advancement(&measurement, budget.items())
            }
            None => measurement,
        };

        let inconsistent = inconsistent_entries(&measurement, CONSISTENCY_TOLERANCE);
        if !inconsistent.is_empty() {
            tracing::warn!(
                project_id = measurement.project_id,
                period = %measurement.period,
                items = ?inconsistent,
                "Entries whose cumulative value differs from previous + monthly"
            );
        }

        let existing = self
            .store
            .measurements_for_project(measurement.project_id)?
            .into_iter()
            .find(|m| m.period == measurement.period);
        if let Some(existing) = existing {
            measurement.id = existing.id;
            measurement.created_at = existing.created_at;
        }

        let saved = self.store.save_measurement(measurement)?;
        tracing::info!(
            measurement_id = ?saved.id,
            project_id = saved.project_id,
            period = %saved.period,
            avance_medicion = ?saved.avance_medicion,
            avance_acumulado = ?saved.avance_acumulado,
            "Measurement committed"
        );
        Ok(saved)
    }

    pub fn measurements_for_project(&self, project_id: i64) -> Result<Vec<Measurement>, EngineError> {
        let mut measurements = self.store.measurements_for_project(project_id)?;
        measurements.sort_by_key(|m| (m.period, m.id));
        Ok(measurements)
    }
}
