// Certificate assembly: freezes one allocated budget and one measurement,
// plus the contractual fields, into a single record.
use crate::allocator::AllocatedBudget;
use crate::error::EngineError;
use crate::progress::{advancement, Advancement};
use chrono::NaiveDate;
use shared::models::{
    Certificate, CertificateData, CertificateSummary, CertificateTotals, EditedData, Measurement,
    ProgressPoint, Project, SectionMap,
};
use shared::Period;

/// One zeroed point per calendar month from `start`'s month through `end`'s
/// month, inclusive. Empty when `end` precedes `start`.
pub fn monthly_progress_series(start: NaiveDate, end: NaiveDate) -> Vec<ProgressPoint> {
    let last = Period::from_date(end);
    let mut series = Vec::new();
    let mut current = Some(Period::from_date(start));
    while let Some(period) = current {
        if period > last {
            break;
        }
        series.push(ProgressPoint::zeroed(period));
        current = period.next();
    }
    series
}

/// Item count of the snapshot and the cumulative completion of the
/// measurement: total and average per item.
pub fn summarize(snapshot: &SectionMap, measurement: &Measurement) -> CertificateSummary {
    let total_items = snapshot.item_count();
    let total_acumulado = measurement.total_cumulative();
    let promedio_acumulado = if total_items == 0 {
        0.0
    } else {
        total_acumulado / total_items as f64
    };
    CertificateSummary {
        total_items,
        total_acumulado,
        promedio_acumulado,
    }
}

/// Most recent certificate by period, then by id.
pub fn latest_certificate(certificates: &[Certificate]) -> Option<&Certificate> {
    certificates.iter().max_by_key(|c| (c.period, c.id))
}

#[derive(Debug, Clone, Default)]
pub struct CertificateAssembler;

impl CertificateAssembler {
    pub fn new() -> Self {
        CertificateAssembler
    }

    /// Builds the certificate, or rejects before building anything when the
    /// project, budget and measurement do not all belong to the same obra.
    ///
    /// `progress` defaults to a zeroed series spanning the project's dates.
    pub fn assemble(
        &self,
        project: &Project,
        budget: &AllocatedBudget,
        measurement: &Measurement,
        edited_data: EditedData,
        progress: Option<Vec<ProgressPoint>>,
    ) -> Result<Certificate, EngineError> {
        if measurement.project_id != budget.project_id {
            return Err(EngineError::project_mismatch(
                describe("measurement", measurement.id),
                budget.project_id,
                measurement.project_id,
            ));
        }
        if project.id != budget.project_id {
            return Err(EngineError::project_mismatch(
                describe("budget", budget.budget_id),
                project.id,
                budget.project_id,
            ));
        }
        if let (Some(measured_against), Some(budget_id)) = (measurement.budget_id, budget.budget_id) {
            if measured_against != budget_id {
                tracing::warn!(
                    measurement_id = ?measurement.id,
                    measured_against,
                    budget_id,
                    "Measurement was taken against a different budget of the same project"
                );
            }
        }

        let presupuesto_data = budget.to_section_map();
        let summary = summarize(&presupuesto_data, measurement);
        let totals = totals_for(budget, measurement);
        let progress = progress.unwrap_or_else(|| default_series(project));

        tracing::info!(
            project_id = project.id,
            measurement_id = ?measurement.id,
            period = %measurement.period,
            total_items = summary.total_items,
            promedio_acumulado = summary.promedio_acumulado,
            "Certificate assembled"
        );

        Ok(Certificate {
            id: None,
            project_id: project.id,
            measurement_id: measurement.id,
            period: measurement.period,
            data: CertificateData {
                edited_data,
                presupuesto_data,
                progress,
                totals,
                summary,
            },
            created_at: None,
            updated_at: None,
        })
    }
}

pub fn assemble(
    project: &Project,
    budget: &AllocatedBudget,
    measurement: &Measurement,
    edited_data: EditedData,
    progress: Option<Vec<ProgressPoint>>,
) -> Result<Certificate, EngineError> {
    CertificateAssembler::new().assemble(project, budget, measurement, edited_data, progress)
}

fn describe(kind: &str, id: Option<i64>) -> String {
    match id {
        Some(id) => format!("{} {}", kind, id),
        None => format!("unsaved {}", kind),
    }
}

fn totals_for(budget: &AllocatedBudget, measurement: &Measurement) -> CertificateTotals {
    let figures = Advancement::from_stored(measurement).unwrap_or_else(|| advancement(measurement, budget.items()));
    CertificateTotals {
        avance_periodo: Some(figures.current_percentage),
        avance_acumulado: Some(figures.accumulated_percentage),
    }
}

fn default_series(project: &Project) -> Vec<ProgressPoint> {
    match (project.start_date, project.end_date) {
        (Some(start), Some(end)) => monthly_progress_series(start, end),
        _ => {
            tracing::warn!(project_id = project.id, "Project has no start or end date; progress series left empty");
            Vec::new()
        }
    }
}
