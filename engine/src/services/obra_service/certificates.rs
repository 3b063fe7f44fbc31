// Certificate handlers.
use super::ObraService;
use crate::certificate::latest_certificate;
use crate::data::RecordStore;
use crate::error::EngineError;
use shared::models::{Certificate, EditedData, ProgressPoint};

impl<S: RecordStore> ObraService<S> {
    /// Assembles and stores a certificate. Every input is read and checked
    /// before anything is written.
    ///
    /// Missing `edited_data` and `progress` are carried over from the
    /// project's latest certificate, if any.
    pub fn issue_certificate(
        &mut self,
        project_id: i64,
        budget_id: i64,
        measurement_id: i64,
        edited_data: Option<EditedData>,
        progress: Option<Vec<ProgressPoint>>,
    ) -> Result<Certificate, EngineError> {
        let project = self.store.get_project(project_id)?;
        let budget = self.allocated_budget(budget_id)?;
        let measurement = self.store.get_measurement(measurement_id)?;

        let history = self.store.certificates_for_project(project_id)?;
        let previous = latest_certificate(&history);
        if let Some(prev) = previous {
            tracing::debug!(
                project_id,
                previous_id = ?prev.id,
                previous_period = %prev.period,
                carry_edited = edited_data.is_none(),
                carry_progress = progress.is_none(),
                "Latest certificate found"
            );
        }
        let edited_data = edited_data
            .or_else(|| previous.map(|c| c.data.edited_data.clone()))
            .unwrap_or_default();
        let progress = progress.or_else(|| previous.map(|c| c.data.progress.clone()));

        let certificate = self
            .assembler
            .assemble(&project, &budget, &measurement, edited_data, progress)?;
        let saved = self.store.save_certificate(certificate)?;
        tracing::info!(
            certificate_id = ?saved.id,
            project_id,
            measurement_id,
            period = %saved.period,
            "Certificate issued"
        );
        Ok(saved)
    }

    pub fn certificates_for_project(&self, project_id: i64) -> Result<Vec<Certificate>, EngineError> {
        let mut certificates = self.store.certificates_for_project(project_id)?;
        certificates.sort_by_key(|c| (c.period, c.id));
        Ok(certificates)
    }
}
