// Persistence seam for projects, budgets, measurements and certificates.
use crate::error::EngineError;
use crate::migration::BudgetRecord;
use chrono::Utc;
use shared::models::{Certificate, Measurement, Project};
use std::collections::BTreeMap;

/// CRUD by id and listing by project id. Budgets are stored raw; callers
/// normalize them on read.
pub trait RecordStore {
    fn get_project(&self, id: i64) -> Result<Project, EngineError>;
    fn save_project(&mut self, project: Project) -> Result<Project, EngineError>;

    fn budgets_for_project(&self, project_id: i64) -> Result<Vec<BudgetRecord>, EngineError>;
    fn get_budget(&self, id: i64) -> Result<BudgetRecord, EngineError>;
    /// Inserts when `id` is `None`, replaces otherwise. Returns the stored row.
    fn save_budget(&mut self, budget: BudgetRecord) -> Result<BudgetRecord, EngineError>;
    fn delete_budget(&mut self, id: i64) -> Result<(), EngineError>;

    fn measurements_for_project(&self, project_id: i64) -> Result<Vec<Measurement>, EngineError>;
    fn get_measurement(&self, id: i64) -> Result<Measurement, EngineError>;
    fn save_measurement(&mut self, measurement: Measurement) -> Result<Measurement, EngineError>;
    fn delete_measurement(&mut self, id: i64) -> Result<(), EngineError>;

    fn certificates_for_project(&self, project_id: i64) -> Result<Vec<Certificate>, EngineError>;
    fn get_certificate(&self, id: i64) -> Result<Certificate, EngineError>;
    fn save_certificate(&mut self, certificate: Certificate) -> Result<Certificate, EngineError>;
    fn delete_certificate(&mut self, id: i64) -> Result<(), EngineError>;
}

/// In-process store. Ids come from one counter shared by every record kind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: i64,
    projects: BTreeMap<i64, Project>,
    budgets: BTreeMap<i64, BudgetRecord>,
    measurements: BTreeMap<i64, Measurement>,
    certificates: BTreeMap<i64, Certificate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn assign_id(&mut self, id: Option<i64>) -> i64 {
        match id {
            Some(id) => {
                self.next_id = self.next_id.max(id);
                id
            }
            None => {
                self.next_id += 1;
                self.next_id
            }
        }
    }
}

fn lookup<T: Clone>(rows: &BTreeMap<i64, T>, kind: &'static str, id: i64) -> Result<T, EngineError> {
    rows.get(&id).cloned().ok_or(EngineError::NotFound { kind, id })
}

fn remove<T>(rows: &mut BTreeMap<i64, T>, kind: &'static str, id: i64) -> Result<(), EngineError> {
    rows.remove(&id).map(|_| ()).ok_or(EngineError::NotFound { kind, id })
}

impl RecordStore for MemoryStore {
    fn get_project(&self, id: i64) -> Result<Project, EngineError> {
        lookup(&self.projects, "Project", id)
    }

    fn save_project(&mut self, mut project: Project) -> Result<Project, EngineError> {
        let now = Utc::now();
        self.next_id = self.next_id.max(project.id);
        project.created_at.get_or_insert(now);
        project.updated_at = Some(now);
        self.projects.insert(project.id, project.clone());
        Ok(project)
    }

    fn budgets_for_project(&self, project_id: i64) -> Result<Vec<BudgetRecord>, EngineError> {
        Ok(self.budgets.values().filter(|b| b.project_id == project_id).cloned().collect())
    }

    fn get_budget(&self, id: i64) -> Result<BudgetRecord, EngineError> {
        lookup(&self.budgets, "Budget", id)
    }

    fn save_budget(&mut self, mut budget: BudgetRecord) -> Result<BudgetRecord, EngineError> {
        let id = self.assign_id(budget.id);
        let now = Utc::now();
        budget.id = Some(id);
        budget.created_at.get_or_insert(now);
        budget.updated_at = Some(now);
        self.budgets.insert(id, budget.clone());
        Ok(budget)
    }

    fn delete_budget(&mut self, id: i64) -> Result<(), EngineError> {
        remove(&mut self.budgets, "Budget", id)
    }

    fn measurements_for_project(&self, project_id: i64) -> Result<Vec<Measurement>, EngineError> {
        Ok(self
            .measurements
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    fn get_measurement(&self, id: i64) -> Result<Measurement, EngineError> {
        lookup(&self.measurements, "Measurement", id)
    }

    fn save_measurement(&mut self, mut measurement: Measurement) -> Result<Measurement, EngineError> {
        let id = self.assign_id(measurement.id);
        let now = Utc::now();
        measurement.id = Some(id);
        measurement.created_at.get_or_insert(now);
        measurement.updated_at = Some(now);
        self.measurements.insert(id, measurement.clone());
        Ok(measurement)
    }

    fn delete_measurement(&mut self, id: i64) -> Result<(), EngineError> {
        remove(&mut self.measurements, "Measurement", id)
    }

    fn certificates_for_project(&self, project_id: i64) -> Result<Vec<Certificate>, EngineError> {
        Ok(self
            .certificates
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    fn get_certificate(&self, id: i64) -> Result<Certificate, EngineError> {
        lookup(&self.certificates, "Certificate", id)
    }

    fn save_certificate(&mut self, mut certificate: Certificate) -> Result<Certificate, EngineError> {
        let id = self.assign_id(certificate.id);
        let now = Utc::now();
        certificate.id = Some(id);
        certificate.created_at.get_or_insert(now);
        certificate.updated_at = Some(now);
        self.certificates.insert(id, certificate.clone());
        Ok(certificate)
    }

    fn delete_certificate(&mut self, id: i64) -> Result<(), EngineError> {
        remove(&mut self.certificates, "Certificate", id)
    }
}
