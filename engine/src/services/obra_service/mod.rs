// engine/src/services/obra_service/mod.rs
// ObraService ties the pure engine operations to a RecordStore. Handlers are
// grouped by record kind in the sibling modules.
use crate::allocator::BudgetAllocator;
use crate::certificate::CertificateAssembler;
use crate::config::EngineSettings;
use crate::data::RecordStore;
use crate::progress::ProgressTracker;

pub mod budgets;
pub mod certificates;
pub mod measurements;

pub struct ObraService<S: RecordStore> {
    store: S,
    settings: EngineSettings,
    allocator: BudgetAllocator,
    tracker: ProgressTracker,
    assembler: CertificateAssembler,
}

impl<S: RecordStore> ObraService<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        ObraService {
            allocator: BudgetAllocator::new(settings.allocation.clone()),
            tracker: ProgressTracker::new(settings.progress.clone()),
            assembler: CertificateAssembler::new(),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::error::EngineError;
    use crate::migration::{BudgetData, BudgetRecord};
    use chrono::NaiveDate;
    use serde_json::json;
    use shared::models::{EditedData, Project, ProjectStatus, ProgressPoint};
    use shared::Period;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn project(id: i64) -> Project {
        Project {
            id,
            name: "Hospital Zonal".to_string(),
            location: "Trelew".to_string(),
            company: "Patagonia Obras SRL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 31),
            status: ProjectStatus::InProgress,
            created_at: None,
            updated_at: None,
        }
    }

    fn legacy_budget(project_id: i64) -> BudgetRecord {
        let data = json!({
            "secciones": [
                {
                    "nombre": "Movimiento de suelos",
                    "items": [
                        {"id": 1, "nombre": "Excavación", "unidad": "m3", "cantidad": 10, "precioUnitario": 30, "total": 300},
                        {"id": 2, "nombre": "Relleno", "unidad": "m3", "cantidad": 4, "precioUnitario": 50, "total": 200}
                    ]
                },
                {
                    "nombre": "Estructura",
                    "items": [
                        {"id": 3, "nombre": "Hormigón", "unidad": "m3", "cantidad": 1, "precioUnitario": 500, "total": 500}
                    ]
                }
            ]
        });
        BudgetRecord {
            id: None,
            project_id,
            name: "Oficial".to_string(),
            total: 1000.0,
            data: BudgetData::from_value(data),
            created_at: None,
            updated_at: None,
        }
    }

    /// Service with project 1, a second project 2, and one legacy budget for
    /// project 1. Returns the budget id.
    fn create_test_service() -> (ObraService<MemoryStore>, i64) {
        let mut service = ObraService::new(MemoryStore::new(), EngineSettings::default());
        service.store_mut().save_project(project(1)).unwrap();
        service.store_mut().save_project(project(2)).unwrap();
        let budget = service.store_mut().save_budget(legacy_budget(1)).unwrap();
        let budget_id = budget.id.unwrap();
        (service, budget_id)
    }

    fn period(month: u32) -> Period {
        Period::new(2025, month).unwrap()
    }

    #[test]
    fn test_load_budget_normalizes_legacy_data() {
        let (service, budget_id) = create_test_service();
        let budget = service.load_budget(budget_id).unwrap();
        let names: Vec<&str> = budget.data.section_names().collect();
        assert_eq!(names, vec!["Movimiento de suelos", "Estructura"]);
        let excavacion = budget.data.find_item("1").unwrap();
        assert_eq!(excavacion.name, "Excavación");
        assert_eq!(excavacion.total_price, Some(300.0));
    }

    #[test]
    fn test_allocated_budget() {
        let (service, budget_id) = create_test_service();
        let allocated = service.allocated_budget(budget_id).unwrap();
        assert_close(allocated.sections[0].rubro, 50.0);
        assert_close(allocated.sections[1].iacum, 100.0);
        assert!(matches!(service.allocated_budget(99), Err(EngineError::NotFound { kind: "Budget", .. })));
    }

    #[test]
    fn test_measurement_chain_across_periods() {
        let (mut service, budget_id) = create_test_service();

        let january = service.start_measurement(1, budget_id, period(1)).unwrap();
        assert_eq!(january.entries.len(), 3);
        assert!(january.entries.values().all(|e| e.cumulative_current == 0.0));
        let january = service.record_progress(&january, "1", 40.0).unwrap();
        let january = service.record_progress(&january, "3", 10.0).unwrap();
        let january = service.commit_measurement(january).unwrap();
        // 40 % of 300 + 10 % of 500 = 170 of 1000
        assert_close(january.avance_medicion.unwrap(), 17.0);
        assert_close(january.presupuesto_total.unwrap(), 1000.0);

        let march = service.start_measurement(1, budget_id, period(3)).unwrap();
        let entry = march.entry("1").unwrap();
        assert_eq!(entry.cumulative_previous, 40.0);
        assert_eq!(entry.cumulative_current, 40.0);
        assert_eq!(entry.monthly_progress, 0.0);
        assert_eq!(march.budget_id, Some(budget_id));
    }

    #[test]
    fn test_start_measurement_rejects_foreign_budget() {
        let (service, budget_id) = create_test_service();
        let err = service.start_measurement(2, budget_id, period(1)).unwrap_err();
        assert!(matches!(err, EngineError::ProjectMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_recommit_same_period_overwrites() {
        let (mut service, budget_id) = create_test_service();
        let first = service.start_measurement(1, budget_id, period(2)).unwrap();
        let first = service.commit_measurement(first).unwrap();

        let again = service.start_measurement(1, budget_id, period(2)).unwrap();
        let again = service.record_progress(&again, "2", 25.0).unwrap();
        let again = service.commit_measurement(again).unwrap();

        assert_eq!(again.id, first.id);
        let stored = service.measurements_for_project(1).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].entry("2").unwrap().cumulative_current, 25.0);
    }

    #[test]
    fn test_record_progress_unknown_item() {
        let (service, budget_id) = create_test_service();
        let m = service.start_measurement(1, budget_id, period(1)).unwrap();
        assert!(matches!(service.record_progress(&m, "404", 5.0), Err(EngineError::UnknownLineItem(_))));
    }

    #[test]
    fn test_issue_certificate() {
        let (mut service, budget_id) = create_test_service();
        let m = service.start_measurement(1, budget_id, period(2)).unwrap();
        let m = service.record_progress(&m, "1", 100.0).unwrap();
        let m = service.record_progress(&m, "2", 50.0).unwrap();
        let m = service.commit_measurement(m).unwrap();

        let mut edited = EditedData::default();
        edited.contratista = "Patagonia Obras SRL".to_string();
        let cert = service.issue_certificate(1, budget_id, m.id.unwrap(), Some(edited), None).unwrap();

        assert!(cert.id.is_some());
        assert_eq!(cert.measurement_id, m.id);
        assert_eq!(cert.data.summary.total_items, 3);
        assert_close(cert.data.summary.total_acumulado, 150.0);
        assert_close(cert.data.summary.promedio_acumulado, 50.0);
        assert_eq!(cert.data.progress.len(), 3);
        assert_close(cert.data.presupuesto_data.find_item("3").unwrap().parcial, 50.0);
        assert_eq!(service.certificates_for_project(1).unwrap().len(), 1);
    }

    #[test]
    fn test_issue_certificate_rejects_before_writing() {
        let (mut service, budget_id) = create_test_service();
        let foreign = service.store_mut().save_budget(legacy_budget(2)).unwrap();
        let m = service.start_measurement(2, foreign.id.unwrap(), period(1)).unwrap();
        let m = service.commit_measurement(m).unwrap();

        let err = service
            .issue_certificate(1, budget_id, m.id.unwrap(), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::ProjectMismatch { .. }));
        assert!(service.certificates_for_project(1).unwrap().is_empty());
        assert!(service.certificates_for_project(2).unwrap().is_empty());
    }

    #[test]
    fn test_issue_certificate_carries_forward_latest() {
        let (mut service, budget_id) = create_test_service();
        let jan = service.start_measurement(1, budget_id, period(1)).unwrap();
        let jan = service.commit_measurement(jan).unwrap();
        let feb = service.start_measurement(1, budget_id, period(2)).unwrap();
        let feb = service.commit_measurement(feb).unwrap();

        let mut edited = EditedData::default();
        edited.nro_expediente = "EX-2025-001".to_string();
        let mut point = ProgressPoint::zeroed(period(1));
        point.value1 = 12.0;
        service
            .issue_certificate(1, budget_id, jan.id.unwrap(), Some(edited), Some(vec![point.clone()]))
            .unwrap();

        let second = service.issue_certificate(1, budget_id, feb.id.unwrap(), None, None).unwrap();
        assert_eq!(second.data.edited_data.nro_expediente, "EX-2025-001");
        assert_eq!(second.data.progress, vec![point]);
    }

    #[test]
    fn test_import_budget_csv() {
        let (mut service, _) = create_test_service();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Rubro;Codigo;Descripcion;Unidad;Cantidad;Precio Unitario\n\
             Instalaciones;I-01;Tablero seccional;u;2;1.500,00\n\
             Instalaciones;I-02;Cableado;ml;100;10,00"
        )
        .unwrap();
        file.flush().unwrap();

        let budget = service.import_budget_csv(2, "Instalaciones", file.path()).unwrap();
        assert!(budget.id.is_some());
        assert_eq!(budget.project_id, 2);
        assert_close(budget.total, 4000.0);

        let allocated = service.allocated_budget(budget.id.unwrap()).unwrap();
        assert_close(allocated.section("Instalaciones").unwrap().rubro, 100.0);
        assert_close(allocated.items().next().unwrap().parcial, 75.0);
    }

    #[test]
    fn test_import_budget_csv_unknown_project() {
        let (mut service, _) = create_test_service();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Rubro;Codigo;Descripcion;Unidad;Cantidad;Precio Unitario").unwrap();
        let err = service.import_budget_csv(77, "x", file.path()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "Project", id: 77 }));
    }
}
