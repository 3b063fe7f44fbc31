// Budget handlers: normalized reads, allocation and CSV import.
use super::ObraService;
use crate::allocator::AllocatedBudget;
use crate::data::{BudgetCsvParser, RecordStore};
use crate::error::EngineError;
use crate::migration::BudgetRecord;
use shared::models::Budget;
use std::path::Path;

impl<S: RecordStore> ObraService<S> {
    /// Reads a budget, converting legacy section lists to the current layout.
    pub fn load_budget(&self, budget_id: i64) -> Result<Budget, EngineError> {
        let record = self.store.get_budget(budget_id)?;
        if record.data.is_legacy() {
            tracing::debug!(budget_id, project_id = record.project_id, "Normalizing legacy budget data");
        }
        Ok(record.normalize())
    }

    pub fn budgets_for_project(&self, project_id: i64) -> Result<Vec<Budget>, EngineError> {
        Ok(self
            .store
            .budgets_for_project(project_id)?
            .into_iter()
            .map(BudgetRecord::normalize)
            .collect())
    }

    pub fn allocated_budget(&self, budget_id: i64) -> Result<AllocatedBudget, EngineError> {
        let budget = self.load_budget(budget_id)?;
        Ok(self.allocator.allocate(&budget))
    }

    /// Stores `budget` in the current layout.
    pub fn save_budget(&mut self, budget: Budget) -> Result<Budget, EngineError> {
        self.store.get_project(budget.project_id)?;
        let saved = self.store.save_budget(BudgetRecord::from(budget))?;
        tracing::info!(budget_id = ?saved.id, project_id = saved.project_id, "Budget saved");
        Ok(saved.normalize())
    }

    /// Creates a budget for `project_id` from a spreadsheet export. The
    /// declared total is the sum of the imported items.
    pub fn import_budget_csv(
        &mut self,
        project_id: i64,
        name: &str,
        file_path: impl AsRef<Path>,
    ) -> Result<Budget, EngineError> {
        self.store.get_project(project_id)?;
        let path = file_path.as_ref();
        tracing::info!(project_id, path = %path.display(), "Importing budget from CSV");

        let data = BudgetCsvParser::new(self.settings.number_format.clone()).parse_file(path)?;
        let budget = Budget {
            id: None,
            project_id,
            name: name.to_string(),
            total: data.item_sum(),
            data,
            created_at: None,
            updated_at: None,
        };
        self.save_budget(budget)
    }
}
