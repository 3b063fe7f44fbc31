// Budget allocation: each item's and section's share of the declared total.
use crate::config::settings::AllocationSettings;
use serde::Serialize;
use shared::models::{Budget, LineItem, SectionMap};

/// `amount` as a percentage of `grand_total`; 0 when the total is not a
/// usable positive number.
pub fn percentage_of(amount: f64, grand_total: f64) -> f64 {
    if grand_total.is_finite() && grand_total > 0.0 && amount.is_finite() {
        amount * 100.0 / grand_total
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedSection {
    pub name: String,
    pub total: f64,
    pub rubro: f64,
    pub iacum: f64,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedBudget {
    pub budget_id: Option<i64>,
    pub project_id: i64,
    pub name: String,
    /// Declared grand total, the divisor of every percentage.
    pub total: f64,
    /// Sum of the resolved item totals.
    pub item_sum: f64,
    pub sections: Vec<AllocatedSection>,
}

impl AllocatedBudget {
    pub fn divergence(&self) -> f64 {
        self.total - self.item_sum
    }

    pub fn section(&self, name: &str) -> Option<&AllocatedSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn rubros(&self) -> Vec<f64> {
        self.sections.iter().map(|s| s.rubro).collect()
    }

    pub fn iacums(&self) -> Vec<f64> {
        self.sections.iter().map(|s| s.iacum).collect()
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Enriched items back in storage shape; owned, so later edits to the
    /// allocation never reach the copy.
    pub fn to_section_map(&self) -> SectionMap {
        let mut map = SectionMap::new();
        for section in &self.sections {
            map.insert(section.name.clone(), section.items.clone());
        }
        map
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetAllocator {
    settings: AllocationSettings,
}

impl BudgetAllocator {
    pub fn new(settings: AllocationSettings) -> Self {
        Self { settings }
    }

    pub fn allocate(&self, budget: &Budget) -> AllocatedBudget {
        let grand_total = budget.total;
        if percentage_of(1.0, grand_total) == 0.0 {
            tracing::debug!(
                budget_id = ?budget.id,
                total = grand_total,
                "Budget total is zero or missing; all percentages will be 0"
            );
        }

        let mut sections = Vec::with_capacity(budget.data.len());
        let mut iacum = 0.0;
        let mut item_sum = 0.0;

        for section in &budget.data {
            let section_total = section.total();
            let rubro = percentage_of(section_total, grand_total);
            iacum += rubro;
            item_sum += section_total;

            let items = section
                .items
                .iter()
                .map(|item| {
                    let total_price = item.resolved_total();
                    LineItem {
                        total_price: Some(total_price),
                        parcial: percentage_of(total_price, grand_total),
                        rubro,
                        ..item.clone()
                    }
                })
                .collect();

            sections.push(AllocatedSection {
                name: section.name.clone(),
                total: section_total,
                rubro,
                iacum,
                items,
            });
        }

        let allocated = AllocatedBudget {
            budget_id: budget.id,
            project_id: budget.project_id,
            name: budget.name.clone(),
            total: grand_total,
            item_sum,
            sections,
        };

        let divergence = allocated.divergence();
        if divergence.abs() > self.settings.divergence_tolerance {
            tracing::warn!(
                budget_id = ?budget.id,
                project_id = budget.project_id,
                declared_total = grand_total,
                item_sum,
                divergence,
                "Declared budget total differs from the sum of its items; cumulative share will not end at 100"
            );
        }

        allocated
    }
}

/// Allocation with default settings.
pub fn allocate(budget: &Budget) -> AllocatedBudget {
    BudgetAllocator::default().allocate(budget)
}
