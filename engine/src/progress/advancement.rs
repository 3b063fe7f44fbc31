// Monetary advancement of a measurement: how much of the budget the period's
// and the accumulated percentages are worth.
use crate::allocator::percentage_of;
use serde::Serialize;
use shared::models::{LineItem, Measurement};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advancement {
    pub budget_total: f64,
    pub current_amount: f64,
    pub previous_amount: f64,
    pub accumulated_amount: f64,
    pub current_percentage: f64,
    pub previous_percentage: f64,
    pub accumulated_percentage: f64,
}

impl Advancement {
    /// Rebuilds the figures from the values stored on a saved measurement,
    /// when all three are present.
    pub fn from_stored(measurement: &Measurement) -> Option<Advancement> {
        let total = measurement.presupuesto_total?;
        let current = measurement.avance_medicion?;
        let accumulated = measurement.avance_acumulado?;
        let previous = accumulated - current;
        Some(Advancement {
            budget_total: total,
            current_amount: total * current / 100.0,
            previous_amount: total * previous / 100.0,
            accumulated_amount: total * accumulated / 100.0,
            current_percentage: current,
            previous_percentage: previous,
            accumulated_percentage: accumulated,
        })
    }
}

/// Weights each entry by its line item's total price. Entries without a
/// matching item add nothing; the budget total is the sum of item totals.
pub fn advancement<'a, I>(measurement: &Measurement, budget_items: I) -> Advancement
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut budget_total = 0.0;
    let mut current_amount = 0.0;
    let mut previous_amount = 0.0;

    for item in budget_items {
        let price = item.resolved_total();
        budget_total += price;
        if let Some(entry) = measurement.entry(&item.id) {
            current_amount += price * entry.monthly_progress / 100.0;
            previous_amount += price * entry.cumulative_previous / 100.0;
        }
    }

    let accumulated_amount = current_amount + previous_amount;
    Advancement {
        budget_total,
        current_amount,
        previous_amount,
        accumulated_amount,
        current_percentage: percentage_of(current_amount, budget_total),
        previous_percentage: percentage_of(previous_amount, budget_total),
        accumulated_percentage: percentage_of(accumulated_amount, budget_total),
    }
}

/// Copy of `measurement` carrying its advancement figures.
pub fn with_advancement<'a, I>(measurement: &Measurement, budget_items: I) -> Measurement
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let figures = advancement(measurement, budget_items);
    Measurement {
        avance_medicion: Some(figures.current_percentage),
        avance_acumulado: Some(figures.accumulated_percentage),
        presupuesto_total: Some(figures.budget_total),
        ..measurement.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::MeasurementEntry;
    use shared::Period;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn setup() -> (Measurement, Vec<LineItem>) {
        let items = vec![
            LineItem::new("a", "Excavación", "m3", 1.0, 600.0),
            LineItem::new("b", "Relleno", "m3", 1.0, 400.0),
        ];
        let mut m = Measurement::new(1, Period::new(2025, 4).unwrap());
        m.entries.insert("a".into(), MeasurementEntry::new(50.0, 10.0));
        m.entries.insert("b".into(), MeasurementEntry::new(0.0, 25.0));
        m.entries.insert("orphan".into(), MeasurementEntry::new(100.0, 0.0));
        (m, items)
    }

    #[test]
    fn test_amounts_weighted_by_item_price() {
        let (m, items) = setup();
        let adv = advancement(&m, &items);
        assert_close(adv.budget_total, 1000.0);
        assert_close(adv.current_amount, 60.0 + 100.0);
        assert_close(adv.previous_amount, 300.0);
        assert_close(adv.accumulated_amount, 460.0);
        assert_close(adv.current_percentage, 16.0);
        assert_close(adv.previous_percentage, 30.0);
        assert_close(adv.accumulated_percentage, 46.0);
    }

    #[test]
    fn test_zero_budget_gives_zero_percentages() {
        let (m, _) = setup();
        let adv = advancement(&m, &Vec::<LineItem>::new());
        assert_eq!(adv, Advancement::default());
    }

    #[test]
    fn test_with_advancement_round_trips_through_stored_values() {
        let (m, items) = setup();
        let stored = with_advancement(&m, &items);
        assert_eq!(stored.entries, m.entries);
        let rebuilt = Advancement::from_stored(&stored).unwrap();
        let computed = advancement(&m, &items);
        assert_close(rebuilt.current_amount, computed.current_amount);
        assert_close(rebuilt.previous_amount, computed.previous_amount);
        assert_close(rebuilt.accumulated_percentage, computed.accumulated_percentage);
    }

    #[test]
    fn test_from_stored_needs_all_values() {
        let (m, _) = setup();
        assert!(Advancement::from_stored(&m).is_none());
    }
}
