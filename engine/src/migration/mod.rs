// Conversion between the old `secciones` budget layout and the current
// section-name -> items map. Old records are still read from storage.
use crate::allocator::percentage_of;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use shared::models::{Budget, LineItem, SectionMap};
use shared::utils::lenient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyItem {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub unidad: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub cantidad: f64,
    #[serde(default, rename = "precioUnitario", deserialize_with = "lenient::number")]
    pub precio_unitario: f64,
    #[serde(default, deserialize_with = "lenient::optional_number", skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySection {
    pub nombre: String,
    #[serde(default)]
    pub items: Vec<LegacyItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBudgetData {
    pub secciones: Vec<LegacySection>,
}

/// Budget `data` as found in storage.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetData {
    Legacy(LegacyBudgetData),
    Current(SectionMap),
    Unrecognized(Value),
}

impl BudgetData {
    /// Classifies raw JSON. A `secciones` key marks the legacy layout; an
    /// object whose values are all arrays is the current one.
    pub fn from_value(value: Value) -> BudgetData {
        let shape = match &value {
            Value::Object(map) if map.contains_key("secciones") => Shape::Legacy,
            Value::Object(map) if map.values().all(Value::is_array) => Shape::Current,
            _ => Shape::Unknown,
        };

        match shape {
            Shape::Legacy => match LegacyBudgetData::deserialize(&value) {
                Ok(legacy) => BudgetData::Legacy(legacy),
                Err(e) => {
                    tracing::warn!(error = %e, "Budget data has a 'secciones' key but is not a valid legacy layout");
                    BudgetData::Unrecognized(value)
                }
            },
            Shape::Current => match SectionMap::deserialize(&value) {
                Ok(current) => BudgetData::Current(current),
                Err(e) => {
                    tracing::warn!(error = %e, "Budget data looks like a section map but its items are malformed");
                    BudgetData::Unrecognized(value)
                }
            },
            Shape::Unknown => BudgetData::Unrecognized(value),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, BudgetData::Legacy(_))
    }
}

enum Shape {
    Legacy,
    Current,
    Unknown,
}

impl From<SectionMap> for BudgetData {
    fn from(map: SectionMap) -> Self {
        BudgetData::Current(map)
    }
}

impl Serialize for BudgetData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BudgetData::Legacy(legacy) => legacy.serialize(serializer),
            BudgetData::Current(map) => map.serialize(serializer),
            BudgetData::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BudgetData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(BudgetData::from_value(value))
    }
}

/// Brings any stored layout to the current one.
///
/// Legacy items get `parcial` and `rubro` computed against `declared_total`
/// (the record's own `total`) and `accumulated` reset to 0. Current data is
/// returned as is, which makes the function idempotent. Unknown layouts give
/// an empty map.
pub fn normalize(raw: BudgetData, declared_total: f64) -> SectionMap {
    match raw {
        BudgetData::Current(map) => map,
        BudgetData::Legacy(legacy) => from_legacy(legacy, declared_total),
        BudgetData::Unrecognized(value) => {
            tracing::warn!(
                kind = value_kind(&value),
                "Unrecognized budget data layout; using an empty budget"
            );
            SectionMap::new()
        }
    }
}

fn from_legacy(legacy: LegacyBudgetData, declared_total: f64) -> SectionMap {
    let mut map = SectionMap::new();
    for seccion in legacy.secciones {
        let items: Vec<LineItem> = seccion
            .items
            .into_iter()
            .map(|item| LineItem {
                id: item.id,
                name: item.nombre,
                unit: item.unidad,
                quantity: item.cantidad,
                unit_price: item.precio_unitario,
                total_price: item.total,
                ..Default::default()
            })
            .collect();

        let section_total: f64 = items.iter().map(LineItem::resolved_total).sum();
        let rubro = percentage_of(section_total, declared_total);
        let items = items
            .into_iter()
            .map(|item| LineItem {
                parcial: percentage_of(item.resolved_total(), declared_total),
                rubro,
                accumulated: 0.0,
                ..item
            })
            .collect();

        map.insert(seccion.nombre, items);
    }
    map
}

/// The reverse direction, for tools that still read the old layout.
pub fn to_legacy(current: &SectionMap) -> LegacyBudgetData {
    LegacyBudgetData {
        secciones: current
            .iter()
            .map(|section| LegacySection {
                nombre: section.name.clone(),
                items: section
                    .items
                    .iter()
                    .map(|item| LegacyItem {
                        id: item.id.clone(),
                        nombre: item.name.clone(),
                        unidad: item.unit.clone(),
                        cantidad: item.quantity,
                        precio_unitario: item.unit_price,
                        total: Some(item.resolved_total()),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A budget row as stored, before its data is normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "obra_id")]
    pub project_id: i64,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
    pub data: BudgetData,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BudgetRecord {
    pub fn normalize(self) -> Budget {
        let data = normalize(self.data, self.total);
        Budget {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            total: self.total,
            data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<Budget> for BudgetRecord {
    fn from(budget: Budget) -> Self {
        BudgetRecord {
            id: budget.id,
            project_id: budget.project_id,
            name: budget.name,
            total: budget.total,
            data: BudgetData::Current(budget.data),
            created_at: budget.created_at,
            updated_at: budget.updated_at,
        }
    }
}
