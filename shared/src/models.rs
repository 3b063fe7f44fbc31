use crate::period::Period;
use crate::utils::lenient;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Project (obra)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    #[default]
    Planned,
    InProgress,
    Suspended,
    Finished,
}

impl From<String> for ProjectStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "in_progress" | "en curso" | "en_ejecucion" | "en ejecución" => ProjectStatus::InProgress,
            "suspended" | "suspendida" => ProjectStatus::Suspended,
            "finished" | "finalizada" | "terminada" => ProjectStatus::Finished,
            _ => ProjectStatus::Planned,
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        match status {
            ProjectStatus::Planned => "planned",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Suspended => "suspended",
            ProjectStatus::Finished => "finished",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "localidad")]
    pub location: String,
    #[serde(default, alias = "empresaAdjudicada")]
    pub company: String,
    #[serde(default, alias = "fechaInicio")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "fechaFin")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Budget (presupuesto)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub unit_price: f64,
    // Authoritative when stored; recomputed from quantity x unit price otherwise.
    #[serde(
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub parcial: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rubro: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub accumulated: f64,
    // Fields written by other tools (category, tags, original values...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        LineItem {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            quantity,
            unit_price,
            ..Default::default()
        }
    }

    pub fn with_total_price(mut self, total_price: f64) -> Self {
        self.total_price = Some(total_price);
        self
    }

    /// The stored total whenever it is a finite number, zero included;
    /// otherwise quantity x unit price. Non-finite inputs count as 0.
    pub fn resolved_total(&self) -> f64 {
        match self.total_price {
            Some(stored) if stored.is_finite() => stored,
            _ => {
                let computed = self.quantity * self.unit_price;
                if computed.is_finite() {
                    computed
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub name: String,
    pub items: Vec<LineItem>,
}

impl Section {
    pub fn new(name: impl Into<String>, items: Vec<LineItem>) -> Self {
        Section { name: name.into(), items }
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(LineItem::resolved_total).sum()
    }
}

/// Section name -> items, in display order.
///
/// Serialized as a JSON object. The order of keys is the order in which
/// sections are shown and accumulated, so it is kept as a list instead of a
/// hash map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new() -> Self {
        SectionMap { sections: Vec::new() }
    }

    /// Appends a section, or extends the existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, items: Vec<LineItem>) {
        let name = name.into();
        match self.sections.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.items.extend(items),
            None => self.sections.push(Section { name, items }),
        }
    }

    /// Adds one item to the named section, creating it at the end if needed.
    pub fn push_item(&mut self, section: &str, item: LineItem) {
        self.insert(section.to_string(), vec![item]);
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// All items across sections, in display order.
    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn find_item(&self, id: &str) -> Option<&LineItem> {
        self.items().find(|item| item.id == id)
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn item_sum(&self) -> f64 {
        self.sections.iter().map(Section::total).sum()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl From<Vec<Section>> for SectionMap {
    fn from(sections: Vec<Section>) -> Self {
        let mut map = SectionMap::new();
        for section in sections {
            map.insert(section.name, section.items);
        }
        map
    }
}

impl IntoIterator for SectionMap {
    type Item = Section;
    type IntoIter = std::vec::IntoIter<Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.into_iter()
    }
}

impl<'a> IntoIterator for &'a SectionMap {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.name, &section.items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SectionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionMapVisitor;

        impl<'de> Visitor<'de> for SectionMapVisitor {
            type Value = SectionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of section name to line item list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SectionMap, A::Error> {
                let mut map = SectionMap::new();
                while let Some((name, items)) = access.next_entry::<String, Vec<LineItem>>()? {
                    map.insert(name, items);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(SectionMapVisitor)
    }
}

/// A budget in the current storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "obra_id")]
    pub project_id: i64,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
    #[serde(default)]
    pub data: SectionMap,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Measurement (medicion)
// ---------------------------------------------------------------------------

/// Completion percentages of one line item for one period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEntry {
    #[serde(default, alias = "presente", deserialize_with = "lenient::number")]
    pub monthly_progress: f64,
    #[serde(default, alias = "anterior", deserialize_with = "lenient::number")]
    pub cumulative_previous: f64,
    #[serde(default, alias = "acumulado", deserialize_with = "lenient::number")]
    pub cumulative_current: f64,
}

impl MeasurementEntry {
    pub fn new(cumulative_previous: f64, monthly_progress: f64) -> Self {
        MeasurementEntry {
            monthly_progress,
            cumulative_previous,
            cumulative_current: cumulative_previous + monthly_progress,
        }
    }

    /// Entry opening a period with the completion carried in from the last one.
    pub fn carried(cumulative: f64) -> Self {
        MeasurementEntry::new(cumulative, 0.0)
    }

    pub fn is_consistent(&self, tolerance: f64) -> bool {
        (self.cumulative_current - (self.cumulative_previous + self.monthly_progress)).abs() <= tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "obra_id")]
    pub project_id: i64,
    #[serde(default, alias = "presupuesto_id")]
    pub budget_id: Option<i64>,
    #[serde(alias = "periodo")]
    pub period: Period,
    #[serde(default)]
    pub entries: BTreeMap<String, MeasurementEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avance_medicion: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avance_acumulado: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presupuesto_total: Option<f64>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Measurement {
    pub fn new(project_id: i64, period: Period) -> Self {
        Measurement {
            id: None,
            project_id,
            budget_id: None,
            period,
            entries: BTreeMap::new(),
            avance_medicion: None,
            avance_acumulado: None,
            presupuesto_total: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn entry(&self, item_id: &str) -> Option<&MeasurementEntry> {
        self.entries.get(item_id)
    }

    pub fn total_cumulative(&self) -> f64 {
        self.entries.values().map(|e| e.cumulative_current).sum()
    }
}

// ---------------------------------------------------------------------------
// Certificate (certificado)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prorroga {
    pub nro_prorroga: String,
    pub disposicion: String,
    pub plazo: String,
    pub fecha_de_finalizacion: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ampliacion {
    pub nro_ampliacion: String,
    pub nro_resolucion: String,
    pub nro_expediente: String,
    #[serde(rename = "Monto")]
    pub monto: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Garantia {
    pub nro_poliza: String,
    pub suma_poliza: String,
    pub nombre_poliza: String,
}

/// Contractual fields typed in by the user. No engine rule applies to them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditedData {
    pub localidad: String,
    pub contratista: String,
    pub numero_licitacion: String,
    pub nro_resolucion: String,
    pub nro_expediente: String,
    pub imputacion: String,
    pub fecha_contrato: String,
    pub fecha_inicio: String,
    pub plazo: String,
    pub prorroga: Vec<Prorroga>,
    #[serde(rename = "Ampliacion")]
    pub ampliacion: Vec<Ampliacion>,
    pub garantias: Vec<Garantia>,
    pub autores: Vec<String>,
    pub links: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One month of the manual progress chart; the three series are user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub month: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub value1: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub value2: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub value3: f64,
}

impl ProgressPoint {
    pub fn zeroed(period: Period) -> Self {
        ProgressPoint {
            month: period.month_name_es().to_string(),
            period: Some(period),
            value1: 0.0,
            value2: 0.0,
            value3: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateTotals {
    pub avance_periodo: Option<f64>,
    pub avance_acumulado: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateSummary {
    pub total_items: usize,
    pub total_acumulado: f64,
    pub promedio_acumulado: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    #[serde(default)]
    pub edited_data: EditedData,
    #[serde(default)]
    pub presupuesto_data: SectionMap,
    #[serde(default)]
    pub progress: Vec<ProgressPoint>,
    #[serde(default)]
    pub totals: CertificateTotals,
    #[serde(default)]
    pub summary: CertificateSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "obra_id")]
    pub project_id: i64,
    #[serde(default, alias = "medicion_id")]
    pub measurement_id: Option<i64>,
    #[serde(alias = "periodo")]
    pub period: Period,
    pub data: CertificateData,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}
