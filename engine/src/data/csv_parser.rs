use crate::error::EngineError;
use csv::{ReaderBuilder, StringRecord, Trim};
use shared::models::{LineItem, SectionMap};
use shared::utils::es_ar_format::NumberFormat;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const SECTION: &str = "Rubro";
const CODE: &str = "Codigo";
const DESCRIPTION: &str = "Descripcion";
const UNIT: &str = "Unidad";
const QUANTITY: &str = "Cantidad";
const UNIT_PRICE: &str = "Precio Unitario";

const REQUIRED_HEADERS: [&str; 4] = [SECTION, DESCRIPTION, QUANTITY, UNIT_PRICE];

#[derive(Debug, Clone, Default)]
pub struct BudgetCsvParser {
    format: NumberFormat,
}

impl BudgetCsvParser {
    pub fn new(format: NumberFormat) -> Self {
        Self { format }
    }

    // CSV Header: Rubro;Codigo;Descripcion;Unidad;Cantidad;Precio Unitario
    // Example Row: Estructura;E-01;Hormigón H21;m3;12,5;1.234,56
    pub fn load_budget_from_csv(file_path: impl AsRef<Path>) -> Result<SectionMap, EngineError> {
        Self::default().parse_file(file_path)
    }

    pub fn parse_file(&self, file_path: impl AsRef<Path>) -> Result<SectionMap, EngineError> {
        let path = file_path.as_ref();
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "Reading budget CSV");
        self.parse_reader(BufReader::new(file))
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<SectionMap, EngineError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        for name in REQUIRED_HEADERS {
            if Self::column(&headers, name).is_none() {
                return Err(EngineError::CsvDataFormatError(format!("Missing '{}' column in CSV header", name)));
            }
        }

        let mut sections = SectionMap::new();
        let mut skipped = 0usize;

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record = result?;

            let description = Self::get_field(&record, &headers, DESCRIPTION).unwrap_or("");
            if description.is_empty() {
                skipped += 1;
                tracing::warn!(line, "Skipping CSV row without description");
                continue;
            }

            let section = match Self::get_field(&record, &headers, SECTION) {
                Some(name) if !name.is_empty() => name,
                _ => "Sin rubro",
            };
            let id = match Self::get_field(&record, &headers, CODE) {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => uuid::Uuid::new_v4().to_string(),
            };
            let unit = Self::get_field(&record, &headers, UNIT).unwrap_or("");
            let quantity = self.number(&record, &headers, QUANTITY, line);
            let unit_price = self.number(&record, &headers, UNIT_PRICE, line);

            let item = LineItem::new(id, description, unit, quantity, unit_price).with_total_price(quantity * unit_price);
            sections.push_item(section, item);
        }

        tracing::info!(
            sections = sections.len(),
            items = sections.item_count(),
            skipped,
            "Budget CSV parsed"
        );
        Ok(sections)
    }

    // Unparsable numbers count as 0, the same as anywhere else amounts are read.
    fn number(&self, record: &StringRecord, headers: &StringRecord, name: &str, line: usize) -> f64 {
        let raw = Self::get_field(record, headers, name).unwrap_or("");
        match self.format.parse_decimal_strict(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(line, column = name, error = %e, "Unparsable number in CSV; using 0");
                0.0
            }
        }
    }

    fn column(headers: &StringRecord, name: &str) -> Option<usize> {
        headers.iter().position(|header| header.trim().eq_ignore_ascii_case(name))
    }

    fn get_field<'a>(record: &'a StringRecord, headers: &StringRecord, name: &str) -> Option<&'a str> {
        Self::column(headers, name).and_then(|pos| record.get(pos))
    }
}
