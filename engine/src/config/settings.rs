// Engine settings, loaded from a JSON file or left at their defaults.
use crate::error::EngineError;
use serde::Deserialize;
use shared::utils::es_ar_format::NumberFormat;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct EngineSettings {
    pub number_format: NumberFormat,
    pub progress: ProgressSettings,
    pub allocation: AllocationSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ProgressSettings {
    // Off by default: over-completion and negative corrections are kept as entered.
    pub clamp_to_percent: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AllocationSettings {
    /// Allowed gap, in currency units, between the declared total and the
    /// sum of line items before a warning is logged.
    pub divergence_tolerance: f64,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        AllocationSettings {
            divergence_tolerance: 0.01,
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        let settings: EngineSettings = serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigError(format!("Invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigError(format!("Failed to read settings file '{}': {}", path.display(), e))
        })?;
        let settings = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), ?settings, "Loaded engine settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fmt = &self.number_format;
        if fmt.decimal_separator == fmt.thousand_separator {
            return Err(EngineError::ConfigError(format!(
                "Decimal and thousand separators must differ (both '{}')",
                fmt.decimal_separator
            )));
        }
        if fmt.decimal_separator.is_ascii_digit() || fmt.thousand_separator.is_ascii_digit() {
            return Err(EngineError::ConfigError("Separators cannot be digits".to_string()));
        }
        let tolerance = self.allocation.divergence_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EngineError::ConfigError(format!(
                "divergence_tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.number_format.decimal_separator, ',');
        assert_eq!(settings.number_format.thousand_separator, '.');
        assert!(!settings.progress.clamp_to_percent);
        assert_eq!(settings.allocation.divergence_tolerance, 0.01);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = EngineSettings::from_json_str(r#"{"progress": {"clamp_to_percent": true}}"#).unwrap();
        assert!(settings.progress.clamp_to_percent);
        assert_eq!(settings.number_format, NumberFormat::default());
    }

    #[test]
    fn test_rejects_equal_separators() {
        let result = EngineSettings::from_json_str(
            r#"{"number_format": {"decimal_separator": ".", "thousand_separator": "."}}"#,
        );
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let result = EngineSettings::from_json_str(r#"{"allocation": {"divergence_tolerance": -1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"allocation": {{"divergence_tolerance": 5.0}}}}"#).unwrap();
        let settings = EngineSettings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.allocation.divergence_tolerance, 5.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineSettings::load_from_file("does/not/exist.json");
        assert!(result.unwrap_err().to_string().contains("Failed to read settings file"));
    }
}
