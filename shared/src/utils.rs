// Number handling shared across the engine and its front ends.
// Monetary figures arrive from spreadsheets and old records as es-AR formatted
// text ("$ 1.234,56"), so every text-to-number conversion goes through here.

pub mod es_ar_format {
    use anyhow::{anyhow, Result};
    use serde::{Deserialize, Serialize};
    use std::str::FromStr;

    /// Separators and symbol used to read and print amounts.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct NumberFormat {
        pub decimal_separator: char,
        pub thousand_separator: char,
        pub currency_symbol: String,
    }

    impl Default for NumberFormat {
        fn default() -> Self {
            NumberFormat {
                decimal_separator: ',',
                thousand_separator: '.',
                currency_symbol: "$".to_string(),
            }
        }
    }

    impl NumberFormat {
        /// Parses "1.234,56", "$ 1.234,56" or "-12,5 %" into f64.
        ///
        /// Everything that is not a digit, the decimal separator or a leading
        /// minus sign is dropped before parsing.
        pub fn parse_decimal_strict(&self, s: &str) -> Result<f64> {
            let mut normalized = String::with_capacity(s.len());
            let mut negative = false;
            for c in s.trim().chars() {
                if c.is_ascii_digit() {
                    normalized.push(c);
                } else if c == self.decimal_separator {
                    normalized.push('.');
                } else if c == '-' && normalized.is_empty() {
                    negative = true;
                }
            }

            if normalized.is_empty() {
                return Err(anyhow!("No digits in '{}'", s));
            }

            let value = f64::from_str(&normalized)
                .map_err(|e| anyhow!("Failed to parse decimal '{}': {}", s, e))?;
            Ok(if negative { -value } else { value })
        }

        /// Lenient variant: anything unparsable is 0.
        pub fn parse_decimal(&self, s: &str) -> f64 {
            self.parse_decimal_strict(s).unwrap_or(0.0)
        }

        /// Percentages use the same rules; the '%' sign is simply dropped.
        pub fn parse_percentage(&self, s: &str) -> f64 {
            self.parse_decimal(s)
        }

        pub fn format_decimal(&self, value: f64, decimals: usize) -> String {
            if !value.is_finite() {
                return format!("{:.decimals$}", 0.0, decimals = decimals)
                    .replace('.', &self.decimal_separator.to_string());
            }

            let formatted = format!("{:.decimals$}", value.abs(), decimals = decimals);
            let (int_part, frac_part) = match formatted.split_once('.') {
                Some((i, f)) => (i, Some(f)),
                None => (formatted.as_str(), None),
            };

            let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
            for (idx, c) in int_part.chars().enumerate() {
                if idx > 0 && (int_part.len() - idx) % 3 == 0 {
                    grouped.push(self.thousand_separator);
                }
                grouped.push(c);
            }

            let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
            let mut out = String::new();
            if value < 0.0 && !is_zero {
                out.push('-');
            }
            out.push_str(&grouped);
            if let Some(frac) = frac_part {
                out.push(self.decimal_separator);
                out.push_str(frac);
            }
            out
        }

        pub fn format_currency(&self, value: f64) -> String {
            format!("{} {}", self.currency_symbol, self.format_decimal(value, 2))
        }

        pub fn format_percentage(&self, value: f64) -> String {
            format!("{} %", self.format_decimal(value, 2))
        }
    }

    // Free functions using the es-AR defaults.

    pub fn parse_decimal(s: &str) -> f64 {
        NumberFormat::default().parse_decimal(s)
    }

    pub fn parse_decimal_strict(s: &str) -> Result<f64> {
        NumberFormat::default().parse_decimal_strict(s)
    }

    pub fn parse_percentage(s: &str) -> f64 {
        NumberFormat::default().parse_percentage(s)
    }

    pub fn format_decimal(value: f64, decimals: usize) -> String {
        NumberFormat::default().format_decimal(value, decimals)
    }

    pub fn format_currency(value: f64) -> String {
        NumberFormat::default().format_currency(value)
    }

    pub fn format_percentage(value: f64) -> String {
        NumberFormat::default().format_percentage(value)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use proptest::prelude::*;

        #[test]
        fn test_parse_decimal_simple() {
            assert_eq!(parse_decimal("123,45"), 123.45);
        }

        #[test]
        fn test_parse_decimal_with_thousands() {
            assert_eq!(parse_decimal("1.234,56"), 1234.56);
        }

        #[test]
        fn test_parse_decimal_large_number() {
            assert_eq!(parse_decimal("600.822.115,84"), 600822115.84);
        }

        #[test]
        fn test_parse_decimal_currency_symbol() {
            assert_eq!(parse_decimal("$ 1.500.000,50"), 1500000.5);
            assert_eq!(parse_decimal("ARS 300"), 300.0);
        }

        #[test]
        fn test_parse_decimal_negative() {
            assert_eq!(parse_decimal("-1.000,25"), -1000.25);
            assert_eq!(parse_decimal("$ -42"), -42.0);
        }

        #[test]
        fn test_parse_decimal_unparsable_defaults_to_zero() {
            assert_eq!(parse_decimal(""), 0.0);
            assert_eq!(parse_decimal("n/a"), 0.0);
            assert_eq!(parse_decimal("1,2,3"), 0.0);
            assert!(parse_decimal_strict("abc").is_err());
        }

        #[test]
        fn test_parse_percentage() {
            assert_eq!(parse_percentage("45,5 %"), 45.5);
            assert_eq!(parse_percentage("100%"), 100.0);
        }

        #[test]
        fn test_custom_separators() {
            let fmt = NumberFormat {
                decimal_separator: '.',
                thousand_separator: ',',
                currency_symbol: "US$".to_string(),
            };
            assert_eq!(fmt.parse_decimal("1,234.56"), 1234.56);
            assert_eq!(fmt.format_currency(1234.5), "US$ 1,234.50");
        }

        #[test]
        fn test_format_decimal_grouping() {
            assert_eq!(format_decimal(1234.56, 2), "1.234,56");
            assert_eq!(format_decimal(600822115.84, 2), "600.822.115,84");
            assert_eq!(format_decimal(999.0, 0), "999");
            assert_eq!(format_decimal(-1000.0, 1), "-1.000,0");
            assert_eq!(format_decimal(-0.001, 2), "0,00");
        }

        #[test]
        fn test_format_currency_and_percentage() {
            assert_eq!(format_currency(1500.0), "$ 1.500,00");
            assert_eq!(format_percentage(12.5), "12,50 %");
        }

        #[test]
        fn test_formatted_value_parses_back() {
            let value = 98765.43;
            assert_eq!(parse_decimal(&format_currency(value)), value);
        }

        proptest! {
            #[test]
            fn prop_formatted_amounts_parse_back(cents in -100_000_000_000i64..100_000_000_000i64) {
                let value = cents as f64 / 100.0;
                let printed = format_currency(value);
                prop_assert!((parse_decimal(&printed) - value).abs() < 1e-6, "{} -> {}", value, printed);
                prop_assert!((parse_decimal(&format_decimal(value, 2)) - value).abs() < 1e-6);
            }
        }
    }
}

// Serde helpers for records whose numeric fields were written by hand or by
// older versions of the application: numbers, numeric strings, es-AR strings
// and nulls all appear in real data.
pub mod lenient {
    use super::es_ar_format;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Converts any JSON value to a number the way stored records expect.
    /// Text is always read as es-AR ("1.500" is fifteen hundred); anything
    /// unparsable is 0.
    pub fn value_to_f64(value: &Value) -> f64 {
        match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => es_ar_format::parse_decimal(s),
            _ => 0.0,
        }
    }

    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_f64(&value))
    }

    /// Like `number` but keeps the distinction between "absent" and a value.
    pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            Value::String(ref s) if s.trim().is_empty() => None,
            other => Some(value_to_f64(&other)),
        })
    }

    pub fn value_to_id(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Line item ids are strings, but old records stored them as integers.
    pub fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_id(&value))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn test_value_to_f64_variants() {
            assert_eq!(value_to_f64(&json!(12.5)), 12.5);
            assert_eq!(value_to_f64(&json!("300")), 300.0);
            assert_eq!(value_to_f64(&json!("$ 1.234,5")), 1234.5);
            assert_eq!(value_to_f64(&json!(null)), 0.0);
            assert_eq!(value_to_f64(&json!("texto")), 0.0);
            assert_eq!(value_to_f64(&json!(true)), 0.0);
        }

        #[test]
        fn test_text_is_always_read_as_es_ar() {
            assert_eq!(value_to_f64(&json!("1.500")), 1500.0);
            assert_eq!(value_to_f64(&json!("$ 1.234,56")), 1234.56);
            assert_eq!(value_to_f64(&json!("1.500")), es_ar_format::parse_decimal("1.500"));

            #[derive(Deserialize)]
            struct Row {
                #[serde(deserialize_with = "number")]
                price: f64,
            }
            let row: Row = serde_json::from_value(json!({"price": "1.500"})).unwrap();
            assert_eq!(row.price, 1500.0);
        }

        #[test]
        fn test_value_to_id_variants() {
            assert_eq!(value_to_id(&json!(7)), "7");
            assert_eq!(value_to_id(&json!("a-1")), "a-1");
            assert_eq!(value_to_id(&json!(null)), "");
        }
    }
}
