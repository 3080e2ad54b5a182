//! Row-level cleaning: numeric coercion, derived ratios, renaming and
//! projection onto the canonical schema.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::process::utils::{parse_finite, render_number};
use crate::schema::household::{
    self, FOOD_SOURCE, HOUSEHOLD_SIZE_SOURCE, INCOME_SOURCE, INCOME_TO_EXPENDITURE_RATIO,
    PER_CAPITA_INCOME, RENAMES, SCHEMA,
};

/// One input CSV line, keyed by its header.
pub type RawRecord = HashMap<String, String>;

/// A single cell of a transformed record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// CSV cell text; null becomes an empty field.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(v) => render_number(*v),
            Value::Null => String::new(),
        }
    }
}

/// A record holding exactly one value per canonical column.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRecord {
    values: Vec<Value>,
}

impl TransformedRecord {
    fn empty() -> Self {
        Self {
            values: vec![Value::Null; SCHEMA.len()],
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        household::position(column).map(|idx| &self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        SCHEMA.iter().map(|c| c.name).zip(self.values.iter())
    }

    /// Cells in schema order, ready for the CSV writer.
    pub fn to_row(&self) -> Vec<String> {
        self.values.iter().map(Value::render).collect()
    }
}

/// Outcome of coercing one numeric source cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coercion {
    Missing,
    Parsed(f64),
    Malformed,
}

impl Coercion {
    pub fn value(&self) -> f64 {
        match self {
            Coercion::Parsed(v) => *v,
            Coercion::Missing | Coercion::Malformed => 0.0,
        }
    }
}

/// Absent or empty → `Missing`; unparseable → `Malformed`. Both read as 0.
pub fn coerce_numeric(raw: Option<&str>) -> Coercion {
    match raw {
        None => Coercion::Missing,
        Some(s) if s.is_empty() => Coercion::Missing,
        Some(s) => parse_finite(s).map_or(Coercion::Malformed, Coercion::Parsed),
    }
}

struct FieldPlan {
    source: &'static str,
    target: usize,
    numeric: bool,
}

static PLAN: Lazy<Vec<FieldPlan>> = Lazy::new(|| {
    RENAMES
        .iter()
        .filter_map(|&(source, target)| {
            household::position(target).map(|idx| FieldPlan {
                source,
                target: idx,
                numeric: household::is_numeric_source(source),
            })
        })
        .collect()
});

fn ratio(numerator: f64, denominator: f64) -> Value {
    if denominator != 0.0 {
        Value::Number(numerator / denominator)
    } else {
        Value::Null
    }
}

fn set(values: &mut [Value], column: &str, value: Value) {
    if let Some(idx) = household::position(column) {
        values[idx] = value;
    }
}

/// Transform one raw record, also returning how many numeric cells were
/// present but unparseable.
pub fn transform_record_counted(raw: &RawRecord) -> (TransformedRecord, usize) {
    let mut record = TransformedRecord::empty();
    let values = &mut record.values;

    let mut malformed = 0;
    for field in PLAN.iter() {
        let cell = raw.get(field.source).map(String::as_str);
        if field.numeric {
            let coerced = coerce_numeric(cell);
            if coerced == Coercion::Malformed {
                malformed += 1;
            }
            values[field.target] = Value::Number(coerced.value());
        } else if let Some(text) = cell {
            values[field.target] = Value::Text(text.to_string());
        }
    }

    let number = |source: &str| coerce_numeric(raw.get(source).map(String::as_str)).value();
    let income = number(INCOME_SOURCE);
    set(
        values,
        INCOME_TO_EXPENDITURE_RATIO,
        ratio(income, number(FOOD_SOURCE)),
    );
    set(
        values,
        PER_CAPITA_INCOME,
        ratio(income, number(HOUSEHOLD_SIZE_SOURCE)),
    );

    (record, malformed)
}

/// Transform one raw record onto the canonical schema. Never fails.
pub fn transform_record(raw: &RawRecord) -> TransformedRecord {
    transform_record_counted(raw).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn num(rec: &TransformedRecord, col: &str) -> Option<f64> {
        rec.get(col).and_then(Value::as_f64)
    }

    #[test]
    fn missing_and_malformed_numbers_become_zero() {
        let (rec, malformed) =
            transform_record_counted(&raw(&[("Foodx", "abc"), ("Healthx", ""), ("Rentx", "7")]));
        assert_eq!(num(&rec, "Food_Expenditure"), Some(0.0));
        assert_eq!(num(&rec, "Health_Expenditure"), Some(0.0));
        assert_eq!(num(&rec, "Rent_Expenditure"), Some(7.0));
        // entirely absent from the row
        assert_eq!(num(&rec, "Other_Taxes"), Some(0.0));
        assert_eq!(num(&rec, "tenanca"), Some(0.0));
        assert_eq!(malformed, 1);
    }

    #[test]
    fn record_always_has_every_canonical_column() {
        for input in [
            raw(&[]),
            raw(&[("unknown", "1"), ("another", "x")]),
            raw(&[("Country", "X"), ("Foodx", "1"), ("extra", "y")]),
        ] {
            let rec = transform_record(&input);
            assert_eq!(rec.len(), SCHEMA.len());
            let cols: Vec<&str> = rec.iter().map(|(c, _)| c).collect();
            let expected: Vec<&str> = household::column_names().collect();
            assert_eq!(cols, expected);
            assert!(rec.get("unknown").is_none());
            assert!(rec.get("extra").is_none());
        }
    }

    #[test]
    fn income_to_expenditure_ratio() {
        let rec = transform_record(&raw(&[("Foodx", "0"), ("wagey", "500")]));
        assert!(rec.get(INCOME_TO_EXPENDITURE_RATIO).unwrap().is_null());

        let rec = transform_record(&raw(&[("Foodx", "50"), ("wagey", "500")]));
        assert_eq!(num(&rec, INCOME_TO_EXPENDITURE_RATIO), Some(10.0));
    }

    #[test]
    fn per_capita_income() {
        let rec = transform_record(&raw(&[("hhsize", "0"), ("wagey", "800")]));
        assert!(rec.get(PER_CAPITA_INCOME).unwrap().is_null());

        let rec = transform_record(&raw(&[("hhsize", "4"), ("wagey", "800")]));
        assert_eq!(num(&rec, PER_CAPITA_INCOME), Some(200.0));
    }

    #[test]
    fn ratios_use_coerced_values() {
        // malformed food expenditure reads as 0, so no ratio
        let rec = transform_record(&raw(&[("Foodx", "n/a"), ("wagey", "500")]));
        assert!(rec.get(INCOME_TO_EXPENDITURE_RATIO).unwrap().is_null());

        // malformed income reads as 0
        let rec = transform_record(&raw(&[("Foodx", "10"), ("wagey", "lots")]));
        assert_eq!(num(&rec, INCOME_TO_EXPENDITURE_RATIO), Some(0.0));
    }

    #[test]
    fn text_columns_pass_through_and_absent_ones_are_null() {
        let rec = transform_record(&raw(&[("Country", "X"), ("HouseholdId", "42")]));
        assert_eq!(rec.get("Country").and_then(Value::as_text), Some("X"));
        assert_eq!(rec.get("HouseholdId").and_then(Value::as_text), Some("42"));

        let rec = transform_record(&raw(&[]));
        assert!(rec.get("Country").unwrap().is_null());
        assert!(rec.get("HouseholdId").unwrap().is_null());
    }

    #[test]
    fn columns_sharing_a_canonical_name_are_dropped() {
        let rec = transform_record(&raw(&[
            ("Total_Income", "999"),
            ("Per_Capita_Income", "5"),
            ("Region", "north"),
            ("region1", "3"),
        ]));
        // only wagey feeds Total_Income; the raw column is ignored
        assert_eq!(num(&rec, "Total_Income"), Some(0.0));
        assert!(rec.get(PER_CAPITA_INCOME).unwrap().is_null());
        assert_eq!(num(&rec, "Region"), Some(3.0));
    }

    #[test]
    fn end_to_end_row() {
        let rec = transform_record(&raw(&[
            ("Country", "X"),
            ("HouseholdId", "1"),
            ("Foodx", "100"),
            ("wagey", "1000"),
            ("hhsize", "5"),
        ]));
        assert_eq!(num(&rec, "Food_Expenditure"), Some(100.0));
        assert_eq!(num(&rec, "Total_Income"), Some(1000.0));
        assert_eq!(num(&rec, "Household_Size"), Some(5.0));
        assert_eq!(num(&rec, INCOME_TO_EXPENDITURE_RATIO), Some(10.0));
        assert_eq!(num(&rec, PER_CAPITA_INCOME), Some(200.0));
    }

    #[test]
    fn coerce_numeric_classifies_inputs() {
        assert_eq!(coerce_numeric(None), Coercion::Missing);
        assert_eq!(coerce_numeric(Some("")), Coercion::Missing);
        assert_eq!(coerce_numeric(Some(" 2.5")), Coercion::Parsed(2.5));
        assert_eq!(coerce_numeric(Some("two")), Coercion::Malformed);
        assert_eq!(coerce_numeric(Some("two")).value(), 0.0);
    }

    #[test]
    fn rendering_matches_load_csv_conventions() {
        let rec = transform_record(&raw(&[("Country", "X"), ("Foodx", "12.5")]));
        let row = rec.to_row();
        assert_eq!(row.len(), SCHEMA.len());
        assert_eq!(row[0], "X");
        assert_eq!(row[1], "");
        assert_eq!(row[2], "12.5");
        assert_eq!(row[3], "0");
    }
}
