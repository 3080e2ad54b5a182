// src/schema/household.rs

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use super::types::{Column, ColumnType};

pub const INCOME_TO_EXPENDITURE_RATIO: &str = "Income_to_Expenditure_Ratio";
pub const PER_CAPITA_INCOME: &str = "Per_Capita_Income";

/// Source fields the derived ratios are computed from.
pub const INCOME_SOURCE: &str = "wagey";
pub const FOOD_SOURCE: &str = "Foodx";
pub const HOUSEHOLD_SIZE_SOURCE: &str = "hhsize";

/// Destination table layout, in load/serialization order.
pub static SCHEMA: [Column; 35] = [
    Column::new("Country", ColumnType::String),
    Column::new("HouseholdId", ColumnType::Integer),
    Column::new("Food_Expenditure", ColumnType::Float),
    Column::new("Health_Expenditure", ColumnType::Float),
    Column::new("Rent_Expenditure", ColumnType::Float),
    Column::new("Transportation_Expenditure", ColumnType::Float),
    Column::new("Clothing_Expenditure", ColumnType::Float),
    Column::new("Housing_Expenditure", ColumnType::Float),
    Column::new("Education_Expenditure", ColumnType::Float),
    Column::new("Other_Expenditure", ColumnType::Float),
    Column::new("Total_Income", ColumnType::Float),
    Column::new("Monthly_Wage_Income", ColumnType::Float),
    Column::new("Other_Members_Wage_Income", ColumnType::Float),
    Column::new("Self_Employment_Income", ColumnType::Float),
    Column::new("Pension_Income", ColumnType::Float),
    Column::new("Family_Support_Income", ColumnType::Float),
    Column::new("Social_Assistance_Income", ColumnType::Float),
    Column::new("Unemployment_Income", ColumnType::Float),
    Column::new("Other_Social_Benefits", ColumnType::Float),
    Column::new("Income_Tax", ColumnType::Float),
    Column::new("Property_Tax", ColumnType::Float),
    Column::new("Other_Taxes", ColumnType::Float),
    Column::new("Land_Ownership", ColumnType::Float),
    Column::new("Region", ColumnType::Float),
    Column::new("Durable_Goods_Owned", ColumnType::Float),
    Column::new("Socio_Economic_Group", ColumnType::Float),
    Column::new("Household_Size", ColumnType::Float),
    Column::new(INCOME_TO_EXPENDITURE_RATIO, ColumnType::Float),
    Column::new(PER_CAPITA_INCOME, ColumnType::Float),
    Column::new("amenita", ColumnType::Float),
    Column::new("local", ColumnType::Float),
    Column::new("carda", ColumnType::Float),
    Column::new("tvclda", ColumnType::Float),
    Column::new("refigda", ColumnType::Float),
    Column::new("tenanca", ColumnType::Float),
];

/// Source short code → canonical column name.
pub static RENAMES: [(&str, &str); 33] = [
    ("Foodx", "Food_Expenditure"),
    ("Healthx", "Health_Expenditure"),
    ("Rentx", "Rent_Expenditure"),
    ("Transx", "Transportation_Expenditure"),
    ("Clothx", "Clothing_Expenditure"),
    ("Housex", "Housing_Expenditure"),
    ("Educx", "Education_Expenditure"),
    ("Otherx", "Other_Expenditure"),
    ("wagey", "Total_Income"),
    ("wagemy", "Monthly_Wage_Income"),
    ("wageky", "Other_Members_Wage_Income"),
    ("selfemy", "Self_Employment_Income"),
    ("totpeny", "Pension_Income"),
    ("familyy", "Family_Support_Income"),
    ("socassy", "Social_Assistance_Income"),
    ("unempy", "Unemployment_Income"),
    ("othsocy", "Other_Social_Benefits"),
    ("sstaxy", "Income_Tax"),
    ("pitaxy", "Property_Tax"),
    ("othatxy", "Other_Taxes"),
    ("Country", "Country"),
    ("hhsize", "Household_Size"),
    ("landa", "Land_Ownership"),
    ("region1", "Region"),
    ("durabla", "Durable_Goods_Owned"),
    ("seg", "Socio_Economic_Group"),
    ("amenita", "amenita"),
    ("local", "local"),
    ("carda", "carda"),
    ("tvclda", "tvclda"),
    ("refigda", "refigda"),
    ("tenanca", "tenanca"),
    ("HouseholdId", "HouseholdId"),
];

/// Source fields coerced to numbers (missing/empty/malformed → 0).
pub static NUMERIC_FIELDS: [&str; 31] = [
    "Foodx", "Healthx", "Rentx", "Transx", "Clothx", "Housex", "Educx", "Otherx", "wagey",
    "wagemy", "wageky", "selfemy", "totpeny", "familyy", "socassy", "unempy", "othsocy", "sstaxy",
    "pitaxy", "othatxy", "hhsize", "landa", "region1", "durabla", "seg", "amenita", "local",
    "carda", "tvclda", "refigda", "tenanca",
];

static SCHEMA_POSITIONS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    SCHEMA
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name, idx))
        .collect()
});

static NUMERIC_LOOKUP: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NUMERIC_FIELDS.iter().copied().collect());

/// Canonical header, in schema order.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    SCHEMA.iter().map(|c| c.name)
}

/// Position of a canonical column in [`SCHEMA`].
pub fn position(canonical: &str) -> Option<usize> {
    SCHEMA_POSITIONS.get(canonical).copied()
}

pub fn is_numeric_source(source: &str) -> bool {
    NUMERIC_LOOKUP.contains(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mapping_targets_a_schema_column() {
        for (source, target) in RENAMES.iter() {
            assert!(
                position(target).is_some(),
                "{} maps to {} which is not in the schema",
                source,
                target
            );
        }
    }

    #[test]
    fn numeric_fields_are_all_mapped() {
        for field in NUMERIC_FIELDS.iter() {
            assert!(
                RENAMES.iter().any(|(source, _)| source == field),
                "{} has no mapping",
                field
            );
        }
        assert!(!is_numeric_source("Country"));
        assert!(!is_numeric_source("HouseholdId"));
        assert!(is_numeric_source("hhsize"));
    }

    #[test]
    fn schema_columns_are_unique_and_ordered() {
        let names: Vec<&str> = column_names().collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.first(), Some(&"Country"));
        assert_eq!(names.last(), Some(&"tenanca"));
        assert_eq!(position(PER_CAPITA_INCOME), Some(28));
        assert_eq!(SCHEMA[0].ty.to_string(), "STRING");
        assert_eq!(SCHEMA[1].ty.to_string(), "INTEGER");
        assert!(SCHEMA[2..].iter().all(|c| c.ty == ColumnType::Float));
    }

    #[test]
    fn only_derived_columns_lack_a_source() {
        let targets: HashSet<&str> = RENAMES.iter().map(|(_, t)| *t).collect();
        let unmapped: Vec<&str> = column_names().filter(|c| !targets.contains(c)).collect();
        assert_eq!(unmapped, vec![INCOME_TO_EXPENDITURE_RATIO, PER_CAPITA_INCOME]);
    }
}
