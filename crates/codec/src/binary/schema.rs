//! Wire structs for the binary record form
//!
//! Maps are `BTreeMap` so two encodings of equal datasets are byte-identical.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryDataset {
    pub schema_version: u32,
    pub currency_symbol: String,
    pub cache_data: Option<String>,
    pub records: Vec<BinaryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryRoleScore {
    pub role_name: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryRecord {
    pub uid: i64,
    pub name: String,
    pub position: String,
    pub age: String,
    pub club: String,
    pub division: String,
    pub transfer_value: String,
    pub wage: String,
    pub personality: String,
    pub media_handling: String,
    pub nationality: String,
    pub nationality_iso: String,
    pub nationality_fifa_code: String,
    pub attribute_masked: bool,

    pub attributes: BTreeMap<String, String>,
    pub numeric_attributes: BTreeMap<String, i32>,
    pub performance_stats_numeric: BTreeMap<String, f64>,
    pub performance_percentiles: BTreeMap<String, BTreeMap<String, f64>>,

    pub parsed_positions: Vec<String>,
    pub short_positions: Vec<String>,
    pub position_groups: Vec<String>,

    /// PAC SHO PAS DRI DEF PHY GK DIV HAN REF KIC SPD POS Overall, in that order
    pub ratings: [i32; 14],

    pub best_role_overall: String,
    pub role_specific_overalls: Vec<BinaryRoleScore>,
    pub transfer_value_amount: i64,
    pub wage_amount: i64,
}
