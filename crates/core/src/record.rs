//! A single structured entry within a dataset

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Score of a record for one named role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOverallScore {
    #[serde(rename = "roleName")]
    pub role_name: String,
    pub score: i32,
}

/// One entry of a dataset: flat descriptive fields, computed ratings, and
/// nested metric maps.
///
/// Map and list fields always deserialize to an empty collection when the
/// stored form omits them or holds `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub uid: i64,
    pub name: String,
    pub position: String,
    pub age: String,
    pub club: String,
    pub division: String,
    pub transfer_value: String,
    pub wage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub personality: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_handling: String,
    pub nationality: String,
    pub nationality_iso: String,
    pub nationality_fifa_code: String,
    #[serde(rename = "attributeMasked", skip_serializing_if = "is_false")]
    pub attribute_masked: bool,

    #[serde(deserialize_with = "null_as_default")]
    pub attributes: HashMap<String, String>,
    #[serde(rename = "numericAttributes", deserialize_with = "null_as_default")]
    pub numeric_attributes: HashMap<String, i32>,
    #[serde(rename = "performanceStatsNumeric", deserialize_with = "null_as_default")]
    pub performance_stats_numeric: HashMap<String, f64>,
    #[serde(rename = "performancePercentiles", deserialize_with = "null_as_default")]
    pub performance_percentiles: HashMap<String, HashMap<String, f64>>,

    #[serde(rename = "parsedPositions", deserialize_with = "null_as_default")]
    pub parsed_positions: Vec<String>,
    #[serde(rename = "shortPositions", deserialize_with = "null_as_default")]
    pub short_positions: Vec<String>,
    #[serde(rename = "positionGroups", deserialize_with = "null_as_default")]
    pub position_groups: Vec<String>,

    #[serde(rename = "PAC")]
    pub pac: i32,
    #[serde(rename = "SHO")]
    pub sho: i32,
    #[serde(rename = "PAS")]
    pub pas: i32,
    #[serde(rename = "DRI")]
    pub dri: i32,
    #[serde(rename = "DEF")]
    pub def: i32,
    #[serde(rename = "PHY")]
    pub phy: i32,
    #[serde(rename = "GK", skip_serializing_if = "is_zero")]
    pub gk: i32,
    #[serde(rename = "DIV", skip_serializing_if = "is_zero")]
    pub div: i32,
    #[serde(rename = "HAN", skip_serializing_if = "is_zero")]
    pub han: i32,
    #[serde(rename = "REF", skip_serializing_if = "is_zero")]
    pub refl: i32,
    #[serde(rename = "KIC", skip_serializing_if = "is_zero")]
    pub kic: i32,
    #[serde(rename = "SPD", skip_serializing_if = "is_zero")]
    pub spd: i32,
    #[serde(rename = "POS", skip_serializing_if = "is_zero")]
    pub pos: i32,
    #[serde(rename = "Overall")]
    pub overall: i32,

    #[serde(rename = "bestRoleOverall")]
    pub best_role_overall: String,
    #[serde(rename = "roleSpecificOveralls", deserialize_with = "null_as_default")]
    pub role_specific_overalls: Vec<RoleOverallScore>,
    #[serde(rename = "transferValueAmount")]
    pub transfer_value_amount: i64,
    #[serde(rename = "wageAmount")]
    pub wage_amount: i64,
}

impl Record {
    /// Rough in-memory footprint in bytes, used for cache accounting
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        let strings = [
            &self.name,
            &self.position,
            &self.age,
            &self.club,
            &self.division,
            &self.transfer_value,
            &self.wage,
            &self.personality,
            &self.media_handling,
            &self.nationality,
            &self.nationality_iso,
            &self.nationality_fifa_code,
            &self.best_role_overall,
        ];

        let mut size = std::mem::size_of::<Self>();
        size += strings.iter().map(|s| s.len()).sum::<usize>();
        size += self
            .attributes
            .iter()
            .map(|(k, v)| k.len() + v.len() + 32)
            .sum::<usize>();
        size += self.numeric_attributes.keys().map(|k| k.len() + 24).sum::<usize>();
        size += self
            .performance_stats_numeric
            .keys()
            .map(|k| k.len() + 24)
            .sum::<usize>();
        for (category, metrics) in &self.performance_percentiles {
            size += category.len() + 32;
            size += metrics.keys().map(|k| k.len() + 24).sum::<usize>();
        }
        for list in [
            &self.parsed_positions,
            &self.short_positions,
            &self.position_groups,
        ] {
            size += list.iter().map(|s| s.len() + 24).sum::<usize>();
        }
        size += self
            .role_specific_overalls
            .iter()
            .map(|r| r.role_name.len() + std::mem::size_of::<RoleOverallScore>())
            .sum::<usize>();
        size
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Accepts a missing value, `null`, or a concrete value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
