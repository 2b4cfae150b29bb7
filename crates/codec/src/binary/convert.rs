//! Conversion between the dataset model and its wire structs

use super::schema::{BinaryDataset, BinaryRecord, BinaryRoleScore};
use super::BINARY_SCHEMA_VERSION;
use datavault_core::{Dataset, Error, Record, Result, RoleOverallScore};

impl From<&Dataset> for BinaryDataset {
    fn from(dataset: &Dataset) -> Self {
        Self {
            schema_version: BINARY_SCHEMA_VERSION,
            currency_symbol: dataset.currency_symbol.clone(),
            cache_data: dataset.cache_data.clone(),
            records: dataset.records.iter().map(BinaryRecord::from).collect(),
        }
    }
}

impl TryFrom<BinaryDataset> for Dataset {
    type Error = Error;

    fn try_from(binary: BinaryDataset) -> Result<Self> {
        if binary.schema_version != BINARY_SCHEMA_VERSION {
            return Err(Error::decoding_message(
                "convert",
                format!(
                    "unsupported binary schema version {} (expected {})",
                    binary.schema_version, BINARY_SCHEMA_VERSION
                ),
            ));
        }
        Ok(Dataset {
            records: binary.records.into_iter().map(Record::from).collect(),
            currency_symbol: binary.currency_symbol,
            cache_data: binary.cache_data,
        })
    }
}

impl From<&Record> for BinaryRecord {
    fn from(r: &Record) -> Self {
        Self {
            uid: r.uid,
            name: r.name.clone(),
            position: r.position.clone(),
            age: r.age.clone(),
            club: r.club.clone(),
            division: r.division.clone(),
            transfer_value: r.transfer_value.clone(),
            wage: r.wage.clone(),
            personality: r.personality.clone(),
            media_handling: r.media_handling.clone(),
            nationality: r.nationality.clone(),
            nationality_iso: r.nationality_iso.clone(),
            nationality_fifa_code: r.nationality_fifa_code.clone(),
            attribute_masked: r.attribute_masked,
            attributes: r.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            numeric_attributes: r
                .numeric_attributes
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            performance_stats_numeric: r
                .performance_stats_numeric
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            performance_percentiles: r
                .performance_percentiles
                .iter()
                .map(|(category, metrics)| {
                    (
                        category.clone(),
                        metrics.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                    )
                })
                .collect(),
            parsed_positions: r.parsed_positions.clone(),
            short_positions: r.short_positions.clone(),
            position_groups: r.position_groups.clone(),
            ratings: [
                r.pac, r.sho, r.pas, r.dri, r.def, r.phy, r.gk, r.div, r.han, r.refl, r.kic,
                r.spd, r.pos, r.overall,
            ],
            best_role_overall: r.best_role_overall.clone(),
            role_specific_overalls: r
                .role_specific_overalls
                .iter()
                .map(|s| BinaryRoleScore {
                    role_name: s.role_name.clone(),
                    score: s.score,
                })
                .collect(),
            transfer_value_amount: r.transfer_value_amount,
            wage_amount: r.wage_amount,
        }
    }
}

impl From<BinaryRecord> for Record {
    fn from(b: BinaryRecord) -> Self {
        let [pac, sho, pas, dri, def, phy, gk, div, han, refl, kic, spd, pos, overall] = b.ratings;
        Self {
            uid: b.uid,
            name: b.name,
            position: b.position,
            age: b.age,
            club: b.club,
            division: b.division,
            transfer_value: b.transfer_value,
            wage: b.wage,
            personality: b.personality,
            media_handling: b.media_handling,
            nationality: b.nationality,
            nationality_iso: b.nationality_iso,
            nationality_fifa_code: b.nationality_fifa_code,
            attribute_masked: b.attribute_masked,
            attributes: b.attributes.into_iter().collect(),
            numeric_attributes: b.numeric_attributes.into_iter().collect(),
            performance_stats_numeric: b.performance_stats_numeric.into_iter().collect(),
            performance_percentiles: b
                .performance_percentiles
                .into_iter()
                .map(|(category, metrics)| (category, metrics.into_iter().collect()))
                .collect(),
            parsed_positions: b.parsed_positions,
            short_positions: b.short_positions,
            position_groups: b.position_groups,
            pac,
            sho,
            pas,
            dri,
            def,
            phy,
            gk,
            div,
            han,
            refl,
            kic,
            spd,
            pos,
            overall,
            best_role_overall: b.best_role_overall,
            role_specific_overalls: b
                .role_specific_overalls
                .into_iter()
                .map(|s| RoleOverallScore {
                    role_name: s.role_name,
                    score: s.score,
                })
                .collect(),
            transfer_value_amount: b.transfer_value_amount,
            wage_amount: b.wage_amount,
        }
    }
}
