//! Size estimates for cached values

use datavault_core::{Dataset, Record};
use std::collections::HashMap;

/// Rough in-memory footprint of a cached value, in bytes.
///
/// Only needs to be good enough to keep the cache near its size limit.
pub trait CacheWeight {
    fn estimated_size(&self) -> u64;
}

impl CacheWeight for String {
    fn estimated_size(&self) -> u64 {
        self.len() as u64 + 16
    }
}

impl CacheWeight for Vec<u8> {
    fn estimated_size(&self) -> u64 {
        self.len() as u64 + 24
    }
}

impl CacheWeight for serde_json::Value {
    fn estimated_size(&self) -> u64 {
        match self {
            serde_json::Value::String(s) => s.len() as u64 + 16,
            serde_json::Value::Array(items) => {
                24 + items.iter().map(CacheWeight::estimated_size).sum::<u64>()
            }
            serde_json::Value::Object(map) => {
                48 + map
                    .iter()
                    .map(|(k, v)| k.len() as u64 + 16 + v.estimated_size())
                    .sum::<u64>()
            }
            _ => 16,
        }
    }
}

impl<T: CacheWeight> CacheWeight for Vec<T> {
    fn estimated_size(&self) -> u64 {
        24 + self.iter().map(CacheWeight::estimated_size).sum::<u64>()
    }
}

impl<V: CacheWeight> CacheWeight for HashMap<String, V> {
    fn estimated_size(&self) -> u64 {
        48 + self
            .iter()
            .map(|(k, v)| k.len() as u64 + 16 + v.estimated_size())
            .sum::<u64>()
    }
}

impl CacheWeight for f64 {
    fn estimated_size(&self) -> u64 {
        8
    }
}

impl CacheWeight for Record {
    fn estimated_size(&self) -> u64 {
        Record::estimated_size(self) as u64
    }
}

impl CacheWeight for Dataset {
    fn estimated_size(&self) -> u64 {
        Dataset::estimated_size(self) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_estimates_grow_with_content() {
        let small: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let mut inner = HashMap::new();
        inner.insert("Pac".to_string(), 0.5);
        let mut big = HashMap::new();
        big.insert("Winger".to_string(), inner);

        assert!(big.estimated_size() > small.estimated_size());
        assert_eq!("abcd".to_string().estimated_size(), 20);
    }

    #[test]
    fn test_json_estimate() {
        let value = serde_json::json!({"name": "Alice", "scores": [1, 2, 3]});
        assert!(value.estimated_size() > 48);
    }
}
