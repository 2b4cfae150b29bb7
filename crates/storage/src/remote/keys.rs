//! Object key naming for datasets in the bucket

use datavault_core::{COMPRESSED_EXTENSION, DATASET_OBJECT_PREFIX, PLAIN_EXTENSION};

pub(crate) fn compressed_key(id: &str) -> String {
    format!("{DATASET_OBJECT_PREFIX}{id}{COMPRESSED_EXTENSION}")
}

/// Key of an uncompressed object written by older releases
pub(crate) fn plain_key(id: &str) -> String {
    format!("{DATASET_OBJECT_PREFIX}{id}{PLAIN_EXTENSION}")
}

/// Dataset ID behind an object key, if the key names a dataset
pub(crate) fn id_from_key(key: &str) -> Option<&str> {
    let name = key.strip_prefix(DATASET_OBJECT_PREFIX)?;
    let id = name
        .strip_suffix(COMPRESSED_EXTENSION)
        .or_else(|| name.strip_suffix(PLAIN_EXTENSION))?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
