//! Uploaded file records and normalization.
//!
//! Upload sources describe a form field in a flattened layout: one mapping
//! per attribute (`name`, `type`, `tmp_name`, `error`, `size`), where each
//! attribute is either a scalar (one file) or a list indexed by file
//! (several files under `field[]`). Handlers always see the normalized shape:
//! a list of [`UploadedFile`] records per field.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Upload completed without error.
pub const UPLOAD_ERR_OK: u8 = 0;
/// The file exceeded the configured size limit.
pub const UPLOAD_ERR_SIZE: u8 = 1;
/// The field was submitted without a file.
pub const UPLOAD_ERR_NO_FILE: u8 = 4;
/// The file could not be written to the upload directory.
pub const UPLOAD_ERR_CANT_WRITE: u8 = 7;

/// One attribute of a raw upload: a scalar for a single file, or one entry
/// per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileField<T> {
    Multiple(Vec<T>),
    Single(T),
}

impl<T: Clone + Default> FileField<T> {
    /// Value for the file at `index`. A scalar applies to every index.
    fn nth(&self, index: usize) -> T {
        match self {
            FileField::Multiple(values) => values.get(index).cloned().unwrap_or_default(),
            FileField::Single(value) => value.clone(),
        }
    }
}

/// A form field's uploads in the flattened attribute-major layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpload {
    pub name: FileField<String>,
    #[serde(rename = "type")]
    pub mime_type: FileField<String>,
    pub tmp_name: FileField<PathBuf>,
    pub error: FileField<u8>,
    pub size: FileField<u64>,
}

impl RawUpload {
    /// Convert to one record per file, zipping attributes by index.
    ///
    /// The `name` attribute decides the shape. Attributes missing an entry
    /// for some index take their default value.
    pub fn normalize(&self) -> Vec<UploadedFile> {
        let count = match &self.name {
            FileField::Multiple(names) => names.len(),
            FileField::Single(_) => 1,
        };

        (0..count)
            .map(|i| UploadedFile {
                name: self.name.nth(i),
                mime_type: self.mime_type.nth(i),
                temp_path: self.tmp_name.nth(i),
                error_code: self.error.nth(i),
                size_bytes: self.size.nth(i),
            })
            .collect()
    }
}

/// A normalized uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub name: String,
    pub mime_type: String,
    /// Where the content was stored on disk.
    pub temp_path: PathBuf,
    pub error_code: u8,
    pub size_bytes: u64,
}

impl UploadedFile {
    pub fn is_ok(&self) -> bool {
        self.error_code == UPLOAD_ERR_OK
    }
}

/// Normalize every field of a raw upload map.
pub fn normalize_files(raw: &BTreeMap<String, RawUpload>) -> BTreeMap<String, Vec<UploadedFile>> {
    raw.iter()
        .map(|(field, upload)| (field.clone(), upload.normalize()))
        .collect()
}
