//! Restaurant records as they move through the clean and dedupe stages

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Partition key used for records whose address carried no postcode
pub const UNKNOWN_PARTITION: &str = "UNKNOWN";

/// Delimiter between the pieces hashed into a record id
const ID_DELIMITER: &str = "|";

/// A row read from the source CSV, before normalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 0-based position of the row in the source file
    pub position: usize,
    /// Raw `name` column
    pub name: String,
    /// Raw `address` column
    pub address: String,
    /// Every field of the row in column order (including name and address)
    pub fields: Vec<String>,
}

impl RawRow {
    /// Stable identifier for this row
    pub fn record_id(&self) -> String {
        derive_record_id(self.position, &self.fields)
    }
}

/// A normalised restaurant record (clean-stage output row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub address: String,
    pub postcode: Option<String>,
    pub outcode: Option<String>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        postcode: Option<String>,
    ) -> Self {
        let outcode = postcode
            .as_deref()
            .and_then(crate::normalisation::outcode)
            .map(str::to_string);
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            postcode,
            outcode,
        }
    }

    /// The partition this record belongs to
    pub fn partition_key(&self) -> &str {
        match self.outcode.as_deref() {
            Some(outcode) if !outcode.is_empty() => outcode,
            _ => UNKNOWN_PARTITION,
        }
    }
}

/// A record labelled with its duplicate group (dedupe-stage output row)
///
/// Kept flat rather than wrapping `Record` so it maps 1:1 onto CSV columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedRecord {
    pub group_id: String,
    pub id: String,
    pub name: String,
    pub address: String,
    pub postcode: Option<String>,
    pub outcode: Option<String>,
}

impl GroupedRecord {
    pub fn new(group_id: impl Into<String>, record: Record) -> Self {
        Self {
            group_id: group_id.into(),
            id: record.id,
            name: record.name,
            address: record.address,
            postcode: record.postcode,
            outcode: record.outcode,
        }
    }

    /// Drop the group label
    pub fn into_record(self) -> Record {
        Record {
            id: self.id,
            name: self.name,
            address: self.address,
            postcode: self.postcode,
            outcode: self.outcode,
        }
    }

    /// Whether this record was chosen as its group's representative
    pub fn is_representative(&self) -> bool {
        self.group_id == self.id
    }
}

/// Derive a stable record id from a row's position and raw field values
///
/// The position and each field are joined with `|` and hashed with SHA-256,
/// giving 64 lowercase hex characters. Identical content at a different
/// position yields a different id.
pub fn derive_record_id<S: AsRef<str>>(position: usize, fields: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(position.to_string().as_bytes());
    for field in fields {
        hasher.update(ID_DELIMITER.as_bytes());
        hasher.update(field.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
