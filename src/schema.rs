//! The record schema shared by the reader, both stores and the exporter,
//! plus the `Record` type that flows through the pipeline.

use crate::key_extractor::derive_key;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered field labels of one place/business listing.
/// Input columns are matched to these by position; exports use the same order.
pub const FIELDS: [&str; 39] = [
    "Name",
    "Website",
    "Type",
    "subtypes",
    "Phone",
    "full_address",
    "borough",
    "street",
    "city",
    "postal_code",
    "country",
    "latitude",
    "longitude",
    "time_zone",
    "plus_code",
    "rating",
    "reviews",
    "reviews_link",
    "photo",
    "working_hours_old_format",
    "price_range",
    "posts",
    "verified",
    "reserving_table_link",
    "booking_appointment_link",
    "location_link",
    "email",
    "email2",
    "twitter",
    "linkedin",
    "facebook",
    "instagram",
    "google_plus",
    "skype",
    "telegram",
    "site_generator",
    "site_title",
    "site_description",
    "site_keywords",
];

pub const NAME_FIELD: &str = "Name";
pub const ADDRESS_FIELD: &str = "full_address";

/// Derived fields attached at ingestion time.
pub const HASH_FIELD: &str = "hash";
pub const SOURCE_FIELD: &str = "source";

/// Rows narrower than this are treated as grossly malformed.
pub const DEFAULT_MIN_COLUMNS: usize = 13;

const NAME_IDX: usize = 0;
const ADDRESS_IDX: usize = 5;

#[inline]
pub fn width() -> usize {
    FIELDS.len()
}

/// Position of a schema field, or `None` for names outside the schema.
pub fn field_index(name: &str) -> Option<usize> {
    FIELDS.iter().position(|f| *f == name)
}

/// One listing: a value for every schema field (empty when unknown) plus the
/// derived dedup key and the identifier of the file it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
    hash: String,
    source: String,
}

impl Record {
    /// Positional zip of `row` against the schema. Missing trailing columns
    /// become empty strings; columns past the schema width are dropped.
    pub fn from_row<I, S>(row: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = row.into_iter().take(width()).map(Into::into).collect();
        values.resize(width(), String::new());
        let hash = derive_key(&values[NAME_IDX], &values[ADDRESS_IDX]);
        Self { values, hash, source: source.into() }
    }

    /// Build from a field lookup (stored documents and table rows).
    /// Fields the lookup does not know become empty strings. The key is always
    /// re-derived so it cannot drift from `Name`/`full_address`.
    pub fn from_lookup<F>(source: impl Into<String>, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let values = FIELDS.iter().map(|f| lookup(f).unwrap_or_default()).collect::<Vec<_>>();
        let hash = derive_key(&values[NAME_IDX], &values[ADDRESS_IDX]);
        Self { values, hash, source: source.into() }
    }

    /// Value of a schema field; empty for unknown field names.
    pub fn get(&self, field: &str) -> &str {
        field_index(field).map(|i| self.values[i].as_str()).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        &self.values[NAME_IDX]
    }

    pub fn full_address(&self) -> &str {
        &self.values[ADDRESS_IDX]
    }

    /// Values in schema order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn dedup_key(&self) -> &str {
        &self.hash
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Iterate `(field, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        FIELDS.iter().copied().zip(self.values.iter().map(String::as_str))
    }
}

/// Serializes as a flat object: schema fields, then `hash` and `source`.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(width() + 2))?;
        for (k, v) in self.fields() {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry(HASH_FIELD, &self.hash)?;
        map.serialize_entry(SOURCE_FIELD, &self.source)?;
        map.end()
    }
}
