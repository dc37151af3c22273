/// Dedup key for a listing: lowercased, trimmed `Name` followed by the
/// lowercased, trimmed `full_address`.
///
/// Notes:
///  - Internal whitespace, punctuation and Unicode forms are left alone, so
///    "12 Main St" and "12  Main St" produce different keys.
///  - Distinct businesses sharing name and address text collide.
pub fn derive_key(name: &str, full_address: &str) -> String {
    let name = name.trim().to_lowercase();
    let address = full_address.trim().to_lowercase();
    let mut key = String::with_capacity(name.len() + address.len());
    key.push_str(&name);
    key.push_str(&address);
    key
}

/// Key for a partially known record: missing fields count as empty strings.
pub fn derive_key_opt(name: Option<&str>, full_address: Option<&str>) -> String {
    derive_key(name.unwrap_or(""), full_address.unwrap_or(""))
}
