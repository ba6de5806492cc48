//! Code Lookup Module
//! Bidirectional lookup between country names and codes.

use std::collections::BTreeMap;

/// Mapping from code (country or continent) to display name.
pub type CodeMap = BTreeMap<String, String>;

/// Find the code of a country by its name.
///
/// Scans the mapping values in key order and returns the first matching key.
pub fn country_to_code<'a>(name: &str, mapping: &'a CodeMap) -> Option<&'a str> {
    mapping
        .iter()
        .find(|(_, value)| value.as_str() == name)
        .map(|(key, _)| key.as_str())
}

/// Find the name of a country by its code.
pub fn code_to_country<'a>(code: &str, mapping: &'a CodeMap) -> Option<&'a str> {
    mapping.get(code).map(String::as_str)
}

/// Parse a JSON object of `code -> name` pairs.
pub fn code_map_from_json(text: &str) -> Result<CodeMap, serde_json::Error> {
    serde_json::from_str(text)
}
