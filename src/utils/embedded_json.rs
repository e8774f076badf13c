//! Extraction of JSON blobs embedded in HTML script assignments
//!
//! Pages frequently ship their state as `var someName = {...};` inside a
//! script element. Slicing on a fixed suffix breaks as soon as the page adds
//! another statement after the assignment, and splitting on `;` breaks on the
//! first semicolon inside a string literal. Instead the text after the prefix
//! is handed to a streaming JSON deserializer, which consumes exactly one
//! value and stops, whatever follows it.

use serde_json::Value;
use tracing::trace;

/// Find `prefix` in `document` and parse the JSON object that follows it.
///
/// Every occurrence of the prefix is tried in order; the first one followed
/// by a well-formed JSON object wins. Returns `None` when no occurrence
/// yields an object.
pub fn extract_assigned_json(document: &str, prefix: &str) -> Option<Value> {
    let mut search_from = 0;

    while let Some(found) = document[search_from..].find(prefix) {
        let value_start = search_from + found + prefix.len();
        let rest = &document[value_start..];

        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => return Some(value),
            Some(Ok(_)) => trace!("Assignment at offset {} is not an object", value_start),
            Some(Err(e)) => trace!("Assignment at offset {} did not parse: {}", value_start, e),
            None => {}
        }

        search_from = value_start;
    }

    None
}
