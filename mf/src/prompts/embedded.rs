//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// SQL logic synthesis prompt
pub const SQL_LOGIC: &str = include_str!("../../prompts/sql-logic.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "sql-logic" => Some(SQL_LOGIC),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
