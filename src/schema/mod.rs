//! Schema/Type Bridge.
//!
//! A single declarative field list (`record::FIELDS`) drives three artifacts
//! that must stay synchronised: DDL generation (`ddl`), row encoding
//! (`Record::bind_into`), and row decoding (`Record::from_row`).

pub mod ddl;
pub mod record;

pub use ddl::{create_table_sql, insert_sql, quote_ident};
pub use record::{is_known_field, is_numeric_field, Record, FIELDS};
