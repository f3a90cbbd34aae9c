//! Message and filename parsing: MIME tree walking and the filename path grammar.

pub mod filename;
pub mod mime;
