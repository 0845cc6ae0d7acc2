pub mod filename;
pub mod json;
