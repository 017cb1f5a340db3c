pub mod data_schema;
pub mod info_schema;
pub mod staging_schema;
