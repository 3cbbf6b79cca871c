pub mod access_keys;
pub mod content;
pub mod schema;
pub mod vector_configs;
pub mod websites;
