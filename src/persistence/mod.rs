pub mod import;
pub mod persist;
pub mod settings;
