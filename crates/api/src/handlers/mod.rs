pub mod assist;
pub mod notes;
pub mod settings;
