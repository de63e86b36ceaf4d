pub mod files;
pub mod vision;
