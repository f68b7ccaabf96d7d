pub mod accounts;
pub mod core;
pub mod courses;
pub mod resources;
pub mod school_years;
pub mod setup;
pub mod tasks;
