pub mod database;
pub mod logging;

pub use database::init_database;
pub use logging::init_logging;
