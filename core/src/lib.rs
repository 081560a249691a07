pub mod aggregate;
pub mod csv_import;
pub mod db;
pub mod error;
pub mod estimate;
pub mod goals;
pub mod history;
pub mod models;
pub mod service;
pub mod units;
