// ESG waste-collection report: loads a customer's monthly collection table
// and an industry benchmark table, then builds the year-over-year, category
// breakdown and peer-comparison views of the report month.
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod peer;
pub mod reports;
pub mod types;
pub mod util;
pub mod yoy;

pub use error::{ReportError, ReportResult};
