pub mod meter_read_queries;

pub use meter_read_queries::{monthly_reads, MonthlyMeterRead};
