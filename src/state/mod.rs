pub mod scrape_status;

pub use scrape_status::{RunState, ScrapeStatus, StatusReport};
