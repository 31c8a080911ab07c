pub mod collector;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod util;
