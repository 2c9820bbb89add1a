//! Case index adapters

mod http;

pub use http::HttpCaseIndex;
