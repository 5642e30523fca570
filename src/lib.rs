pub mod app;
pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod join;
pub mod listing;
pub mod normalize;
pub mod output;
pub mod records;
pub mod report;
pub mod store;
