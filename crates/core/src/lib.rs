pub mod config;
pub mod domain;
pub mod indicators;
pub mod ingest;
pub mod pipeline;
pub mod portfolio;
pub mod report;
pub mod scoring;
pub mod storage;
pub mod time;
