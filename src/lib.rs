pub mod api;
pub mod assign;
pub mod config;
pub mod db;
pub mod filter;
pub mod ingest;
pub mod output;
pub mod qa;
