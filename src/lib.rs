pub mod acquire;
pub mod app;
pub mod compress;
pub mod config;
pub mod demux;
pub mod domain;
pub mod ena;
pub mod error;
pub mod fs_util;
pub mod manifest;
pub mod output;
pub mod sample;
pub mod schema;
pub mod srr;
pub mod table;
