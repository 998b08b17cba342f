pub mod cli;
pub mod commands;
pub mod cursor;
pub mod errors;
pub mod fragment;
pub mod mft;
pub mod models;
pub mod output;
