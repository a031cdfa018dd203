// src/fetch/mod.rs
pub mod files;
pub mod urls;
