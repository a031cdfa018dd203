pub mod config;
pub mod fetch;
pub mod history;
pub mod process;
pub mod store;
pub mod update;
