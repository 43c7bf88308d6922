pub mod commands;
pub mod config;
pub mod error;
pub mod io_struct;
pub mod server;
pub mod upstream;
