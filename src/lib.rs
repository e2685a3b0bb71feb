pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod input;
pub mod linker;
pub mod literal;
pub mod plan;
pub mod report;
pub mod step;
pub mod util;
