pub mod config;
pub mod history;
pub mod routine;
pub mod run;
