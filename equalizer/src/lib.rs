pub mod args;
pub mod cluster;
pub mod error;
pub mod render;
pub mod run;
