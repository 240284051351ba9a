// CLI module exports

pub mod entrypoint;
pub mod fixture;

pub use entrypoint::{run, Cli};
