pub mod cli;
pub mod clock;
pub mod conversions;
pub mod files;
pub mod plot;
pub mod runner;
pub mod sampler;
pub mod settings;
pub mod writer;
