//! Command implementations

pub mod init_config;
pub mod normalize;
pub mod run;

pub use init_config::run_init_config;
pub use normalize::run_normalize;
pub use run::run_pipeline;
