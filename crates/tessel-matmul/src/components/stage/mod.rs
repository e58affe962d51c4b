mod l0_pipeline;

pub use l0_pipeline::*;
