//! Build pipeline: clone, detect, synthesize recipe, build, import

pub mod detect;
pub mod dockerfile;
pub mod engine;
pub mod git;

pub use engine::BuildEngine;
