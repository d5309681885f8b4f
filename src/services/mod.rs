pub mod aggregator;
pub mod archive;
pub mod bulletin;
pub mod calculator;
pub mod delivery;
pub mod email;
pub mod pdf;
pub mod pipeline;
pub mod remote_renderer;
pub mod render;
pub mod repository;

#[cfg(test)]
pub(crate) mod fixtures;
