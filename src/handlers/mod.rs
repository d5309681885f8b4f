pub mod bulletin;
pub mod general;
pub mod rules;
