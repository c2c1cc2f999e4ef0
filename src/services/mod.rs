pub mod artifact;
pub mod pipeline;
pub mod transform;
pub mod workspace;
