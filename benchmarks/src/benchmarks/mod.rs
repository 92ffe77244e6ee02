pub mod backup;
pub mod transform;
