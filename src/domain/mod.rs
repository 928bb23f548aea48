// Domain layer - Dashboard records and change detection primitives
pub mod content_hash;
pub mod dashboard;
