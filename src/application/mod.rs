// Application layer - Use cases and the ports they depend on
pub mod change_publisher;
pub mod dashboard_source;
pub mod drift_detector;
pub mod repository_host;
pub mod sync_service;

#[cfg(test)]
pub mod test_support;
