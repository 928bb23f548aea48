// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod github_client;
pub mod grafana_client;

#[cfg(test)]
mod test_server;
