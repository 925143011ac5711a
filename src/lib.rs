pub mod api_client;
pub mod config;
pub mod csv_history;
pub mod domain;
pub mod infra;
pub mod notify;
pub mod overrides;
pub mod usecases;

#[cfg(test)]
mod tests;
