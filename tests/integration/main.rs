//! End-to-end pipeline tests against in-memory collaborators.

mod mock_market;
mod scan_pipeline;
