//! Integration tests for url-scout
//!
//! These tests use wiremock to stand in for the sites being crawled and for
//! the render and audit services, and run the full discovery cycle end-to-end.

mod crawl_tests;
mod scheduler_tests;
