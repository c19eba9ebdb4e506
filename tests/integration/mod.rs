//! Shared fixtures for integration tests
#![allow(dead_code)]

pub mod fakes;
pub mod mock_server;
