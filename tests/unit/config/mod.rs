// Unit tests for configuration loading and validation

pub mod loader_test;
