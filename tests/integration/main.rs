//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock forum servers and test the
//! login handshake, pagination walks and full harvest runs end-to-end.

mod harvest_tests;
mod login_tests;
mod support;
