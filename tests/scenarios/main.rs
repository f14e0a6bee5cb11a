//! Scenario-based tests for taskgate

mod cancellation;
mod declared_order;
mod failure_policy;
mod helpers;
