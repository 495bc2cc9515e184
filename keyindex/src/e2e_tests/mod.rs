//! End-to-end tests against a real index file.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! to verify behavior through the public `Index` API and the resulting file
//! layout.

#![cfg(test)]

mod helpers;

mod test_corruption;
mod test_end_to_end_scenario;
mod test_free_list_reuse;
mod test_merge;
mod test_randomized;
mod test_reopen;
mod test_root_emptying;
mod test_upsert;
