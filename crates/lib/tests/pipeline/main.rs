//! End-to-end build scenarios driven through a recording process runner.

mod cancellation_tests;
mod common;
mod container_tests;
mod windows_tests;
