//! Test harness modules for the VFK CLI.

mod helpers;
