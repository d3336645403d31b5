mod build_tests;
mod common;
mod env_check_tests;
