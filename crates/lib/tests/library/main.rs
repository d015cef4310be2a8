mod common;
mod concurrency_tests;
mod generate_tests;
