//! Integration tests for the parameter vector
//!
//! These go through the vector a fit builds, rather than hand-made entries.

// Expression links, bounds from limits and saved vectors
mod vector_tests;
