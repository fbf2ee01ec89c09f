//! Line-shape tests on transitions resolved from a registry

// Profile family relations, areas and limits
mod profile_tests;
