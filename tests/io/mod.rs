//! File-format tests: line lists, spectrum tables and fit configurations

mod config;
mod line_list;
