//! Test suites for the launch sequence.

mod support;
