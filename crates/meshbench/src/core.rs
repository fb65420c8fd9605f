//! Core meshbench data structures, traits, and routines. The most common entry point is
//! [experiment::run()], which turns a [scenario](Scenario) into a [report](Report).

pub use meshbench_core::*;
