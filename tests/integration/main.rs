//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one session path
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod gsr_tests;
mod mock_hw;
mod session_flow_tests;
mod sim_pipeline_tests;
