// Test modules for pcp-portmap
// Each module holds the unit tests for the corresponding source module

mod coherence_tests;
mod command_tests;
mod config_tests;

/// Path of a file under `testdata/`
pub(crate) fn testdata(name: &str) -> String {
    format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
}
