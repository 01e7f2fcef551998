// Library root: config, loaders, report writers and the report pipeline
// around fragcap-core. The `fragcap` binary is a thin wrapper.

pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod report;
