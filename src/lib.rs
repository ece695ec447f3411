// Library root
// -----------
// The post-publish hook is a small binary (`main.rs`) on top of these
// modules, so each part can be tested without the recording pipeline.
//
// Module responsibilities:
// - `config`: command line options, environment fallbacks and env files.
// - `api`: blocking client for the b3scale recordings import endpoint.
// - `logging`: weekly-rotated log file and the per-run logging handle.
// - `hook`: reads a recording's metadata.xml and uploads it.
// - `error`: failure classes of a run and their exit codes.
pub mod api;
pub mod config;
pub mod error;
pub mod hook;
pub mod logging;

#[cfg(test)]
mod test_support;
