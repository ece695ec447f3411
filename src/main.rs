// Entrypoint for the post-publish hook.
// - Loads env files, parses options, builds the API client and the
//   logging handle, then runs the import once.
// - The exit status tells the recording pipeline what happened.

use b3scale_import_hook::api::ApiClient;
use b3scale_import_hook::config::{self, Args};
use b3scale_import_hook::error::HookError;
use b3scale_import_hook::hook::{self, Import};
use b3scale_import_hook::logging;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Env files must be in place before clap reads the environment.
    config::load_env_files();
    let args = Args::parse();

    let log = match logging::init(&args.log_file, &args.log_level) {
        Ok(log) => log,
        Err(err) => return fail(&HookError::Config(err)),
    };
    let api = match ApiClient::new(&args.api_url, &args.access_token, args.request_timeout()) {
        Ok(api) => api,
        Err(err) => {
            let err = HookError::Api(err);
            tracing::dispatcher::with_default(&log, || {
                tracing::error!(error = %err, "invalid API configuration");
            });
            return fail(&err);
        }
    };

    match hook::run(&Import::from_args(&args), &api, &log) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => fail(&err),
    }
}

fn fail(err: &HookError) -> ExitCode {
    eprintln!("post-publish-b3scale-import: {err}");
    ExitCode::from(err)
}
