//! CLI subcommand implementations for the `docview` binary.

pub mod doctor;
pub mod document_cmd;
pub mod extract_cmd;
pub mod markdown_cmd;
pub mod output;
pub mod resolve_cmd;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs always go to stderr so stdout stays
/// clean for results.
pub fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("docview_runtime={level}").parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A second init (tests, embedding) is not an error worth surfacing.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
