/// Entry point for the Dockwatch container monitor.
///
/// This binary connects to the local container engine, polls container state
/// and resource usage, raises alerts on crashes and restarts, and serves the
/// results on a local HTTP API.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., malformed settings file or
/// an unparsable engine url).
///
/// # Examples
///
/// ```bash
/// ENGINE_API_URL=http://localhost:2375 RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    dockwatch::run().await
}
