pub mod builders;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// How long a single run may take in tests before it counts as hung.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber once per test binary.
///
/// Defaults to `warn,dagrun=info`; override with e.g.
/// `RUST_LOG=dagrun=debug cargo test`. Output only shows for failing tests
/// unless run with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,dagrun=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// [`within`] using [`RUN_TIMEOUT`].
pub async fn with_timeout<F: Future>(f: F) -> F::Output {
    within(RUN_TIMEOUT, f).await
}

/// Await `f`, panicking if it has not settled after `limit`.
///
/// A run that never settles usually means a task ended up waiting on its
/// own in-flight resolution.
pub async fn within<F: Future>(limit: Duration, f: F) -> F::Output {
    match tokio::time::timeout(limit, f).await {
        Ok(output) => output,
        Err(_) => panic!("run did not settle within {limit:?}; is a task waiting on itself?"),
    }
}
