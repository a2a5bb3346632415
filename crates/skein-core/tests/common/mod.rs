#![allow(dead_code)]

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use skein_core::{RuntimeFlavor, SchedulerConfig};

static INIT_LOGGING: Once = Once::new();

pub const LIMIT: Duration = Duration::from_secs(10);

pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

pub fn config(flavor: RuntimeFlavor) -> SchedulerConfig {
    SchedulerConfig {
        flavor,
        ..SchedulerConfig::default()
    }
}

/// Run `fut` on a runtime of the given flavor, failing the test if it hangs.
pub fn block_on<F: Future>(flavor: RuntimeFlavor, fut: F) -> F::Output {
    init_test_logging();
    let runtime = config(flavor).build_runtime().unwrap();
    runtime.block_on(async {
        tokio::time::timeout(LIMIT, fut)
            .await
            .expect("test timed out")
    })
}
