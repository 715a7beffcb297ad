use futures::future::BoxFuture;
use ninelives_schedule::Sleeper;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("TestError: {0}")]
pub struct TestError(pub String);

impl TestError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Sleeper that cancels `token` the moment a wait starts and then never completes.
#[derive(Debug, Clone)]
pub struct CancellingSleeper {
    token: CancellationToken,
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl CancellingSleeper {
    pub fn new(token: CancellationToken) -> Self {
        Self { token, waits: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for CancellingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.waits.lock().unwrap().push(duration);
        self.token.cancel();
        Box::pin(futures::future::pending())
    }
}

/// Shared attempt counter for actions that fail a fixed number of times before succeeding.
#[derive(Debug, Clone, Default)]
pub struct Flaky {
    calls: Arc<AtomicUsize>,
}

impl Flaky {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the first `failures` calls with `"attempt N"`, then return the 1-based call number.
    pub fn call(&self, failures: usize) -> Result<usize, TestError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(TestError(format!("attempt {}", n)))
        } else {
            Ok(n)
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}
