use tracing_subscriber::EnvFilter;

/// Benchmark crates logged in full during tests.
const BENCH_CRATES: &[&str] = &["s3bench", "s3bench_core"];

/// HTTP and S3 client crates. Request-level chatter from these drowns out batch events.
const CLIENT_CRATES: &[&str] = &["s3", "hyper", "hyper_util", "reqwest", "rustls"];

/// Installs a compact subscriber writing to the test runner's captured output.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init() {
    let mut env_filter = EnvFilter::new("WARN");

    for name in BENCH_CRATES {
        env_filter = env_filter.add_directive(format!("{name}=TRACE").parse().unwrap());
    }
    for name in CLIENT_CRATES {
        env_filter = env_filter.add_directive(format!("{name}=ERROR").parse().unwrap());
    }

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
