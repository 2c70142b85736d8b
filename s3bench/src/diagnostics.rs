//! One-shot startup diagnostics.
//!
//! None of these affect the benchmark itself. Every failure is logged and swallowed.

use s3::creds::Credentials;
use secrecy::ExposeSecret;

use crate::config::{Config, Storage};

/// Logs the current CPU affinity and applies the configured one, if any.
///
/// Call this before the async runtime starts: the affinity is inherited by threads spawned
/// afterwards, but not applied to existing ones.
pub fn apply_cpu_affinity(config: &Config) {
    match affinity::get() {
        Ok(mask) => tracing::info!(mask = format_args!("{mask:#x}"), "current CPU affinity"),
        Err(err) => tracing::warn!(
            error = &err as &dyn std::error::Error,
            mask = -1,
            "failed to query CPU affinity"
        ),
    }

    let Some(requested) = config.diagnostics.cpu_affinity else {
        return;
    };

    match affinity::set(requested) {
        Ok(mask) => tracing::info!(mask = format_args!("{mask:#x}"), "pinned CPU affinity"),
        Err(err) => tracing::warn!(
            error = &err as &dyn std::error::Error,
            requested = format_args!("{requested:#x}"),
            mask = -1,
            "failed to set CPU affinity"
        ),
    }
}

/// Resolves S3 credentials the same way the storage client will, and logs the access key id.
pub async fn report_credentials(config: &Config) {
    if !config.diagnostics.credentials {
        return;
    }

    let Storage::S3Compatible {
        access_key,
        secret_key,
        ..
    } = &config.storage
    else {
        tracing::debug!("skipping credential check for non-S3 storage");
        return;
    };

    let access_key = access_key
        .as_ref()
        .map(|key| key.expose_secret().as_str().to_owned());
    let secret_key = secret_key
        .as_ref()
        .map(|key| key.expose_secret().as_str().to_owned());

    // The default credential chain may query instance metadata with a blocking client.
    let resolved = tokio::task::spawn_blocking(move || {
        Credentials::new(
            access_key.as_deref(),
            secret_key.as_deref(),
            None,
            None,
            None,
        )
    })
    .await;

    match resolved {
        Ok(Ok(credentials)) => tracing::info!(
            access_key = credentials.access_key.as_deref().unwrap_or("<anonymous>"),
            "resolved S3 credentials"
        ),
        Ok(Err(err)) => tracing::warn!(
            error = &err as &dyn std::error::Error,
            "failed to resolve S3 credentials"
        ),
        Err(err) => tracing::warn!(
            error = &err as &dyn std::error::Error,
            "credential resolution panicked"
        ),
    }
}

/// Process CPU affinity as a bitmask over the first 64 CPUs.
pub mod affinity {
    #[cfg(target_os = "linux")]
    use nix::sched::{CpuSet, sched_getaffinity, sched_setaffinity};
    #[cfg(target_os = "linux")]
    use nix::unistd::Pid;

    const MASK_BITS: usize = u64::BITS as usize;

    /// Returns the CPUs the current process may run on.
    #[cfg(target_os = "linux")]
    pub fn get() -> nix::Result<u64> {
        let set = sched_getaffinity(Pid::from_raw(0))?;

        let mut mask = 0;
        for cpu in 0..CpuSet::count().min(MASK_BITS) {
            if set.is_set(cpu)? {
                mask |= 1 << cpu;
            }
        }
        Ok(mask)
    }

    /// Restricts the current process to the CPUs in `mask` and returns the resulting affinity.
    #[cfg(target_os = "linux")]
    pub fn set(mask: u64) -> nix::Result<u64> {
        let mut set = CpuSet::new();
        for cpu in 0..MASK_BITS {
            if mask & (1 << cpu) != 0 {
                set.set(cpu)?;
            }
        }

        sched_setaffinity(Pid::from_raw(0), &set)?;
        get()
    }

    #[cfg(not(target_os = "linux"))]
    pub fn get() -> nix::Result<u64> {
        Err(nix::Error::ENOTSUP)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn set(_mask: u64) -> nix::Result<u64> {
        Err(nix::Error::ENOTSUP)
    }

    #[cfg(all(test, target_os = "linux"))]
    mod tests {
        use super::*;

        #[test]
        fn reports_at_least_one_cpu() {
            let mask = get().unwrap();
            assert_ne!(mask, 0);
        }

        #[test]
        fn empty_mask_is_rejected() {
            assert!(set(0).is_err());
        }

        #[test]
        fn reapplying_current_mask_is_stable() {
            // Reapplying a truncated mask would pin the test binary to the first 64 CPUs.
            let current = sched_getaffinity(Pid::from_raw(0)).unwrap();
            if (MASK_BITS..CpuSet::count()).any(|cpu| current.is_set(cpu).unwrap()) {
                return;
            }

            let mask = get().unwrap();
            assert_eq!(set(mask).unwrap(), mask);
        }
    }
}
