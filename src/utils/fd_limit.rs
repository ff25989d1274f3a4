//! File descriptor limit detection for capping concurrent operations (Unix).

use crate::utils::config::BatchConsts;

/// Fraction of the process FD limit to use (leave headroom for other code).
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Returns the soft limit for max open file descriptors, or `None` if unavailable (e.g. Windows).
#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    // RLIM_INFINITY is typically !0 or u64::MAX; treat as "no practical limit"
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Suggested max number of concurrent batch units so we stay under ~80% of the FD limit.
/// Returns `None` if no limit is available (use caller's default).
pub fn max_units_by_fd_limit() -> Option<usize> {
    let limit = max_open_fds()?;
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    if usable < BatchConsts::FDS_PER_UNIT {
        return Some(1);
    }
    Some(usable / BatchConsts::FDS_PER_UNIT)
}

/// Clamp a requested concurrency to `[1, MAX_CONCURRENCY]` and the FD-derived cap.
pub fn cap_concurrency(requested: usize) -> usize {
    let capped = requested.clamp(1, BatchConsts::MAX_CONCURRENCY);
    match max_units_by_fd_limit() {
        Some(fd_cap) if fd_cap < capped => {
            log::debug!("Capping concurrency {} -> {} (FD limit ~80%)", capped, fd_cap);
            fd_cap.max(1)
        }
        _ => capped,
    }
}
