//! Capture stream acquisition with bounded retry
//!
//! Transient failures (device busy, interrupted request) are retried a fixed
//! number of times with a fixed delay. Terminal failures (permission denied,
//! not found, overconstrained) abort immediately, wrapped with device-id
//! context. There is no automatic fallback to a different device.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::backend::media::{CaptureStream, MediaBackend};
use crate::config::TrackBinding;
use crate::error::{RecorderError, RecorderResult};

/// Bounded retry policy for stream acquisition
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// Open one capture stream, retrying transient failures per `policy`
pub async fn acquire(
    media: &dyn MediaBackend,
    device_id: Option<&str>,
    sample_rate: Option<u32>,
    policy: RetryPolicy,
) -> RecorderResult<Box<dyn CaptureStream>> {
    let label = device_id.unwrap_or("default");
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match media.open_stream(device_id, sample_rate).await {
            Ok(stream) => {
                if attempt > 1 {
                    tracing::info!("acquired device '{}' on attempt {}", label, attempt);
                }
                return Ok(stream);
            }
            Err(e) if e.is_transient() && attempt <= policy.max_retries => {
                tracing::warn!(
                    "transient failure acquiring device '{}' (attempt {}): {}",
                    label,
                    attempt,
                    e
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                return Err(RecorderError::DeviceAccess {
                    device_id: label.to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Acquire streams for every source in parallel.
///
/// Any single failure fails the whole call; streams that were already opened
/// are released before the error is returned. On success the streams come
/// back in source (track) order.
pub async fn acquire_many(
    media: Arc<dyn MediaBackend>,
    sources: &[TrackBinding],
    sample_rate: Option<u32>,
    policy: RetryPolicy,
) -> RecorderResult<Vec<Box<dyn CaptureStream>>> {
    let mut set = JoinSet::new();
    for (index, source) in sources.iter().enumerate() {
        let media = Arc::clone(&media);
        let device_id = source.device_id.clone();
        set.spawn(async move {
            let stream = acquire(media.as_ref(), device_id.as_deref(), sample_rate, policy).await;
            (index, stream)
        });
    }

    let mut slots: Vec<Option<Box<dyn CaptureStream>>> =
        (0..sources.len()).map(|_| None).collect();
    let mut first_error = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(stream))) => slots[index] = Some(stream),
            Ok((_, Err(e))) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(RecorderError::InvalidState(format!(
                        "acquisition task failed: {e}"
                    )));
                }
            }
        }
    }

    if let Some(error) = first_error {
        for mut stream in slots.into_iter().flatten() {
            stream.release().await;
        }
        return Err(error);
    }

    // All slots are filled once every task succeeded
    Ok(slots.into_iter().flatten().collect())
}
