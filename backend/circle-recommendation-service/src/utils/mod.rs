// Utility functions for circle-recommendation-service

use crate::error::{RecommendationError, Result};
use chrono::{DateTime, Utc};
use serde::Serializer;
use std::future::Future;
use std::time::Duration;

/// Exponential decay over whole elapsed days: `exp(-days / scale_days)`
pub fn day_decay(days_ago: i64, scale_days: f64) -> f64 {
    if scale_days <= 0.0 {
        return 0.0;
    }
    (-(days_ago.max(0) as f64) / scale_days).exp()
}

/// Whole days between `then` and `now`, never negative
pub fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_days().max(0)
}

/// Cosine similarity over sparse vectors; 0.0 when there is no shared dimension
pub fn sparse_cosine(
    a: &std::collections::HashMap<String, f64>,
    b: &std::collections::HashMap<String, f64>,
) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(key, va)| b.get(key).map(|vb| va * vb))
        .sum();

    if dot == 0.0 {
        return 0.0;
    }

    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();

    if norm_a < f64::EPSILON || norm_b < f64::EPSILON {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

/// Run a fallible future under a deadline
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RecommendationError::Timeout(duration)),
    }
}

/// Serialize a float rounded to three decimals
pub fn round3<S>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}
