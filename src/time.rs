//! Single place that stamps ISO-8601 UTC timestamps with a trailing `Z`.
//! `chrono::DateTime::to_rfc3339` emits a `+00:00` offset instead, which
//! doesn't match what every client on the wire expects.

use chrono::Utc;

pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
