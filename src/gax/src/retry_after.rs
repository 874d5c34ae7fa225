// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parse the delay requested by the service.
//!
//! Azure services use three headers to request a delay before the next
//! attempt or poll. They are consulted in this order:
//!
//! 1. `retry-after-ms`, in milliseconds.
//! 2. `x-ms-retry-after-ms`, in milliseconds.
//! 3. `Retry-After`, either in seconds or as an HTTP-date.
//!
//! Values that cannot be parsed are ignored.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::time::Duration;

pub const RETRY_AFTER_MS: &str = "retry-after-ms";
pub const X_MS_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

/// Returns the delay requested by the service, if any.
///
/// # Example
/// ```
/// # use azure_rest_gax::retry_after::server_delay;
/// use std::time::Duration;
/// let mut headers = http::HeaderMap::new();
/// headers.insert("retry-after", http::HeaderValue::from_static("2"));
/// assert_eq!(server_delay(&headers), Some(Duration::from_secs(2)));
/// ```
pub fn server_delay(headers: &HeaderMap) -> Option<Duration> {
    server_delay_at(headers, Utc::now())
}

/// Same as [server_delay], computing HTTP-date values relative to `now`.
///
/// A date in the past produces a zero delay.
pub fn server_delay_at(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let millis = [RETRY_AFTER_MS, X_MS_RETRY_AFTER_MS]
        .into_iter()
        .find_map(|name| header(headers, name).and_then(|v| v.parse::<u64>().ok()));
    if let Some(ms) = millis {
        return Some(Duration::from_millis(ms));
    }
    let value = header(headers, http::header::RETRY_AFTER.as_str())?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        date.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use test_case::test_case;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2015-10-21T07:28:00Z")
            .expect("valid test timestamp")
            .with_timezone(&Utc)
    }

    #[test_case(&[], None; "none")]
    #[test_case(&[("retry-after", "5")], Some(Duration::from_secs(5)); "seconds")]
    #[test_case(&[("retry-after", "0")], Some(Duration::ZERO); "zero seconds")]
    #[test_case(&[("retry-after-ms", "250")], Some(Duration::from_millis(250)); "retry-after-ms")]
    #[test_case(&[("x-ms-retry-after-ms", "150")], Some(Duration::from_millis(150)); "x-ms-retry-after-ms")]
    #[test_case(&[("retry-after", "5"), ("retry-after-ms", "250")], Some(Duration::from_millis(250)); "milliseconds first")]
    #[test_case(&[("retry-after-ms", "250"), ("x-ms-retry-after-ms", "150")], Some(Duration::from_millis(250)); "retry-after-ms first")]
    #[test_case(&[("retry-after-ms", "abc"), ("retry-after", "3")], Some(Duration::from_secs(3)); "bad milliseconds ignored")]
    #[test_case(&[("retry-after", "Wed, 21 Oct 2015 07:28:30 GMT")], Some(Duration::from_secs(30)); "http date")]
    #[test_case(&[("retry-after", "Wed, 21 Oct 2015 07:27:00 GMT")], Some(Duration::ZERO); "http date in the past")]
    #[test_case(&[("retry-after", "soon")], None; "garbage")]
    #[test_case(&[("retry-after", "-1")], None; "negative")]
    fn parse(pairs: &[(&'static str, &'static str)], want: Option<Duration>) {
        assert_eq!(server_delay_at(&headers(pairs), now()), want);
    }
}
