// Copyright 2024 Google LLC
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

use std::time::Duration;
use time::OffsetDateTime;

/// An access token returned by a [TokenCredential][crate::credentials::TokenCredential].
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    /// The secret used in the `Authorization: Bearer` header.
    pub token: String,

    /// The time at which the token expires.
    ///
    /// This is an absolute wall-clock time, so it remains valid when copied
    /// across processes.
    pub expires_on: OffsetDateTime,
}

impl AccessToken {
    pub fn new<T: Into<String>>(token: T, expires_on: OffsetDateTime) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Returns `true` if the token expires within `window` from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_on <= OffsetDateTime::now_utc() + window
    }

    /// Returns `true` if the token has already expired.
    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::ZERO)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[censored]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug() {
        let expires_on = OffsetDateTime::now_utc() + Duration::from_secs(3600);
        let token = AccessToken::new("token-test-only", expires_on);
        let got = format!("{token:?}");
        assert!(!got.contains("token-test-only"), "{got}");
        assert!(got.contains("token: \"[censored]\""), "{got}");
        assert!(got.contains(&format!("expires_on: {expires_on:?}")), "{got}");
    }

    #[test]
    fn expiration() {
        let token = AccessToken::new("t", OffsetDateTime::now_utc() + Duration::from_secs(600));
        assert!(!token.is_expired());
        assert!(!token.expires_within(Duration::from_secs(300)));
        assert!(token.expires_within(Duration::from_secs(900)));

        let token = AccessToken::new("t", OffsetDateTime::now_utc() - Duration::from_secs(1));
        assert!(token.is_expired());
    }
}
