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

use crate::Result;
use crate::credentials::TokenCredential;
use crate::token::AccessToken;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use crate::errors::CredentialsError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Refresh = Shared<BoxFuture<'static, Result<AccessToken>>>;

#[derive(Default)]
struct Slot {
    // The last token returned by the credential.
    token: Option<AccessToken>,
    // The refresh in progress, if any. All the callers share its result.
    refresh: Option<Refresh>,
}

/// Caches tokens per scope set, with at most one refresh in flight per set.
///
/// Tokens are refreshed once they are within `refresh_window` of their
/// expiration. Failed refreshes are not cached, the next caller starts a new
/// refresh.
pub(crate) struct TokenCache {
    credential: Arc<dyn TokenCredential>,
    refresh_window: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("credential", &self.credential)
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

fn map_lock_err<T>(e: PoisonError<T>) -> CredentialsError {
    CredentialsError::from_str(false, format!("cannot acquire the token cache lock: {e}"))
}

fn cache_key(scopes: &[String]) -> String {
    let mut sorted: Vec<&str> = scopes.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(" ")
}

impl TokenCache {
    pub(crate) fn new(credential: Arc<dyn TokenCredential>, refresh_window: Duration) -> Self {
        Self {
            credential,
            refresh_window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_refresh_window(&mut self, v: Duration) {
        self.refresh_window = v;
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>> {
        self.slots.lock().map_err(map_lock_err)
    }

    pub(crate) async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        let key = cache_key(scopes);
        let refresh = {
            let mut slots = self.slots()?;
            let slot = slots.entry(key.clone()).or_default();
            if let Some(token) = &slot.token {
                if !token.expires_within(self.refresh_window) {
                    return Ok(token.clone());
                }
            }
            if let Some(refresh) = &slot.refresh {
                refresh.clone()
            } else {
                let credential = self.credential.clone();
                let scopes = scopes.to_vec();
                let refresh = async move { credential.get_token(&scopes).await }
                    .boxed()
                    .shared();
                slot.refresh = Some(refresh.clone());
                refresh
            }
        };

        let result = refresh.clone().await;

        let mut slots = self.slots()?;
        let slot = slots.entry(key).or_default();
        if slot.refresh.as_ref().is_some_and(|r| r.ptr_eq(&refresh)) {
            slot.refresh = None;
            if let Ok(token) = &result {
                slot.token = Some(token.clone());
            }
        }
        match result {
            Ok(token) => Ok(token),
            // A token that is about to expire is still usable.
            Err(e) => match &slot.token {
                Some(token) if !token.is_expired() => {
                    tracing::warn!("cannot refresh access token, using the cached token: {e}");
                    Ok(token.clone())
                }
                _ => Err(e),
            },
        }
    }

    /// Discards the cached token for `scopes`, the next call refreshes it.
    pub(crate) fn invalidate(&self, scopes: &[String]) -> Result<()> {
        if let Some(slot) = self.slots()?.get_mut(&cache_key(scopes)) {
            slot.token = None;
        }
        Ok(())
    }
}
