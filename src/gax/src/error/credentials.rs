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

use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

/// Represents an error acquiring an access token from a credential.
///
/// Credential providers return this error when they cannot produce a token,
/// for example because a secret is wrong, or because the identity endpoint is
/// unreachable. The provider may flag the failure as transient. The pipeline
/// never retries token acquisition by itself: the bearer token policy reports
/// all failures as non-retryable [authentication][crate::error::Error::is_authentication]
/// errors, and the provider is expected to apply its own retry policy.
///
/// The type is `Clone` because a single refresh result is shared with all the
/// callers waiting on it.
///
/// # Example
/// ```
/// # use azure_rest_gax::error::CredentialsError;
/// let err = CredentialsError::from_str(
///     true, "simulated transient error while trying to acquire a token");
/// assert!(err.is_transient());
/// assert!(format!("{err}").contains("simulated transient error"));
/// ```
#[derive(Clone, Debug)]
pub struct CredentialsError {
    transient: bool,
    source: CredentialsErrorImpl,
}

#[derive(Clone, Debug)]
enum CredentialsErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl CredentialsError {
    /// Creates a new `CredentialsError` wrapping `source`.
    ///
    /// # Arguments
    /// * `transient` - if `true` the credential provider believes a future
    ///   attempt may succeed.
    /// * `source` - the underlying error that caused the failure.
    pub fn new<T: Error + Send + Sync + 'static>(transient: bool, source: T) -> Self {
        CredentialsError {
            transient,
            source: CredentialsErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` from a message.
    ///
    /// # Arguments
    /// * `transient` - if `true` the credential provider believes a future
    ///   attempt may succeed.
    /// * `message` - a description of the failure.
    pub fn from_str<T: Into<String>>(transient: bool, message: T) -> Self {
        CredentialsError {
            transient,
            source: CredentialsErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// Returns `true` if the provider believes a future attempt may succeed.
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            CredentialsErrorImpl::SimpleMessage(_) => None,
            CredentialsErrorImpl::Source(source) => Some(source.as_ref()),
        }
    }
}

const TRANSIENT_MSG: &str = "but future attempts may succeed";
const PERMANENT_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.transient {
            TRANSIENT_MSG
        } else {
            PERMANENT_MSG
        };
        match &self.source {
            CredentialsErrorImpl::SimpleMessage(m) => {
                write!(f, "cannot acquire an access token, {msg}: {m}")
            }
            CredentialsErrorImpl::Source(s) => {
                write!(f, "cannot acquire an access token, {msg}: {s}")
            }
        }
    }
}
