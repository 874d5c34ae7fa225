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

/// The status of a long-running operation.
///
/// Services report many intermediate states (`Accepted`, `Running`,
/// `Updating`, ...). All of them map to [InProgress][Status::InProgress].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl Status {
    /// Maps a status string returned by a service.
    ///
    /// The comparison ignores case, and accepts both `Canceled` and
    /// `Cancelled`.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_lro::Status;
    /// assert_eq!(Status::from_service("succeeded"), Status::Succeeded);
    /// assert_eq!(Status::from_service("Cancelled"), Status::Canceled);
    /// assert_eq!(Status::from_service("Updating"), Status::InProgress);
    /// ```
    pub fn from_service(status: &str) -> Self {
        if status.eq_ignore_ascii_case("succeeded") {
            Self::Succeeded
        } else if status.eq_ignore_ascii_case("failed") {
            Self::Failed
        } else if status.eq_ignore_ascii_case("canceled") || status.eq_ignore_ascii_case("cancelled")
        {
            Self::Canceled
        } else {
            Self::InProgress
        }
    }

    /// Terminal states are permanent, a terminal operation is never polled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
