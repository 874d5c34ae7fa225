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

/// What the retry engine does after a failed attempt.
///
/// The engine keeps the error or response of the attempt, the policy only
/// picks one of these outcomes. The engine may still stop early, for example
/// when the request body cannot be sent again or the context deadline expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryResult {
    /// The failure is not retryable. The engine returns it unchanged.
    Permanent,
    /// The failure is retryable, but the policy has no attempts left. The
    /// engine returns an [exhausted][crate::error::Error::is_exhausted] error,
    /// or the last response.
    Exhausted,
    /// Wait and try again.
    Continue,
}

impl RetryResult {
    pub fn is_permanent(&self) -> bool {
        *self == Self::Permanent
    }

    pub fn is_exhausted(&self) -> bool {
        *self == Self::Exhausted
    }

    pub fn is_continue(&self) -> bool {
        *self == Self::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RetryResult::Permanent, [true, false, false])]
    #[test_case(RetryResult::Exhausted, [false, true, false])]
    #[test_case(RetryResult::Continue, [false, false, true])]
    fn predicates(result: RetryResult, want: [bool; 3]) {
        let got = [
            result.is_permanent(),
            result.is_exhausted(),
            result.is_continue(),
        ];
        assert_eq!(got, want, "{result:?}");
    }
}
