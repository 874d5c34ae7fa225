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

//! Resume tokens are the [PollingState] of a pending operation, as versioned
//! JSON encoded with URL-safe base64.

use crate::state::PollingState;
use crate::status::Status;
use crate::strategy::{FinalStateVia, Strategy};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gax::Result;
use gax::error::Error;
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

const VERSION: u32 = 1;

/// Errors creating or loading a resume token.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ResumeTokenError {
    #[error("the operation is complete, there is nothing to resume")]
    Terminal,
    #[error("the resume token is not valid base64")]
    Encoding(#[source] base64::DecodeError),
    #[error("the resume token is malformed")]
    Malformed(#[source] serde_json::Error),
    #[error("the resume token has version {0}, only version {VERSION} is supported")]
    UnsupportedVersion(u64),
    #[error("the resume token has an invalid {field}")]
    InvalidField { field: &'static str },
}

#[derive(Deserialize)]
struct Versioned {
    v: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenV1 {
    v: u32,
    // strategy
    k: Strategy,
    // method of the initial request
    m: String,
    // resource URL
    r: String,
    // poll URL
    p: String,
    // `Location` header of the initial response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    l: Option<String>,
    f: FinalStateVia,
    // last known status, missing in tokens from older releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<String>,
}

pub(crate) fn encode(state: &PollingState) -> Result<String> {
    let poll_url = match (&state.poll_url, state.status) {
        (Some(url), Status::InProgress) => url,
        _ => return Err(Error::usage(ResumeTokenError::Terminal)),
    };
    let token = TokenV1 {
        v: VERSION,
        k: state.strategy,
        m: state.method.to_string(),
        r: state.resource_url.to_string(),
        p: poll_url.to_string(),
        l: state.location.as_ref().map(Url::to_string),
        f: state.final_state_via,
        s: Some(state.status.as_str().to_string()),
    };
    let json = serde_json::to_vec(&token).map_err(Error::ser)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub(crate) fn decode(token: &str) -> Result<PollingState> {
    let usage = Error::usage::<ResumeTokenError>;
    let json = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| usage(ResumeTokenError::Encoding(e)))?;
    let versioned = serde_json::from_slice::<Versioned>(&json)
        .map_err(|e| usage(ResumeTokenError::Malformed(e)))?;
    if versioned.v != u64::from(VERSION) {
        return Err(usage(ResumeTokenError::UnsupportedVersion(versioned.v)));
    }
    let token = serde_json::from_slice::<TokenV1>(&json)
        .map_err(|e| usage(ResumeTokenError::Malformed(e)))?;

    let invalid = |field: &'static str| usage(ResumeTokenError::InvalidField { field });
    let url = |field: &'static str, value: &str| Url::parse(value).map_err(|_| invalid(field));
    if token.k == Strategy::Body {
        return Err(invalid("strategy"));
    }
    let method = Method::from_bytes(token.m.as_bytes()).map_err(|_| invalid("method"))?;
    let status = token.s.as_deref().map_or(Status::InProgress, Status::from_service);
    if status.is_terminal() {
        return Err(invalid("status"));
    }
    Ok(PollingState {
        strategy: token.k,
        status,
        method,
        resource_url: url("resource URL", &token.r)?,
        poll_url: Some(url("poll URL", &token.p)?),
        location: token.l.as_deref().map(|l| url("location", l)).transpose()?,
        final_state_via: token.f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> PollingState {
        let parse = |s: &str| Url::parse(s).expect("valid test URL");
        PollingState {
            strategy: Strategy::AsyncOperation,
            status: Status::InProgress,
            method: Method::PUT,
            resource_url: parse("https://management.azure.com/r?api-version=2024-01-01"),
            poll_url: Some(parse("https://management.azure.com/operations/op1")),
            location: Some(parse("https://management.azure.com/results/op1")),
            final_state_via: FinalStateVia::OriginalUri,
        }
    }

    fn raw(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    #[test]
    fn round_trip() -> anyhow::Result<()> {
        let want = state();
        let token = encode(&want)?;
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "{token}"
        );
        assert_eq!(decode(&token)?, want);
        Ok(())
    }

    #[test]
    fn round_trip_without_location() -> anyhow::Result<()> {
        let want = PollingState {
            location: None,
            strategy: Strategy::Location,
            method: Method::POST,
            ..state()
        };
        assert_eq!(decode(&encode(&want)?)?, want);
        Ok(())
    }

    #[test]
    fn format() -> anyhow::Result<()> {
        let token = encode(&state())?;
        let json: serde_json::Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(token)?)?;
        assert_eq!(
            json,
            json!({
                "v": 1,
                "k": "a",
                "m": "PUT",
                "r": "https://management.azure.com/r?api-version=2024-01-01",
                "p": "https://management.azure.com/operations/op1",
                "l": "https://management.azure.com/results/op1",
                "f": "uri",
                "s": "InProgress",
            })
        );
        Ok(())
    }

    #[test]
    fn status_is_optional() -> anyhow::Result<()> {
        let token = raw(json!({
            "v": 1,
            "k": "l",
            "m": "POST",
            "r": "https://h/r",
            "p": "https://h/p",
            "f": "d",
        }));
        let got = decode(&token)?;
        assert_eq!(got.status, Status::InProgress);
        assert_eq!(got.strategy, Strategy::Location);
        Ok(())
    }

    #[test]
    fn terminal_status_is_rejected() {
        let token = raw(json!({
            "v": 1,
            "k": "a",
            "m": "PUT",
            "r": "https://h/r",
            "p": "https://h/p",
            "f": "d",
            "s": "Succeeded",
        }));
        let err = decode(&token).unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        assert!(format!("{err}").contains("status") || format!("{err:?}").contains("status"), "{err:?}");
    }

    #[test]
    fn terminal() {
        let state = PollingState {
            status: Status::Succeeded,
            ..state()
        };
        let err = encode(&state).unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test]
    fn unsupported_version() {
        let token = raw(json!({"v": 2, "k": "a"}));
        let err = decode(&token).unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        assert!(format!("{err}").contains("version 2"), "{err}");
    }

    #[test]
    fn not_base64() {
        let err = decode("not a token!").unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test]
    fn malformed() {
        for token in [
            raw(json!("v1")),
            raw(json!({"v": 1})),
            raw(json!({"v": 1, "k": "z", "m": "PUT", "r": "https://h/", "p": "https://h/", "f": "d"})),
            raw(json!({"v": 1, "k": "b", "m": "PUT", "r": "https://h/", "p": "https://h/", "f": "d"})),
            raw(json!({"v": 1, "k": "a", "m": "P UT", "r": "https://h/", "p": "https://h/", "f": "d"})),
            raw(json!({"v": 1, "k": "a", "m": "PUT", "r": "https://h/", "p": "not a url", "f": "d"})),
        ] {
            let err = decode(&token).unwrap_err();
            assert!(err.is_usage(), "{token} {err:?}");
        }
    }
}
