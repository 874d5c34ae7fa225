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

mod logging;
mod retry;
mod telemetry;
mod transport;

pub use logging::LoggingPolicy;
pub use retry::{RetryEngine, RetryableStatus};
pub use telemetry::{CLIENT_REQUEST_ID, TelemetryPolicy};
pub use transport::TransportPolicy;
