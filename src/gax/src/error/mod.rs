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

//! Errors returned by the pipeline, the poller, and the pager.
//!
//! The clients distinguish between errors detected while trying to send a
//! request (e.g. cannot open a connection), errors created by the client
//! library itself (e.g. a missing path parameter), and errors returned by the
//! service. The latter carry a [ResponseError] with the details decoded from
//! the response payload.
//!
//! # Examples
//!
//! ```
//! # use azure_rest_gax::error::{Error, ErrorKind};
//! fn handle_error(e: Error) {
//!     match e.kind() {
//!         ErrorKind::Throttled => println!("slow down: {e}"),
//!         _ => match e.response_error() {
//!             Some(r) => println!("the service said {:?}: {}", r.error_code(), r.message()),
//!             None => println!("some other problem {e}"),
//!         },
//!     }
//! }
//! ```

mod core_error;
mod credentials;
mod response_error;
pub use core_error::*;
pub use credentials::*;
pub use response_error::*;
