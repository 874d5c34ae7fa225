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

//! The glue between per-service clients and the pipeline.
//!
//! Each operation of a per-service client describes its request with a
//! [RequestTemplate], sends it with a [ServiceClient], and either decodes the
//! typed response or receives a structured [Error].

use crate::Result;
use crate::cloud::ServiceConfiguration;
use crate::context::Context;
use crate::error::{Error, ResponseError};
use crate::http::{Request, Response};
use crate::options::ClientOptions;
use crate::pager::{PagedList, Pager};
use crate::pipeline::Pipeline;
use crate::policy::Policy;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use url::Url;

/// The query parameter carrying the service API version.
pub const API_VERSION: &str = "api-version";

// Everything but the RFC 3986 unreserved characters. Notably `/` is encoded,
// so a parameter value cannot change the shape of the path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(thiserror::Error, Debug)]
enum TemplateError {
    #[error("missing required parameter {0}")]
    MissingParameter(String),
    #[error("parameter {0} cannot be empty")]
    EmptyParameter(String),
    #[error("unterminated parameter in path template {0:?}")]
    Unterminated(String),
}

/// A compact description of a single REST request.
///
/// The path is a template where `{name}` placeholders are replaced by the
/// values set with [with_path_param][RequestTemplate::with_path_param].
///
/// # Example
/// ```
/// # use azure_rest_gax::client::RequestTemplate;
/// let template = RequestTemplate::get(
///         "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}")
///     .with_path_param("subscriptionId", "00000000-0000-0000-0000-000000000000")
///     .with_path_param("resourceGroupName", "my rg")
///     .with_api_version("2022-12-01");
/// let endpoint = url::Url::parse("https://management.azure.com")?;
/// let request = template.build(&endpoint)?;
/// assert_eq!(
///     request.url().as_str(),
///     "https://management.azure.com/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/my%20rg?api-version=2022-12-01");
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    method: Method,
    path: String,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    expected_status: Vec<u16>,
}

impl RequestTemplate {
    /// Creates a template. The default expected status is `200 OK`.
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            expected_status: vec![200],
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn with_path_param<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Appends a query parameter. Repeated names produce repeated parameters.
    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_api_version<V: Into<String>>(self, version: V) -> Self {
        self.with_query(API_VERSION, version)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body.
    pub fn with_json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(Error::ser)?;
        self.body = Some(Bytes::from(body));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Sets the status codes treated as success.
    pub fn with_expected_status<I: IntoIterator<Item = u16>>(mut self, codes: I) -> Self {
        self.expected_status = codes.into_iter().collect();
        self
    }

    pub fn expected_status(&self) -> &[u16] {
        &self.expected_status
    }

    /// Creates the request for `endpoint`.
    ///
    /// Fails with a usage error if a path parameter is missing or empty.
    pub fn build(&self, endpoint: &Url) -> Result<Request> {
        let path = expand_path(&self.path, &self.path_params)?;
        let mut url = join_path(endpoint, &path);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        let mut request = Request::new(self.method.clone(), url);
        request.insert_header(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            request.insert_header(name.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            request.set_body(body.clone());
        }
        Ok(request)
    }
}

/// Replaces the `{name}` placeholders in `template`.
///
/// Values are percent-encoded as a single path segment.
///
/// # Example
/// ```
/// # use azure_rest_gax::client::expand_path;
/// let params = [("name".to_string(), "a/b c".to_string())];
/// assert_eq!(expand_path("/items/{name}", &params)?, "/items/a%2Fb%20c");
/// # Ok::<(), azure_rest_gax::error::Error>(())
/// ```
pub fn expand_path(template: &str, params: &[(String, String)]) -> Result<String> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail
            .find('}')
            .ok_or_else(|| Error::usage(TemplateError::Unterminated(template.to_string())))?;
        let name = &tail[..end];
        let value = params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::usage(TemplateError::MissingParameter(name.to_string())))?;
        if value.is_empty() {
            return Err(Error::usage(TemplateError::EmptyParameter(name.to_string())));
        }
        path.extend(utf8_percent_encode(value, PATH_SEGMENT));
        rest = &tail[end + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

// Appends `path` to the endpoint path, keeping the endpoint query.
fn join_path(endpoint: &Url, path: &str) -> Url {
    let mut url = endpoint.clone();
    let joined = format!(
        "{}/{}",
        endpoint.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}

/// Returns the response if its status is one of `expected`, and the decoded
/// service error otherwise.
pub fn check_status(response: Response, expected: &[u16]) -> Result<Response> {
    if response.has_status_code(expected) {
        return Ok(response);
    }
    Err(Error::service(ResponseError::from_response(&response)))
}

/// Sends [RequestTemplate]s to a service endpoint through a shared pipeline.
///
/// Per-service clients hold one of these, and implement each operation as a
/// call to [call][ServiceClient::call], [send][ServiceClient::send], or
/// [pager][ServiceClient::pager].
#[derive(Clone, Debug)]
pub struct ServiceClient {
    endpoint: Url,
    pipeline: Pipeline,
}

impl ServiceClient {
    pub fn new(endpoint: Url, pipeline: Pipeline) -> Self {
        Self { endpoint, pipeline }
    }

    /// Creates a client for `endpoint` with a pipeline built from `options`.
    pub fn from_options(
        endpoint: &str,
        options: &ClientOptions,
        module: &str,
        version: &str,
        auth: Option<Arc<dyn Policy>>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(Error::usage)?;
        let pipeline = options.build_pipeline(module, version, auth)?;
        Ok(Self::new(endpoint, pipeline))
    }

    /// Creates a client for a service of the cloud in `options`.
    ///
    /// The endpoint comes from the [CloudConfiguration][crate::cloud::CloudConfiguration]
    /// entry for `service`. `auth` receives the same entry, so the
    /// authentication policy can request a token for the audience of that
    /// cloud.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::client::ServiceClient;
    /// # use azure_rest_gax::cloud::{CloudConfiguration, RESOURCE_MANAGER};
    /// # use azure_rest_gax::options::ClientOptions;
    /// # fn sample() -> azure_rest_gax::Result<()> {
    /// let options = ClientOptions::default().set_cloud(CloudConfiguration::azure_china());
    /// let client = ServiceClient::for_service(RESOURCE_MANAGER, &options, "resources", "1.0.0", |_| None)?;
    /// assert_eq!(client.endpoint().as_str(), "https://management.chinacloudapi.cn/");
    /// # Ok(()) }
    /// ```
    pub fn for_service<F>(
        service: &str,
        options: &ClientOptions,
        module: &str,
        version: &str,
        auth: F,
    ) -> Result<Self>
    where
        F: FnOnce(&ServiceConfiguration) -> Option<Arc<dyn Policy>>,
    {
        let config = options.service(service)?;
        let endpoint = Url::parse(&config.endpoint).map_err(Error::usage)?;
        let pipeline = options.build_pipeline(module, version, auth(config))?;
        Ok(Self::new(endpoint, pipeline))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Sends the request and checks the status against the expected codes.
    pub async fn send(&self, ctx: &Context, template: &RequestTemplate) -> Result<Response> {
        let request = template.build(&self.endpoint)?;
        let response = self.pipeline.send(ctx, request).await?;
        check_status(response, template.expected_status())
    }

    /// Sends the request and decodes the JSON response.
    pub async fn call<T>(&self, ctx: &Context, template: &RequestTemplate) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        self.send(ctx, template).await?.json()
    }

    /// Fetches a page using the next link returned by the service.
    ///
    /// The link is used verbatim. Relative links are resolved against the
    /// endpoint.
    pub async fn get_link(&self, ctx: &Context, link: &str) -> Result<Response> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.endpoint.join(link).map_err(Error::usage)?
            }
            Err(e) => return Err(Error::usage(e)),
        };
        let mut request = Request::new(Method::GET, url);
        request.insert_header(ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.pipeline.send(ctx, request).await?;
        check_status(response, &[200])
    }

    /// Creates a pager for a list operation returning [PagedList] pages.
    pub fn pager<T>(&self, template: RequestTemplate) -> Pager<PagedList<T>>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let first = {
            let client = self.clone();
            move |ctx: Context| {
                let client = client.clone();
                let template = template.clone();
                async move { client.send(&ctx, &template).await?.json::<PagedList<T>>() }
            }
        };
        let client = self.clone();
        let advance = move |ctx: Context, link: String| {
            let client = client.clone();
            async move { client.get_link(&ctx, &link).await?.json::<PagedList<T>>() }
        };
        Pager::new(first, advance)
    }
}
