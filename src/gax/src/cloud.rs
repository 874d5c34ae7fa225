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

use std::collections::BTreeMap;

/// The name of the Azure Resource Manager service in a [CloudConfiguration].
pub const RESOURCE_MANAGER: &str = "resourceManager";

/// The endpoint and token audience of a service in a cloud.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfiguration {
    pub audience: String,
    pub endpoint: String,
}

impl ServiceConfiguration {
    pub fn new<A: Into<String>, E: Into<String>>(audience: A, endpoint: E) -> Self {
        Self {
            audience: audience.into(),
            endpoint: endpoint.into(),
        }
    }

    /// The scope requested from the credential when calling this service.
    ///
    /// # Example
    /// ```
    /// # use azure_rest_gax::cloud::*;
    /// let cloud = CloudConfiguration::azure_public();
    /// let arm = cloud.service(RESOURCE_MANAGER).unwrap();
    /// assert_eq!(arm.scope(), "https://management.core.windows.net//.default");
    /// ```
    pub fn scope(&self) -> String {
        format!("{}/.default", self.audience)
    }
}

/// The endpoints of an Azure cloud.
///
/// Clients receive a cloud configuration at construction time and never
/// consult a global registry. Applications targeting a sovereign or private
/// cloud can build their own configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudConfiguration {
    authority_host: String,
    services: BTreeMap<String, ServiceConfiguration>,
}

impl CloudConfiguration {
    /// Creates a configuration without any services.
    pub fn new<T: Into<String>>(authority_host: T) -> Self {
        Self {
            authority_host: authority_host.into(),
            services: BTreeMap::new(),
        }
    }

    /// The Azure public cloud.
    pub fn azure_public() -> Self {
        Self::new("https://login.microsoftonline.com/").with_service(
            RESOURCE_MANAGER,
            ServiceConfiguration::new(
                "https://management.core.windows.net/",
                "https://management.azure.com",
            ),
        )
    }

    /// Azure operated by 21Vianet in China.
    pub fn azure_china() -> Self {
        Self::new("https://login.chinacloudapi.cn/").with_service(
            RESOURCE_MANAGER,
            ServiceConfiguration::new(
                "https://management.core.chinacloudapi.cn",
                "https://management.chinacloudapi.cn",
            ),
        )
    }

    /// Azure for US Government.
    pub fn azure_government() -> Self {
        Self::new("https://login.microsoftonline.us/").with_service(
            RESOURCE_MANAGER,
            ServiceConfiguration::new(
                "https://management.core.usgovcloudapi.net",
                "https://management.usgovcloudapi.net",
            ),
        )
    }

    /// Adds or replaces the configuration for a service.
    pub fn with_service<K: Into<String>>(mut self, name: K, service: ServiceConfiguration) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    /// The Microsoft Entra authority host.
    pub fn authority_host(&self) -> &str {
        &self.authority_host
    }

    /// The configuration of a service, if any.
    pub fn service(&self, name: &str) -> Option<&ServiceConfiguration> {
        self.services.get(name)
    }
}

impl Default for CloudConfiguration {
    fn default() -> Self {
        Self::azure_public()
    }
}
