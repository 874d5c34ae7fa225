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

#[cfg(test)]
mod test {
    use azure_rest_lro::{FinalStateVia, Poller, PollerOptions, Status, Strategy, begin};
    use gax::client::{RequestTemplate, ServiceClient};
    use gax::context::Context;
    use gax::options::{ClientOptions, RetryOptions};
    use httptest::{Expectation, Server, all_of, matchers::*, responders::*};
    use serde_json::{Value, json};
    use std::time::Duration;

    type TestResult = anyhow::Result<()>;

    #[derive(Debug, Default, PartialEq, serde::Deserialize)]
    struct Group {
        name: String,
    }

    fn client(server: &Server) -> anyhow::Result<ServiceClient> {
        let retry = RetryOptions::default()
            .set_initial_delay(Duration::from_millis(1))
            .set_max_delay(Duration::from_millis(1));
        let options = ClientOptions::default().set_retry(retry);
        let client = ServiceClient::from_options(
            &format!("http://{}", server.addr()),
            &options,
            "lro-integration",
            "1.0.0",
            None,
        )?;
        Ok(client)
    }

    fn options() -> PollerOptions {
        PollerOptions::default().set_frequency(Duration::from_millis(10))
    }

    fn json_responder(code: u16, body: Value) -> ResponseBuilder<String> {
        status_code(code)
            .insert_header("Content-Type", "application/json")
            .body(body.to_string())
    }

    fn expect_create(server: &Server) {
        let monitor = format!("http://{}/operations/op1", server.addr());
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/groups/g1"),
                request::query(url_decoded(contains(("api-version", "2024-03-01")))),
            ])
            .times(1)
            .respond_with(
                status_code(201)
                    .insert_header("Content-Type", "application/json")
                    .insert_header("Azure-AsyncOperation", monitor)
                    .body(json!({"name": "g1", "properties": {"provisioningState": "Creating"}}).to_string()),
            ),
        );
    }

    fn expect_polls(server: &Server, last: Value) {
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/operations/op1"),
                request::headers(contains(("accept", "application/json"))),
            ])
            .times(3)
            .respond_with(cycle(vec![
                Box::new(json_responder(200, json!({"status": "InProgress"}))) as Box<dyn Responder>,
                Box::new(json_responder(200, json!({"status": "InProgress"}))),
                Box::new(json_responder(200, last)),
            ])),
        );
    }

    fn create() -> anyhow::Result<RequestTemplate> {
        let template = RequestTemplate::put("/groups/{name}")
            .with_path_param("name", "g1")
            .with_api_version("2024-03-01")
            .with_json(&json!({"location": "westus"}))?;
        Ok(template)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_operation_success() -> TestResult {
        let server = Server::run();
        expect_create(&server);
        expect_polls(&server, json!({"name": "g1", "status": "Succeeded"}));

        let ctx = Context::new();
        let options = options().set_final_state_via(FinalStateVia::AzureAsyncOperation);
        let poller = begin::<Group>(&client(&server)?, &ctx, create()?, options).await?;
        assert_eq!(poller.strategy(), Strategy::AsyncOperation);
        let got = poller.poll_until_done(&ctx).await?;
        assert_eq!(got.name, "g1");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_operation_failure() -> TestResult {
        let server = Server::run();
        expect_create(&server);
        expect_polls(
            &server,
            json!({"status": "Failed", "error": {"code": "BadRequest", "message": "invalid sku"}}),
        );

        let ctx = Context::new();
        let poller = begin::<Group>(&client(&server)?, &ctx, create()?, options()).await?;
        let err = poller.poll_until_done(&ctx).await.unwrap_err();
        assert!(err.is_operation_failed(), "{err:?}");
        assert_eq!(err.operation_status(), Some("Failed"));
        assert_eq!(err.error_code(), Some("BadRequest"));
        let message = err
            .response_error()
            .map(|e| e.message().to_string())
            .unwrap_or_default();
        assert_eq!(message, "invalid sku");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resume_token_continuity() -> TestResult {
        let server = Server::run();
        expect_create(&server);
        // The same number of polls as without the resume token.
        expect_polls(&server, json!({"status": "Succeeded"}));
        server.expect(
            Expectation::matching(request::method_path("GET", "/groups/g1"))
                .times(1)
                .respond_with(json_responder(200, json!({"name": "g1"}))),
        );

        let client = client(&server)?;
        let ctx = Context::new();
        let mut poller = begin::<Group>(&client, &ctx, create()?, options()).await?;
        for _ in 0..2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(poller.poll(&ctx).await?, Status::InProgress);
        }
        let token = poller.resume_token()?;
        drop(poller);

        let poller = Poller::<Group>::from_resume_token(&token, client.pipeline().clone(), options())?;
        assert_eq!(poller.strategy(), Strategy::AsyncOperation);
        let got = poller.poll_until_done(&ctx).await?;
        assert_eq!(got, Group { name: "g1".into() });
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn location_delete() -> TestResult {
        let server = Server::run();
        let location = format!("http://{}/operationResults/d1", server.addr());
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/groups/g1"))
                .times(1)
                .respond_with(
                    status_code(202)
                        .insert_header("Location", location)
                        .insert_header("Retry-After", "0"),
                ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/operationResults/d1"))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(status_code(202)) as Box<dyn Responder>,
                    Box::new(status_code(204)),
                ])),
        );

        let template = RequestTemplate::delete("/groups/{name}").with_path_param("name", "g1");
        let ctx = Context::new();
        let poller = begin::<()>(&client(&server)?, &ctx, template, options()).await?;
        assert_eq!(poller.strategy(), Strategy::Location);
        poller.poll_until_done(&ctx).await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn initial_error() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/groups/g1"))
                .times(1)
                .respond_with(json_responder(
                    400,
                    json!({"error": {"code": "InvalidLocation", "message": "bad location"}}),
                )),
        );
        let ctx = Context::new();
        let err = begin::<Group>(&client(&server)?, &ctx, create()?, options())
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), Some(400));
        assert_eq!(err.error_code(), Some("InvalidLocation"));
        Ok(())
    }
}
