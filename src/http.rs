//! `reqwest` implementation of [`Controller`].
//!
//! One client is configured up front (base URL, bearer token, JSON content
//! type, TLS verification, timeout) and shared read-only by every call.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::ControllerConfig;
use crate::controller::{
    ApiStatus, Controller, ControllerError, ControllerFuture, InstallRequest, InstanceRecord,
    UpdateRequest,
};
use crate::domain::Domain;

/// Controller client speaking the REST API over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpController {
    client: Client,
    base_url: String,
}

impl HttpController {
    /// Builds the shared client from configuration.
    ///
    /// The bearer header is only attached when a usable token is configured,
    /// so the client can be constructed before the token precondition is
    /// checked. A token that is not a valid header value is left out with a
    /// warning and the controller will reject the unauthenticated requests.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ClientBuild`] when the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(token) = config.require_token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        "access token is not a valid header value; sending no credentials"
                    );
                }
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|err| ControllerError::ClientBuild(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ControllerError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| classify(path, &err))?;
        check_status(path, response)
            .await?
            .json::<T>()
            .await
            .map_err(|err| ControllerError::Decode {
                path: path.to_owned(),
                message: err.to_string(),
            })
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ControllerError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|err| classify(path, &err))?;
        check_status(path, response).await.map(drop)
    }

    async fn fetch_api_status(&self) -> Result<ApiStatus, ControllerError> {
        let path = "/api/";
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| classify(path, &err))?;
        let checked = check_status(path, response).await?;
        if checked.status() != StatusCode::OK {
            return Err(ControllerError::Status {
                path: path.to_owned(),
                status: checked.status().as_u16(),
                body: String::new(),
            });
        }

        let body = checked
            .json::<Value>()
            .await
            .map_err(|err| ControllerError::Decode {
                path: path.to_owned(),
                message: err.to_string(),
            })?;
        if !body.as_object().is_some_and(|fields| !fields.is_empty()) {
            return Err(ControllerError::Decode {
                path: path.to_owned(),
                message: format!("expected a non-empty JSON object, got {body}"),
            });
        }
        serde_json::from_value(body).map_err(|err| ControllerError::Decode {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }
}

fn service_path(domain: Domain, action: &str) -> String {
    format!("/api/services/{}/{action}", domain.service())
}

fn classify(path: &str, err: &reqwest::Error) -> ControllerError {
    if err.is_timeout() {
        ControllerError::Timeout {
            path: path.to_owned(),
            message: err.to_string(),
        }
    } else if err.is_connect() {
        ControllerError::Connect {
            message: err.to_string(),
        }
    } else {
        ControllerError::Request {
            path: path.to_owned(),
            message: err.to_string(),
        }
    }
}

async fn check_status(path: &str, response: Response) -> Result<Response, ControllerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => ControllerError::Unauthorized,
        StatusCode::NOT_FOUND => ControllerError::NotFound {
            path: path.to_owned(),
        },
        other => ControllerError::Status {
            path: path.to_owned(),
            status: other.as_u16(),
            body,
        },
    })
}

impl Controller for HttpController {
    fn api_status(&self) -> ControllerFuture<'_, ApiStatus> {
        Box::pin(self.fetch_api_status())
    }

    fn list_instances(&self, domain: Domain) -> ControllerFuture<'_, Vec<InstanceRecord>> {
        Box::pin(async move { self.get_json(&service_path(domain, "list")).await })
    }

    fn get_instance<'a>(
        &'a self,
        domain: Domain,
        id: &'a str,
    ) -> ControllerFuture<'a, InstanceRecord> {
        Box::pin(async move {
            let path = format!("{}/{}", service_path(domain, "get"), urlencoding::encode(id));
            self.get_json(&path).await
        })
    }

    fn import_blueprint<'a>(
        &'a self,
        domain: Domain,
        request: &'a InstallRequest,
    ) -> ControllerFuture<'a, ()> {
        Box::pin(async move {
            self.post_json(&service_path(domain, "import_blueprint"), request)
                .await
        })
    }

    fn update_instance<'a>(
        &'a self,
        domain: Domain,
        request: &'a UpdateRequest,
    ) -> ControllerFuture<'a, ()> {
        Box::pin(async move { self.post_json(&service_path(domain, "reload"), request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn controller_for(server: &MockServer) -> HttpController {
        let config = ControllerConfig::for_controller(server.uri(), Some(String::from("tok")));
        HttpController::new(&config).expect("client should build")
    }

    #[rstest]
    #[tokio::test]
    async fn slow_controller_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "API running."}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        let mut config = ControllerConfig::for_controller(server.uri(), Some(String::from("tok")));
        config.timeout = 1;
        let controller = HttpController::new(&config).expect("client should build");

        let err = controller
            .api_status()
            .await
            .expect_err("slow answer should time out");

        assert!(
            matches!(&err, ControllerError::Timeout { path, .. } if path == "/api/"),
            "got {err:?}"
        );
        assert!(err.is_network());
    }

    #[rstest]
    #[tokio::test]
    async fn token_that_is_not_a_header_value_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        let config =
            ControllerConfig::for_controller(server.uri(), Some(String::from("bad\ntoken")));

        let controller = HttpController::new(&config).expect("client should still build");
        let err = controller
            .api_status()
            .await
            .expect_err("controller should reject the request");

        assert!(matches!(err, ControllerError::Unauthorized), "got {err:?}");
        let requests = server.received_requests().await.unwrap_or_default();
        assert!(
            requests
                .iter()
                .all(|request| !request.headers.contains_key("authorization")),
            "got {requests:?}"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn api_status_sends_bearer_token_and_reads_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "API running.", "version": "2024.1.0"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let status = controller_for(&server)
            .api_status()
            .await
            .expect("probe should succeed");

        assert_eq!(status.version.as_deref(), Some("2024.1.0"));
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!([]))]
    #[case(json!(null))]
    #[tokio::test]
    async fn api_status_rejects_malformed_bodies(#[case] body: Value) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = controller_for(&server)
            .api_status()
            .await
            .expect_err("malformed body should fail");

        assert!(matches!(err, ControllerError::Decode { .. }), "got {err:?}");
    }

    #[rstest]
    #[case(401, "unauthorized")]
    #[case(404, "not-found")]
    #[case(500, "status")]
    #[tokio::test]
    async fn error_statuses_map_to_variants(#[case] status: u16, #[case] expected: &str) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/services/automation/get/a1"))
            .respond_with(ResponseTemplate::new(status).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = controller_for(&server)
            .get_instance(Domain::Automations, "a1")
            .await
            .expect_err("error status should fail");

        let actual = match err {
            ControllerError::Unauthorized => "unauthorized",
            ControllerError::NotFound { .. } => "not-found",
            ControllerError::Status { status: 500, ref body, .. } if body == "boom" => "status",
            ref other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn list_instances_uses_service_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/services/script/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "name": "[CDA] Wake Up", "input": {}},
            ])))
            .mount(&server)
            .await;

        let records = controller_for(&server)
            .list_instances(Domain::Scripts)
            .await
            .expect("listing should succeed");

        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|r| r.id.as_str()), Some("s1"));
    }

    #[rstest]
    #[tokio::test]
    async fn writes_post_json_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/services/automation/import_blueprint"))
            .and(body_json(json!({"url": "https://example.org/a.yaml"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/services/automation/reload"))
            .and(body_json(json!({
                "automation_id": "a1",
                "blueprint": "automations/a.yaml",
                "input": {"brightness": 80},
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let controller = controller_for(&server);
        controller
            .import_blueprint(
                Domain::Automations,
                &InstallRequest {
                    url: String::from("https://example.org/a.yaml"),
                },
            )
            .await
            .expect("install should succeed");
        let mut input = serde_json::Map::new();
        input.insert(String::from("brightness"), json!(80));
        controller
            .update_instance(
                Domain::Automations,
                &UpdateRequest {
                    automation_id: String::from("a1"),
                    blueprint: String::from("automations/a.yaml"),
                    input,
                },
            )
            .await
            .expect("update should succeed");
    }

    #[rstest]
    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let config =
            ControllerConfig::for_controller("http://127.0.0.1:1", Some(String::from("tok")));
        let controller = HttpController::new(&config).expect("client should build");

        let err = controller
            .api_status()
            .await
            .expect_err("stopped server should be unreachable");

        assert!(err.is_network(), "expected network error, got {err:?}");
    }
}
