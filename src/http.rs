use std::{fmt::Debug, time::Duration};

use log::trace;
use thiserror::Error;

/// Transport used to reach remote repositories.
pub trait HttpSender: Send + Sync {
    fn get(&self, uri: &str) -> RequestBuilder {
        RequestBuilder::new(uri)
    }

    fn send(&self, request: Request) -> Result<Response, HttpError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub uri: String,
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(uri: &str) -> Self {
        Self {
            request: Request {
                uri: uri.to_owned(),
                credentials: None,
            },
        }
    }

    pub fn with_basic_authentication(mut self, username: &str, password: &str) -> Self {
        self.request.credentials = Some((username.to_owned(), password.to_owned()));
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Request to {0} timed out")]
    Timeout(String),
    #[error("Request to {0} failed: {1}")]
    Transport(String, String),
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }
}

/// Blocking reqwest client. Must not be created or dropped inside an async context.
pub struct ReqwestSender {
    client: reqwest::blocking::Client,
}

impl ReqwestSender {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("pomfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpSender for ReqwestSender {
    fn send(&self, request: Request) -> Result<Response, HttpError> {
        trace!("GET {}", request.uri);
        let mut builder = self.client.get(&request.uri);
        if let Some((username, password)) = &request.credentials {
            builder = builder.basic_auth(username, Some(password));
        }
        let transport_error = |error: reqwest::Error| {
            if error.is_timeout() {
                HttpError::Timeout(request.uri.clone())
            } else {
                HttpError::Transport(request.uri.clone(), error.to_string())
            }
        };
        let response = builder.send().map_err(transport_error)?;
        let code = response.status().as_u16();
        let body = response.bytes().map_err(transport_error)?.to_vec();
        Ok(Response { code, body })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    struct Rule {
        authenticated: Option<bool>,
        response: Response,
    }

    /// Serves canned responses and records every request. Unknown URIs get a 404.
    #[derive(Default)]
    pub(crate) struct FakeHttpSender {
        rules: Mutex<HashMap<String, Vec<Rule>>>,
        timeouts: Mutex<HashMap<String, usize>>,
        unreachable: Mutex<Vec<String>>,
        requests: Mutex<Vec<Request>>,
    }

    impl FakeHttpSender {
        pub(crate) fn respond(&self, uri: &str, code: u16, body: &str) -> &Self {
            self.add_rule(uri, None, code, body)
        }

        pub(crate) fn respond_authenticated(&self, uri: &str, authenticated: bool, code: u16, body: &str) -> &Self {
            self.add_rule(uri, Some(authenticated), code, body)
        }

        fn add_rule(&self, uri: &str, authenticated: Option<bool>, code: u16, body: &str) -> &Self {
            self.rules
                .lock()
                .unwrap()
                .entry(uri.to_owned())
                .or_default()
                .push(Rule {
                    authenticated,
                    response: Response {
                        code,
                        body: body.as_bytes().to_vec(),
                    },
                });
            self
        }

        /// The next `count` requests to `uri` time out.
        pub(crate) fn time_out(&self, uri: &str, count: usize) -> &Self {
            self.timeouts.lock().unwrap().insert(uri.to_owned(), count);
            self
        }

        /// Requests to any URI starting with `prefix` fail to connect.
        pub(crate) fn unreachable(&self, prefix: &str) -> &Self {
            self.unreachable.lock().unwrap().push(prefix.to_owned());
            self
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn request_count(&self, uri: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|request| request.uri == uri)
                .count()
        }
    }

    impl HttpSender for FakeHttpSender {
        fn send(&self, request: Request) -> Result<Response, HttpError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(remaining) = self.timeouts.lock().unwrap().get_mut(&request.uri) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(HttpError::Timeout(request.uri));
                }
            }
            let unreachable = self
                .unreachable
                .lock()
                .unwrap()
                .iter()
                .any(|prefix| request.uri.starts_with(prefix.as_str()));
            if unreachable {
                return Err(HttpError::Transport(request.uri, "connection refused".to_owned()));
            }
            let authenticated = request.credentials.is_some();
            let rules = self.rules.lock().unwrap();
            let response = rules
                .get(&request.uri)
                .and_then(|rules| {
                    rules.iter().find(|rule| {
                        rule.authenticated
                            .map_or(true, |required| required == authenticated)
                    })
                })
                .map(|rule| rule.response.clone())
                .unwrap_or(Response {
                    code: 404,
                    body: Vec::new(),
                });
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn request_builder_sets_credentials() {
        let request = RequestBuilder::new("https://repo.example.com/a.pom")
            .with_basic_authentication("user", "secret")
            .build();
        assert_eq!(
            request,
            Request {
                uri: "https://repo.example.com/a.pom".to_owned(),
                credentials: Some(("user".to_owned(), "secret".to_owned())),
            }
        );
    }

    #[test]
    fn successful_codes() {
        assert!(Response { code: 200, body: Vec::new() }.is_successful());
        assert!(Response { code: 204, body: Vec::new() }.is_successful());
        assert!(!Response { code: 301, body: Vec::new() }.is_successful());
        assert!(!Response { code: 404, body: Vec::new() }.is_successful());
    }
}
