/*
 * The remote side of the profile data layer. `ProfileRemoteOperations` is the
 * capability the profile service depends on: a by-id read and a full-resource
 * replace, both returning the profile as the server now has it.
 *
 * `HttpProfileRemote` implements it over HTTP with `reqwest`:
 *   GET {base_url}/api/v1/profile/{id}
 *   PUT {base_url}/api/v1/profile/{id}   (JSON body with every field)
 * An optional header (name + token, from the config) is attached to every
 * request. Transport, status and decoding failures are kept apart in
 * `RemoteError`, although the service treats them all as one failure kind.
 */
use super::models::{Profile, ProfileId};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};

const PROFILE_PATH: &str = "api/v1/profile";

#[derive(Debug)]
pub enum RemoteError {
    InvalidUrl(String),
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Decode(serde_json::Error),
    IdMismatch { requested: ProfileId, received: ProfileId },
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::InvalidUrl(url) => write!(f, "Invalid remote URL: {url}"),
            RemoteError::Http(e) => write!(f, "HTTP transport error: {e}"),
            RemoteError::Status { status, body } => {
                write!(f, "Remote returned status {status}: {body}")
            }
            RemoteError::Decode(e) => write!(f, "Could not decode remote profile: {e}"),
            RemoteError::IdMismatch {
                requested,
                received,
            } => write!(
                f,
                "Remote returned profile '{received}' for requested profile '{requested}'"
            ),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Http(e) => Some(e),
            RemoteError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[async_trait]
pub trait ProfileRemoteOperations: Send + Sync {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<Profile>;
    // Full-resource replace: every field of `profile` is sent.
    async fn put_profile(&self, profile: &Profile) -> Result<Profile>;
}

pub struct HttpProfileRemote {
    client: reqwest::Client,
    base_url: Url,
    auth: Option<(String, String)>,
}

impl HttpProfileRemote {
    pub fn new(base_url: &str, auth_header: Option<String>, auth_token: Option<String>) -> Result<Self> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| RemoteError::InvalidUrl(format!("{base_url}: {e}")))?;
        let auth = match (auth_header, auth_token) {
            (Some(header), Some(token)) => Some((header, token)),
            (Some(header), None) => {
                log::warn!("HttpProfileRemote: Auth header '{header}' configured without a token; ignoring.");
                None
            }
            _ => None,
        };
        Ok(HttpProfileRemote {
            client: reqwest::Client::new(),
            base_url,
            auth,
        })
    }

    fn profile_url(&self, id: &ProfileId) -> Result<Url> {
        self.base_url
            .join(&format!("{PROFILE_PATH}/{id}"))
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((header, token)) => request.header(header.as_str(), token.as_str()),
            None => request,
        }
    }

    async fn send_for_profile(&self, request: RequestBuilder) -> Result<Profile> {
        let response = self.with_auth(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            log::warn!("HttpProfileRemote: Remote returned {status}: {body}");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        let profile: Profile = serde_json::from_slice(&bytes)?;
        Ok(profile)
    }
}

#[async_trait]
impl ProfileRemoteOperations for HttpProfileRemote {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<Profile> {
        let url = self.profile_url(id)?;
        log::debug!("HttpProfileRemote: GET {url}");
        self.send_for_profile(self.client.get(url)).await
    }

    async fn put_profile(&self, profile: &Profile) -> Result<Profile> {
        let url = self.profile_url(&profile.id)?;
        log::debug!("HttpProfileRemote: PUT {url}");
        self.send_for_profile(self.client.put(url).json(profile)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alice_json() -> serde_json::Value {
        json!({
            "id": "1",
            "name": "Alice",
            "avatar": "https://img.example/alice.png",
            "description": "NFT enthusiast",
            "website": "https://alice.example",
            "nfts": ["n1", "n2"],
            "likes": ["n1"]
        })
    }

    #[tokio::test]
    async fn test_fetch_profile_decodes_body_and_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/profile/1"))
            .and(header("X-Api-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(alice_json()))
            .expect(1)
            .mount(&server)
            .await;

        let remote = HttpProfileRemote::new(
            &server.uri(),
            Some("X-Api-Token".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        let profile = remote
            .fetch_profile(&ProfileId::new("1").unwrap())
            .await
            .unwrap();

        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.nfts, vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(profile.likes, vec!["n1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_profile_sends_full_field_set() {
        let server = MockServer::start().await;
        let mut updated = alice_json();
        updated["likes"] = json!(["n1", "n2"]);
        Mock::given(method("PUT"))
            .and(path("/api/v1/profile/1"))
            .and(body_json(updated.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(updated.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let remote = HttpProfileRemote::new(&server.uri(), None, None).unwrap();
        let profile: Profile = serde_json::from_value(updated).unwrap();
        let returned = remote.put_profile(&profile).await.unwrap();

        assert_eq!(returned, profile);
    }

    #[tokio::test]
    async fn test_non_success_status_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/profile/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let remote = HttpProfileRemote::new(&server.uri(), None, None).unwrap();
        let result = remote.fetch_profile(&ProfileId::new("9").unwrap()).await;

        assert!(matches!(
            result,
            Err(RemoteError::Status { status: 404, ref body }) if body == "not found"
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/profile/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\": 1"))
            .mount(&server)
            .await;

        let remote = HttpProfileRemote::new(&server.uri(), None, None).unwrap();
        let result = remote.fetch_profile(&ProfileId::new("1").unwrap()).await;

        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_base_url_with_path_prefix_is_kept() {
        let remote = HttpProfileRemote::new("https://api.example/mock", None, None).unwrap();
        let url = remote.profile_url(&ProfileId::new("7").unwrap()).unwrap();
        assert_eq!(url.as_str(), "https://api.example/mock/api/v1/profile/7");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpProfileRemote::new("not a url", None, None),
            Err(RemoteError::InvalidUrl(_))
        ));
    }
}
