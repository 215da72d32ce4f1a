use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::queries::CatalogQuery;
use super::types::{CatalogData, MovieDetails, MoviePage};
use crate::cache::Fetcher;
use crate::error::HttpError;

/// Catalog REST client
///
/// Stateless apart from the connection pool; cheap to clone and safe to share
/// across every cache key.
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base_url: String,
  token: Option<String>,
  timeout: Duration,
}

/// Error body returned by the catalog on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  status_message: Option<String>,
}

impl CatalogClient {
  pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, HttpError> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| HttpError::Network(format!("failed to create HTTP client: {}", e)))?;

    Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      token: token.filter(|t| !t.trim().is_empty()),
      timeout,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn has_token(&self) -> bool {
    self.token.is_some()
  }

  /// Join base URL, path and URL-encoded query parameters.
  pub fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, HttpError> {
    let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
    let mut url = Url::parse(&raw).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !params.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }

    Ok(url)
  }

  fn build_request(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<reqwest::Request, HttpError> {
    let url = self.url(path, params)?;
    let mut builder = self.http.get(url).header(ACCEPT, "application/json");
    if let Some(token) = &self.token {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
      .build()
      .map_err(|e| HttpError::InvalidUrl(e.to_string()))
  }

  /// GET a JSON document. Failures come back as values, never panics.
  pub async fn request<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, HttpError> {
    let request = self.build_request(path, params)?;
    tracing::debug!(url = %request.url(), "catalog request");

    let response = self
      .http
      .execute(request)
      .await
      .map_err(|e| self.transport_error(e))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| self.transport_error(e))?;

    if !status.is_success() {
      let err = status_error(status, &body);
      tracing::warn!(path, error = %err, "catalog request failed");
      return Err(err);
    }

    serde_json::from_slice(&body).map_err(|e| HttpError::Parse(format!("{}: {}", path, e)))
  }

  pub async fn movie_page(&self, query: &CatalogQuery) -> Result<MoviePage, HttpError> {
    let (path, params) = query.request();
    self.request(&path, &params).await
  }

  pub async fn movie_details(&self, id: u64) -> Result<MovieDetails, HttpError> {
    let (path, params) = CatalogQuery::details(id).request();
    self.request(&path, &params).await
  }

  fn transport_error(&self, e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
      HttpError::Timeout(self.timeout)
    } else {
      HttpError::Network(e.to_string())
    }
  }
}

/// Build the error for a non-2xx response, preferring the API's own message.
fn status_error(status: StatusCode, body: &[u8]) -> HttpError {
  let message = serde_json::from_slice::<ApiErrorBody>(body)
    .ok()
    .and_then(|b| b.status_message)
    .filter(|m| !m.is_empty())
    .or_else(|| status.canonical_reason().map(str::to_string))
    .unwrap_or_else(|| "unknown error".to_string());

  HttpError::Status {
    status: status.as_u16(),
    message,
  }
}

impl Fetcher<CatalogQuery> for CatalogClient {
  fn fetch(&self, query: &CatalogQuery) -> BoxFuture<'static, Result<CatalogData, HttpError>> {
    let client = self.clone();
    let query = query.clone();
    Box::pin(async move {
      match query {
        CatalogQuery::Details { id } => client
          .movie_details(id)
          .await
          .map(|details| CatalogData::Details(Box::new(details))),
        _ => client.movie_page(&query).await.map(CatalogData::Page),
      }
    })
  }
}

impl std::fmt::Debug for CatalogClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CatalogClient")
      .field("base_url", &self.base_url)
      .field("token", &self.token.as_ref().map(|_| "<redacted>"))
      .field("timeout", &self.timeout)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::queries::MovieList;

  fn client(token: Option<&str>) -> CatalogClient {
    CatalogClient::new(
      "https://api.themoviedb.org/3/",
      token.map(str::to_string),
      Duration::from_secs(5),
    )
    .unwrap()
  }

  #[test]
  fn test_url_joins_base_path_and_params() {
    let client = client(None);
    let (path, params) = CatalogQuery::search("star wars & co", 2).request();
    let url = client.url(&path, &params).unwrap();

    assert_eq!(
      url.as_str(),
      "https://api.themoviedb.org/3/search/movie?query=star+wars+%26+co&page=2"
    );
  }

  #[test]
  fn test_url_without_params() {
    let url = client(None).url("/movie/550", &[]).unwrap();
    assert_eq!(url.as_str(), "https://api.themoviedb.org/3/movie/550");
    assert_eq!(url.query(), None);
  }

  #[test]
  fn test_bearer_header_attached_when_configured() {
    let request = client(Some("secret"))
      .build_request("/movie/popular", &[("page", "1".to_string())])
      .unwrap();
    assert_eq!(
      request.headers().get(AUTHORIZATION).unwrap(),
      "Bearer secret"
    );

    let request = client(None).build_request("/movie/popular", &[]).unwrap();
    assert!(request.headers().get(AUTHORIZATION).is_none());
  }

  #[test]
  fn test_blank_token_is_ignored() {
    assert!(!client(Some("  ")).has_token());
  }

  #[test]
  fn test_invalid_base_url() {
    let err = CatalogClient::new("not a url", None, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, HttpError::InvalidUrl(_)));
  }

  #[test]
  fn test_status_error_prefers_api_message() {
    let body = br#"{"status_code": 7, "status_message": "Invalid API key: You must be granted a valid key.", "success": false}"#;
    let err = status_error(StatusCode::UNAUTHORIZED, body);
    assert_eq!(
      err,
      HttpError::Status {
        status: 401,
        message: "Invalid API key: You must be granted a valid key.".to_string()
      }
    );
  }

  #[test]
  fn test_status_error_falls_back_to_reason() {
    let err = status_error(StatusCode::SERVICE_UNAVAILABLE, b"<html>down</html>");
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("Service Unavailable"));
  }

  #[tokio::test]
  async fn test_connection_failure_is_a_value() {
    let client = CatalogClient::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();
    let result = client
      .fetch(&CatalogQuery::list(MovieList::Popular, 1))
      .await;

    assert!(matches!(
      result,
      Err(HttpError::Network(_)) | Err(HttpError::Timeout(_))
    ));
  }
}
