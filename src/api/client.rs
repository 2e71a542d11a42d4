use reqwest::{
    Client as ReqwestClient, Method,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use super::types::{AckResponse, NotificationsRequest, NotificationsResponse, UnreadCountResponse};
use crate::error::Error;
use crate::models::Notification;
use crate::{Result, ToQueryParams as _};

/// Base URL of a locally running storefront API.
pub const DEFAULT_HOST: &str = "http://localhost:5000/api/";

/// Client for the storefront REST API.
///
/// Requests carry `Authorization: Bearer <token>` once a token is set with
/// [`with_token`](Self::with_token). Non-2xx responses become errors of kind
/// [`Kind::Status`](crate::error::Kind::Status).
///
/// # Example
///
/// ```no_run
/// use storefront_client_sdk::api::{Client, types::NotificationsRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::default().with_token("session-token");
///
/// let request = NotificationsRequest::builder().unread_only(true).build();
/// let page = client.notifications(&request).await?;
///
/// for notification in &page.notifications {
///     client.mark_notification_read(&notification.id).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    host: Url,
    client: ReqwestClient,
    token: Option<SecretString>,
}

impl Default for Client {
    fn default() -> Self {
        Client::new(DEFAULT_HOST).expect("Client with default endpoint should succeed")
    }
}

impl Client {
    /// Creates a new API client with a custom host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL is invalid or the HTTP client fails to build.
    pub fn new(host: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("storefront_client_sdk"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        let mut host = Url::parse(host)?;
        if host.cannot_be_a_base() {
            return Err(Error::validation(format!("{host} cannot be used as an API host")));
        }
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        Ok(Self {
            host,
            client,
            token: None,
        })
    }

    /// Authenticate subsequent requests with a bearer `token`.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(SecretString::from(token.to_owned()));
        self
    }

    /// Returns the host URL for the client.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    #[must_use]
    fn client(&self) -> &ReqwestClient {
        &self.client
    }

    /// Resolve `segments` against the host, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|()| Error::validation(format!("{} cannot be used as an API host", self.host)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<Option<HeaderMap>> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Some(headers))
    }

    /// List the signed-in user's notifications.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storefront_client_sdk::api::{Client, types::NotificationsRequest};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::default().with_token("session-token");
    /// let request = NotificationsRequest::builder().page(1).limit(20).build();
    ///
    /// let page = client.notifications(&request).await?;
    /// println!("{} unread", page.unread_count.unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn notifications(
        &self,
        request: &NotificationsRequest,
    ) -> Result<NotificationsResponse> {
        let url = self.endpoint(&["notifications"])?;
        let request = self
            .client()
            .request(Method::GET, format!("{url}{}", request.query_params()))
            .build()?;

        crate::request(&self.client, request, self.auth_headers()?).await
    }

    /// Number of notifications the signed-in user has not read.
    pub async fn unread_notification_count(&self) -> Result<UnreadCountResponse> {
        let request = self
            .client()
            .request(Method::GET, self.endpoint(&["notifications", "unread-count"])?)
            .build()?;

        crate::request(&self.client, request, self.auth_headers()?).await
    }

    /// Mark one notification as read, returning the updated notification.
    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification> {
        let request = self
            .client()
            .request(Method::PATCH, self.endpoint(&["notifications", id, "read"])?)
            .build()?;

        crate::request(&self.client, request, self.auth_headers()?).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<AckResponse> {
        let request = self
            .client()
            .request(Method::PATCH, self.endpoint(&["notifications", "read-all"])?)
            .build()?;

        crate::request(&self.client, request, self.auth_headers()?).await
    }

    pub async fn delete_notification(&self, id: &str) -> Result<AckResponse> {
        let request = self
            .client()
            .request(Method::DELETE, self.endpoint(&["notifications", id])?)
            .build()?;

        crate::request(&self.client, request, self.auth_headers()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_gains_trailing_slash() {
        let client = Client::new("https://shop.example.com/api").expect("valid host");
        assert_eq!(client.host().as_str(), "https://shop.example.com/api/");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = Client::new("https://shop.example.com/api/").expect("valid host");

        let url = client
            .endpoint(&["notifications", "a/b c", "read"])
            .expect("valid endpoint");

        assert_eq!(
            url.as_str(),
            "https://shop.example.com/api/notifications/a%2Fb%20c/read"
        );
    }

    #[test]
    fn auth_header_only_with_token() {
        let anonymous = Client::default();
        assert!(anonymous.auth_headers().expect("headers").is_none());

        let client = Client::default().with_token("abc");
        let headers = client.auth_headers().expect("headers").expect("auth header");
        let value = &headers[AUTHORIZATION];
        assert_eq!(value.to_str().expect("ascii"), "Bearer abc");
        assert!(value.is_sensitive());
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert!(Client::new("not a url").is_err());
        assert!(Client::new("mailto:shop@example.com").is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let client = Client::default().with_token("super-secret");
        assert!(!format!("{client:?}").contains("super-secret"));
    }
}
