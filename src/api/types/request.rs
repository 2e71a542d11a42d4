use bon::Builder;
use serde::Serialize;

/// Query for a page of the signed-in user's notifications.
///
/// # Example
///
/// ```
/// use storefront_client_sdk::api::types::NotificationsRequest;
///
/// let request = NotificationsRequest::builder()
///     .page(2)
///     .limit(20)
///     .unread_only(true)
///     .build();
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsRequest {
    /// 1-indexed page number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Only return notifications that have not been read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToQueryParams as _;

    #[test]
    fn empty_request_has_no_query() {
        assert_eq!(NotificationsRequest::default().query_params(), "");
    }

    #[test]
    fn query_uses_camel_case_names() {
        let request = NotificationsRequest::builder()
            .page(3)
            .limit(10)
            .unread_only(true)
            .build();

        assert_eq!(request.query_params(), "?page=3&limit=10&unreadOnly=true");
    }
}
