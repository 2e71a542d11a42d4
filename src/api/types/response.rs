use bon::Builder;
use serde::Deserialize;

use crate::models::Notification;

/// A page of notifications.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, PartialEq, Builder)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub pagination: Option<Pagination>,
    /// Unread notifications across all pages
    pub unread_count: Option<u64>,
}

/// Paging metadata returned alongside list responses.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Builder)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    /// Total number of items across all pages
    pub total: u64,
    pub pages: u32,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Builder)]
pub struct UnreadCountResponse {
    #[serde(alias = "unreadCount")]
    pub count: u64,
}

/// Acknowledgement returned by mutating endpoints.
///
/// Endpoints answering with an empty body (for example `204 No Content`)
/// produce an acknowledgement with every field unset.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Builder)]
#[builder(on(String, into))]
pub struct AckResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
}
