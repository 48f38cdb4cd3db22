//! Push message model.
//!
//! Field names follow the FCM HTTP v1 `message` resource so a message can be
//! posted as-is: `{"message": <PushMessage>}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A push message addressed to one device token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Opaque device registration token.
    pub token: String,
    pub notification: PushNotification,
    /// Key/value payload delivered to the client app. Values are strings only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

/// User-visible title and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// Android delivery hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub priority: AndroidPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<AndroidNotification>,
}

/// Message delivery priority on Android.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AndroidPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_priority: Option<NotificationPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// Display priority of the notification itself (distinct from delivery priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPriority {
    #[serde(rename = "PRIORITY_MIN")]
    Min,
    #[serde(rename = "PRIORITY_LOW")]
    Low,
    #[serde(rename = "PRIORITY_DEFAULT")]
    Default,
    #[serde(rename = "PRIORITY_HIGH")]
    High,
    #[serde(rename = "PRIORITY_MAX")]
    Max,
}

/// APNs delivery hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(rename = "content-available", default, skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}
