//! 推送数据模型
//!
//! 通知内容与收件人均由上游提供，引擎只在单次调用内使用，不做持久化。

use serde::{Deserialize, Serialize};

/// 逻辑通知
///
/// `mute` 为 true 时不展示可见提醒，但数据载荷照常下发，供客户端静默处理。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// 通知类型标签
    #[serde(rename = "type")]
    pub notification_type: String,
    /// 事件标签
    pub event: String,
    #[serde(default)]
    pub mute: bool,
    /// 自定义数据，原样序列化进推送载荷
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// 富文本内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub raw: String,
    pub rendered: String,
}

impl RichText {
    /// 推送正文优先使用渲染后的文本，缺失时回退到原文
    pub fn display_text(&self) -> &str {
        if self.rendered.is_empty() {
            &self.raw
        } else {
            &self.rendered
        }
    }
}

/// 通知消息：标题与正文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub content: RichText,
}

/// 收件人设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub device_token: String,
    pub allow_notification: bool,
}

impl Recipient {
    pub fn new(device_token: impl Into<String>, allow_notification: bool) -> Self {
        Self {
            device_token: device_token.into(),
            allow_notification,
        }
    }

    /// 允许通知且令牌非空
    pub fn is_eligible(&self) -> bool {
        self.allow_notification && !self.device_token.is_empty()
    }
}

/// 按输入顺序筛出合格收件人的令牌
pub fn eligible_tokens(recipients: &[Recipient]) -> Vec<String> {
    recipients
        .iter()
        .filter(|r| r.is_eligible())
        .map(|r| r.device_token.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_tokens_filters_and_keeps_order() {
        let recipients = vec![
            Recipient::new("a", true),
            Recipient::new("b", false),
            Recipient::new("", true),
            Recipient::new("c", true),
        ];

        assert_eq!(eligible_tokens(&recipients), vec!["a", "c"]);
    }

    #[test]
    fn test_display_text_falls_back_to_raw() {
        let content = RichText {
            raw: "plain".to_string(),
            rendered: String::new(),
        };
        assert_eq!(content.display_text(), "plain");

        let content = RichText {
            raw: "plain".to_string(),
            rendered: "<p>plain</p>".to_string(),
        };
        assert_eq!(content.display_text(), "<p>plain</p>");
    }

    #[test]
    fn test_notification_deserialize() {
        let json = serde_json::json!({
            "id": "notif-001",
            "type": "NOTIFICATION_TYPE_COMPOSED",
            "event": "EVENT_NEW",
            "data": { "lesson_id": 42 }
        });

        let notification: Notification =
            serde_json::from_value(json).expect("反序列化通知失败");
        assert_eq!(notification.id, "notif-001");
        assert_eq!(notification.notification_type, "NOTIFICATION_TYPE_COMPOSED");
        assert!(!notification.mute);
        assert_eq!(notification.data["lesson_id"], 42);
    }
}
