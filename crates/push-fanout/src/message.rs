//! 推送消息构建
//!
//! 由通知和通知消息生成网关可直接发送的载荷。单播与组播共用同一套
//! 内容构建逻辑，区别只在于目标是一个令牌还是一组令牌。

use std::collections::HashMap;

use push_shared::config::PushConfig;
use serde::Serialize;

use crate::model::{Notification, NotificationMessage};

pub const DATA_KEY_NOTIFICATION_ID: &str = "notification_id";
pub const DATA_KEY_TYPE: &str = "type";
pub const DATA_KEY_EVENT: &str = "event";
pub const DATA_KEY_DATA: &str = "data";
pub const DATA_KEY_CLICK_ACTION: &str = "click_action";

const ELLIPSIS: &str = "...";

/// 可见提醒块
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertBlock {
    pub title: String,
    pub body: String,
}

/// 推送内容
///
/// `notification` 为 None 时是静默推送，只下发数据载荷。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<AlertBlock>,
    pub data: HashMap<String, String>,
}

/// 单播消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleMessage {
    pub token: String,
    #[serde(flatten)]
    pub content: PushContent,
}

/// 组播消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    #[serde(flatten)]
    pub content: PushContent,
}

/// 推送消息构建器
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    character_length_max: usize,
    click_action: String,
}

impl MessageBuilder {
    pub fn new(character_length_max: usize, click_action: impl Into<String>) -> Self {
        Self {
            character_length_max,
            click_action: click_action.into(),
        }
    }

    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.character_length_max, config.click_action.clone())
    }

    /// 构建推送内容
    pub fn build_content(
        &self,
        notification: &Notification,
        message: &NotificationMessage,
    ) -> PushContent {
        let alert = (!notification.mute).then(|| {
            let (title, body) = self.cap_lengths(&message.title, message.content.display_text());
            AlertBlock { title, body }
        });

        PushContent {
            notification: alert,
            data: self.build_data(notification),
        }
    }

    pub fn build_single(
        &self,
        notification: &Notification,
        message: &NotificationMessage,
        token: impl Into<String>,
    ) -> SingleMessage {
        SingleMessage {
            token: token.into(),
            content: self.build_content(notification, message),
        }
    }

    pub fn build_multicast(
        &self,
        notification: &Notification,
        message: &NotificationMessage,
        tokens: Vec<String>,
    ) -> MulticastMessage {
        MulticastMessage {
            tokens,
            content: self.build_content(notification, message),
        }
    }

    fn build_data(&self, notification: &Notification) -> HashMap<String, String> {
        // Value 的 Display 不会失败，省去 to_string 的 Result
        let custom = serde_json::Value::Object(notification.data.clone()).to_string();

        HashMap::from([
            (DATA_KEY_NOTIFICATION_ID.to_string(), notification.id.clone()),
            (
                DATA_KEY_TYPE.to_string(),
                notification.notification_type.clone(),
            ),
            (DATA_KEY_EVENT.to_string(), notification.event.clone()),
            (DATA_KEY_DATA.to_string(), custom),
            (DATA_KEY_CLICK_ACTION.to_string(), self.click_action.clone()),
        ])
    }

    /// 标题 + 正文总长超过上限时，各自超过半数上限的字段截断为
    /// (半数上限 - 3) 个字符并追加省略号
    ///
    /// 两个字段各自与半数上限比较，不会把一方剩余的额度让给另一方。
    fn cap_lengths(&self, title: &str, body: &str) -> (String, String) {
        let title_len = title.chars().count();
        let body_len = body.chars().count();

        if title_len + body_len <= self.character_length_max {
            return (title.to_string(), body.to_string());
        }

        let half = self.character_length_max / 2;
        (
            truncate_field(title, title_len, half),
            truncate_field(body, body_len, half),
        )
    }
}

fn truncate_field(value: &str, len: usize, half: usize) -> String {
    if len <= half {
        return value.to_string();
    }
    let keep = half.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
