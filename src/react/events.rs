//! 编排进度事件：每次状态转换推送 (label, status, description)，以 tracking_id 关联同一次运行
//!
//! 推送是 fire-and-forget：接收端不存在或已关闭时静默丢弃，不阻塞也不影响运行。

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Complete,
    /// 组件降级（如回退计划、重排序失败），运行继续
    Degraded,
}

/// 单条进度事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub tracking_id: String,
    pub label: String,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 绑定到一次运行的推送端
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tracking_id: String,
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(tracking_id: impl Into<String>, tx: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            tx,
        }
    }

    /// 不推送任何事件
    pub fn disabled() -> Self {
        Self::new(String::new(), None)
    }

    pub fn emit(&self, label: &str, status: ProgressStatus, description: Option<String>) {
        tracing::debug!(label, ?status, description = description.as_deref().unwrap_or(""), "progress");
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                tracking_id: self.tracking_id.clone(),
                label: label.to_string(),
                status,
                description,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_delivers_with_tracking_id() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ProgressSink::new("run-1", Some(tx));
        sink.emit("Planning", ProgressStatus::Running, None);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.tracking_id, "run-1");
        assert_eq!(ev.label, "Planning");
        assert_eq!(ev.status, ProgressStatus::Running);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let sink = ProgressSink::new("run-2", Some(tx));
        sink.emit("Searching", ProgressStatus::Complete, Some("3 papers".into()));
        ProgressSink::disabled().emit("noop", ProgressStatus::Running, None);
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let ev = ProgressEvent {
            tracking_id: "t".into(),
            label: "Reviewing progress".into(),
            status: ProgressStatus::Degraded,
            description: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["status"], "degraded");
        assert!(json.get("description").is_none());
    }
}
