//! The typed message channel between the sandbox and the host.
//!
//! Messages serialize as `{"type": "elementSelected", ...}` with camelCase
//! payloads so a JavaScript host can exchange the same JSON.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use webcraft_dom::NodeId;

/// Computed style values reported with a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSnapshot {
    pub width: String,
    pub height: String,
    pub margin: String,
    pub padding: String,
    pub font_size: String,
    pub font_family: String,
    pub color: String,
    pub background_color: String,
    pub display: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub node: NodeId,
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
    #[serde(rename = "computedStyles")]
    pub styles: StyleSnapshot,
}

/// Basic identity of a right-clicked element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub node: NodeId,
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub node: NodeId,
    pub tag_name: String,
    pub old_content: String,
    pub new_content: String,
}

/// Every message the sandbox may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SandboxMessage {
    ElementSelected {
        element: ElementInfo,
    },
    /// `element` is absent for structural changes such as drops.
    ContentChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element: Option<TextEdit>,
    },
    #[serde(rename_all = "camelCase")]
    ChangeImage {
        target: NodeId,
        current_src: String,
        width: u32,
        height: u32,
        aspect_ratio: f64,
    },
    ContextMenu {
        x: f64,
        y: f64,
        target: TargetInfo,
    },
}

impl SandboxMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxMessage::ElementSelected { .. } => "elementSelected",
            SandboxMessage::ContentChanged { .. } => "contentChanged",
            SandboxMessage::ChangeImage { .. } => "changeImage",
            SandboxMessage::ContextMenu { .. } => "contextMenu",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Sandbox end of the channel.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<SandboxMessage>,
}

impl MessageSender {
    /// Post a message. Returns false once the host end is gone.
    pub fn send(&self, message: SandboxMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Host end of the channel.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<SandboxMessage>,
}

impl MessageReceiver {
    pub fn try_recv(&mut self) -> Option<SandboxMessage> {
        self.rx.try_recv().ok()
    }

    /// Everything queued so far, in send order.
    pub fn drain(&mut self) -> Vec<SandboxMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub async fn recv(&mut self) -> Option<SandboxMessage> {
        self.rx.recv().await
    }
}

pub fn channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessageSender { tx }, MessageReceiver { rx })
}
