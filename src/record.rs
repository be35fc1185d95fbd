use serde::Serialize;

/// A creator folded into a single name field, the shape the record sink
/// expects for chat participants.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Creator {
    pub name: String,
    #[serde(rename = "fieldMode")]
    pub field_mode: u8,
    #[serde(rename = "creatorType")]
    pub creator_type: String,
}

impl Creator {
    pub fn single_field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_mode: 1,
            creator_type: "author".to_string(),
        }
    }
}

/// Either a renderable document snapshot (live or synthesized) or a URL-only
/// reference when no snapshot is obtainable.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub snapshot: bool,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn document_snapshot(url: Option<String>, document: String) -> Self {
        Self {
            title: "ChatGPT Conversation Snapshot".to_string(),
            url,
            document: Some(document),
            snapshot: true,
            mime_type: Some("application/xhtml+xml".to_string()),
        }
    }

    pub fn url_only(url: String) -> Self {
        Self {
            title: "ChatGPT Conversation Snapshot".to_string(),
            url: Some(url),
            document: None,
            snapshot: false,
            mime_type: None,
        }
    }
}

/// One complete bibliographic record. Always fully populated; the worst case
/// is a record of static defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    #[serde(rename = "itemType")]
    pub item_type: String,
    pub title: String,
    pub creators: Vec<Creator>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Record {
    pub fn instant_message() -> Self {
        Self {
            item_type: "instantMessage".to_string(),
            title: String::new(),
            creators: Vec::new(),
            date: String::new(),
            url: None,
            extra: None,
            attachments: Vec::new(),
        }
    }
}
