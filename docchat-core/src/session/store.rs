//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instruction preamble wrapped around an uploaded document when it is
/// injected as the leading system message.
const DOCUMENT_PREAMBLE: &str = "The following is the content of an uploaded file. \
Please use this information to answer the user's questions:";

/// Role of a turn in the conversation transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat-completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn role (system, user, assistant)
    pub role: Role,
    /// Turn content
    pub content: String,
    /// Turn timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Text extracted from an uploaded document, injected as a synthetic
/// leading system message. Never stored in the turn sequence itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Original file name of the upload
    pub file_name: String,
    /// Extracted text
    pub text: String,
}

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session key
    pub key: String,
    /// Turns in the session, in arrival order
    pub turns: Vec<Turn>,
    /// Document context, at most one; latest upload overwrites prior
    pub document: Option<DocumentContext>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            turns: Vec::new(),
            document: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    /// Append the fully accumulated streamed response as one assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Store or overwrite the document context
    pub fn attach_document(&mut self, file_name: impl Into<String>, text: impl Into<String>) {
        self.document = Some(DocumentContext {
            file_name: file_name.into(),
            text: text.into(),
        });
        self.updated_at = Utc::now();
    }

    /// Build the ordered turn list for a chat-completion request.
    ///
    /// If a document context is attached it becomes the first (system-role)
    /// entry, followed by all prior turns in arrival order, ending with the
    /// pending user turn. Does not mutate the session; the pending turn is
    /// only committed via [`push_user`](Self::push_user) once the exchange
    /// succeeds.
    pub fn assemble_request(&self, pending_user: &str) -> Vec<Turn> {
        let mut request = Vec::with_capacity(self.turns.len() + 2);

        if let Some(doc) = &self.document {
            request.push(Turn::new(
                Role::System,
                format!("{}\n\n{}", DOCUMENT_PREAMBLE, doc.text),
            ));
        }

        request.extend(self.turns.iter().cloned());
        request.push(Turn::new(Role::User, pending_user));
        request
    }

    /// Empty the turn sequence and discard the document context
    pub fn clear(&mut self) {
        self.turns.clear();
        self.document = None;
        self.updated_at = Utc::now();
    }

    /// True when the session holds no turns and no document
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.document.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new("cli:default");
        assert_eq!(session.key, "cli:default");
        assert!(session.turns.is_empty());
        assert!(session.document.is_none());
    }

    #[test]
    fn test_turns_keep_arrival_order() {
        let mut session = Session::new("test");
        for i in 0..5 {
            session.push_user(format!("question {}", i));
            session.push_assistant(format!("answer {}", i));
        }

        assert_eq!(session.turns.len(), 10);
        for (i, pair) in session.turns.chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[0].content, format!("question {}", i));
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("answer {}", i));
        }
    }

    #[test]
    fn test_assemble_without_document() {
        let mut session = Session::new("test");
        session.push_user("first");
        session.push_assistant("reply");

        let request = session.assemble_request("second");
        assert_eq!(request.len(), 3);
        assert_eq!(request[0].role, Role::User);
        assert_eq!(request[2].role, Role::User);
        assert_eq!(request[2].content, "second");
        // No synthetic system message without a document
        assert!(request.iter().all(|t| t.role != Role::System));
    }

    #[test]
    fn test_assemble_with_document_prepends_system() {
        let mut session = Session::new("test");
        session.attach_document("notes.txt", "quarterly revenue was up");
        session.push_user("hi");
        session.push_assistant("hello");

        let request = session.assemble_request("what changed?");
        assert_eq!(request.len(), 4);
        assert_eq!(request[0].role, Role::System);
        assert!(request[0].content.contains("quarterly revenue was up"));
        assert_eq!(request.last().unwrap().content, "what changed?");
    }

    #[test]
    fn test_assemble_does_not_mutate() {
        let mut session = Session::new("test");
        session.push_user("hi");

        let _ = session.assemble_request("pending");
        assert_eq!(session.turns.len(), 1);
    }

    #[test]
    fn test_latest_document_wins() {
        let mut session = Session::new("test");
        session.attach_document("a.txt", "old text");
        session.attach_document("b.pdf", "new text");

        let doc = session.document.as_ref().unwrap();
        assert_eq!(doc.file_name, "b.pdf");
        let request = session.assemble_request("q");
        assert_eq!(request.iter().filter(|t| t.role == Role::System).count(), 1);
        assert!(request[0].content.contains("new text"));
        assert!(!request[0].content.contains("old text"));
    }

    #[test]
    fn test_clear_drops_turns_and_document() {
        let mut session = Session::new("test");
        session.attach_document("a.txt", "text");
        session.push_user("hi");
        session.push_assistant("hello");

        session.clear();
        assert!(session.is_empty());
        let request = session.assemble_request("fresh");
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, Role::User);
    }
}
