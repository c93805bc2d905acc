use serde::{Deserialize, Serialize};

/// Identity of the person in the chair, entered at startup and copied into
/// every trial row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub subject: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub run: u32,
}

impl SessionInfo {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            age: None,
            gender: None,
            run: 1,
        }
    }
}
