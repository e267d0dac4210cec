use serde::{Deserialize, Serialize};

/// Metadata carried by a policy document and inherited by every chunk cut from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Path of the file the document was read from.
    pub source: String,
    /// Human-readable policy name derived from the filename, e.g. "Remote Work Policy".
    pub policy_type: String,
}

/// One loaded policy file: synthetic header plus the file content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A bounded-length slice of a `PolicyDocument`, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the chunk sequence produced for one build.
    pub ordinal: u32,
    pub text: String,
    pub metadata: DocumentMetadata,
}
