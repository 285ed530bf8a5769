//! Source records for ingestion.
//!
//! A [`ClubRecord`] is one raw entry from the club directory file. It is
//! turned into a [`Record`] by filling a fixed sentence template with its
//! structured fields; the structured fields themselves are preserved
//! verbatim as metadata and returned alongside search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One club as it appears in the source records file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubRecord {
    /// Stable identifier
    pub id: String,
    /// Club name
    pub name: String,
    /// Municipality the club operates in
    pub municipality: String,
    /// Age range served (e.g., "7-12")
    pub agerange: String,
    /// Activity category (e.g., "sports", "music")
    pub category: String,
    /// Neighbourhood or area
    #[serde(default)]
    pub area: String,
    /// Main activity description
    #[serde(default)]
    pub activity: String,
    /// Club homepage
    #[serde(default)]
    pub url: String,
}

impl ClubRecord {
    /// Render the embeddable content sentence for this club.
    pub fn content(&self) -> String {
        format!(
            "{} is located in {}. It caters to ages {} and focuses on {} activities.",
            self.name, self.municipality, self.agerange, self.category
        )
    }

    /// Convert into an immutable [`Record`] ready for embedding.
    pub fn into_record(self) -> Record {
        let content = self.content();
        let mut metadata = Map::new();
        metadata.insert("id".into(), Value::String(self.id.clone()));
        metadata.insert("name".into(), Value::String(self.name));
        metadata.insert("url".into(), Value::String(self.url));
        metadata.insert("municipality".into(), Value::String(self.municipality));
        metadata.insert("agerange".into(), Value::String(self.agerange));
        metadata.insert("area".into(), Value::String(self.area));
        metadata.insert("category".into(), Value::String(self.category));
        metadata.insert("activity".into(), Value::String(self.activity));

        Record {
            id: self.id,
            content,
            metadata,
        }
    }
}

/// A source item ready to embed: identifier, rendered content, and the
/// original structured fields as metadata. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, unique within the batch
    pub id: String,
    /// Free-text content derived from the structured fields
    pub content: String,
    /// Arbitrary key/value metadata, preserved verbatim
    pub metadata: Map<String, Value>,
}

impl Record {
    /// Create a record directly (tests and non-club sources).
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}
