use serde::{Deserialize, Deserializer, Serialize};

/// Dimensionality of every face signature held by the store.
pub const SIGNATURE_DIM: usize = 128;

/// Identity metadata supplied by the caller at enrollment time.
///
/// Not validated beyond presence; it only ever lives as metadata attached
/// to signature records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub age: String,
}

/// Identity fields as they arrive from a form, any of which may be absent.
#[derive(Debug, Clone, Default)]
pub struct IdentityForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<String>,
}

impl IdentityForm {
    /// Returns the complete identity, or `None` if any field is missing.
    pub fn complete(self) -> Option<Identity> {
        Some(Identity {
            first_name: self.first_name?,
            last_name: self.last_name?,
            age: self.age?,
        })
    }
}

/// An uploaded image, as raw bytes of any supported format.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-side filename, if one was sent.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: Option<String>, data: Vec<u8>) -> Self {
        Self { filename, data }
    }
}

/// Fixed-length face signature produced by an embedding extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub values: Vec<f32>,
}

impl Signature {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Zero-norm vectors and vectors of
    /// different lengths compare as 0.0.
    pub fn similarity(&self, other: &Signature) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// Metadata persisted alongside each signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub age: String,
    /// Creation time, seconds since the Unix epoch.
    #[serde(deserialize_with = "integral")]
    pub timestamp: i64,
    /// 1-based position of the signature within its enrollment call.
    #[serde(deserialize_with = "integral")]
    pub embedding_number: i64,
}

impl RecordMetadata {
    pub fn identity(&self) -> Identity {
        Identity {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            age: self.age.clone(),
        }
    }
}

/// A signature plus its identifier and metadata, as written to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// One candidate returned by a similarity query, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    /// Store-reported similarity, kept at full precision.
    pub score: f64,
    pub metadata: RecordMetadata,
}

// Vector stores commonly hand numeric metadata back as floats.
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "expected an integral number, got {value}"
        )));
    }
    Ok(value as i64)
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}
