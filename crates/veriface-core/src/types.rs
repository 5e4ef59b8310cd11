use serde::{Deserialize, Serialize};

/// Face embedding vector (typically 512-dimensional), produced by an
/// external extraction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dot product. Iterates the shorter of the two vectors; callers that
    /// need a hard length guarantee validate up front (see
    /// [`EnsembleVerifier::compare`](crate::ensemble::EnsembleVerifier::compare)).
    pub fn dot(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Euclidean distance between two raw (unnormalized) embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// L2-normalize to unit Euclidean length.
    ///
    /// A zero vector is returned unchanged rather than producing NaN.
    /// Idempotent: normalizing an already-unit vector is a no-op up to
    /// floating-point tolerance.
    pub fn normalized(&self) -> Embedding {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Embedding {
                values: self.values.iter().map(|x| x / norm).collect(),
            }
        } else {
            self.clone()
        }
    }
}

/// Qualitative confidence label attached to every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Per-algorithm comparison outcome.
///
/// Every variant carries the common triple (similarity score on a 0–100
/// scale, match decision, confidence label) plus the diagnostics specific
/// to that algorithm's decision geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum AlgorithmResult {
    Triplet {
        score: f32,
        matched: bool,
        confidence: Confidence,
        /// Euclidean distance between the raw embeddings.
        distance: f32,
    },
    ArcFace {
        score: f32,
        matched: bool,
        confidence: Confidence,
        cosine: f32,
        angle_degrees: f32,
    },
    CosFace {
        score: f32,
        matched: bool,
        confidence: Confidence,
        cosine: f32,
    },
    SphereFace {
        score: f32,
        matched: bool,
        confidence: Confidence,
        cosine: f32,
        angle_degrees: f32,
    },
}

impl AlgorithmResult {
    pub fn score(&self) -> f32 {
        match self {
            Self::Triplet { score, .. }
            | Self::ArcFace { score, .. }
            | Self::CosFace { score, .. }
            | Self::SphereFace { score, .. } => *score,
        }
    }

    pub fn matched(&self) -> bool {
        match self {
            Self::Triplet { matched, .. }
            | Self::ArcFace { matched, .. }
            | Self::CosFace { matched, .. }
            | Self::SphereFace { matched, .. } => *matched,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Self::Triplet { confidence, .. }
            | Self::ArcFace { confidence, .. }
            | Self::CosFace { confidence, .. }
            | Self::SphereFace { confidence, .. } => *confidence,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Triplet { .. } => "triplet",
            Self::ArcFace { .. } => "arcface",
            Self::CosFace { .. } => "cosface",
            Self::SphereFace { .. } => "sphereface",
        }
    }
}
