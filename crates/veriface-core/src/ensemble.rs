//! Weighted vote-based ensemble over the four metric algorithms.
//!
//! Each comparison runs every algorithm on the same embedding pair,
//! fuses the scores through the current weight vector, and gates the
//! final verdict on score, vote count, and score agreement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{ArcFaceLoss, CosFaceLoss, MetricAlgorithm, SphereFaceLoss, TripletLoss};
use crate::types::{AlgorithmResult, Confidence, Embedding};

// Default fusion weights. ArcFace carries the most weight as the
// empirically most discriminative of the four.
const DEFAULT_WEIGHTS: EnsembleWeights = EnsembleWeights {
    triplet: 0.20,
    arcface: 0.40,
    cosface: 0.25,
    sphereface: 0.15,
};
// Weight profiles for degraded capture quality: lean harder on ArcFace
// when the image quality score drops.
const LOW_QUALITY_WEIGHTS: EnsembleWeights = EnsembleWeights {
    triplet: 0.15,
    arcface: 0.55,
    cosface: 0.20,
    sphereface: 0.10,
};
const MEDIUM_QUALITY_WEIGHTS: EnsembleWeights = EnsembleWeights {
    triplet: 0.18,
    arcface: 0.45,
    cosface: 0.25,
    sphereface: 0.12,
};

const LOW_QUALITY_CUTOFF: f32 = 40.0;
const MEDIUM_QUALITY_CUTOFF: f32 = 70.0;

// Confidence gates: agreement (stddev), fused score, and vote floor.
const HIGH_CONFIDENCE_STDDEV: f32 = 8.0;
const HIGH_CONFIDENCE_SCORE: f32 = 75.0;
const HIGH_CONFIDENCE_VOTES: u32 = 3;
const MEDIUM_CONFIDENCE_STDDEV: f32 = 15.0;
const MEDIUM_CONFIDENCE_SCORE: f32 = 60.0;
const MEDIUM_CONFIDENCE_VOTES: u32 = 2;

// Score thresholds per confidence tier. The Low tier's 50 can never
// accept on its own (the final gate rejects low confidence outright)
// but is kept in the stats for callers that surface it.
const HIGH_CONFIDENCE_THRESHOLD: f32 = 70.0;
const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 60.0;
const LOW_CONFIDENCE_THRESHOLD: f32 = 50.0;

const MIN_VOTES_TO_PASS: u32 = 2;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("embedding is empty — extraction must produce a non-empty vector")]
    EmptyEmbedding,
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Per-algorithm fusion weights. Components sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub triplet: f32,
    pub arcface: f32,
    pub cosface: f32,
    pub sphereface: f32,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl EnsembleWeights {
    pub fn sum(&self) -> f32 {
        self.triplet + self.arcface + self.cosface + self.sphereface
    }
}

/// Diagnostic statistics attached to every ensemble verdict.
///
/// `agreement_count` mirrors `votes` and `adaptive_threshold` mirrors
/// `threshold`; both aliases are part of the result contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleStats {
    pub weighted_score: f32,
    pub votes: u32,
    pub variance: f32,
    pub std_dev: f32,
    pub threshold: f32,
    pub agreement_count: u32,
    pub adaptive_threshold: f32,
}

/// Aggregate verdict for one embedding pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub passed: bool,
    /// Weighted fusion score, rounded to the nearest integer.
    pub score: f32,
    pub confidence: Confidence,
    pub algorithms: Vec<AlgorithmResult>,
    pub stats: EnsembleStats,
}

/// Vote-based verifier combining TripletLoss, ArcFace, CosFace and
/// SphereFace into one decision.
///
/// The only mutable state is the weight vector, adjusted through
/// [`adjust_weights_for_quality`](Self::adjust_weights_for_quality).
/// Instances are cheap; callers that need different weight profiles
/// concurrently should construct one verifier per session rather than
/// share a single instance.
pub struct EnsembleVerifier {
    triplet: TripletLoss,
    arcface: ArcFaceLoss,
    cosface: CosFaceLoss,
    sphereface: SphereFaceLoss,
    weights: EnsembleWeights,
}

impl Default for EnsembleVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleVerifier {
    pub fn new() -> Self {
        Self {
            triplet: TripletLoss::default(),
            arcface: ArcFaceLoss::default(),
            cosface: CosFaceLoss::default(),
            sphereface: SphereFaceLoss::default(),
            weights: EnsembleWeights::default(),
        }
    }

    pub fn weights(&self) -> EnsembleWeights {
        self.weights
    }

    /// Re-balance fusion weights for the measured capture quality
    /// (0–100). When a separate document-photo quality is supplied the
    /// two are averaged.
    pub fn adjust_weights_for_quality(&mut self, quality: f32, document_quality: Option<f32>) {
        let average = match document_quality {
            Some(doc) => (quality + doc) / 2.0,
            None => quality,
        };

        self.weights = if average < LOW_QUALITY_CUTOFF {
            LOW_QUALITY_WEIGHTS
        } else if average < MEDIUM_QUALITY_CUTOFF {
            MEDIUM_QUALITY_WEIGHTS
        } else {
            DEFAULT_WEIGHTS
        };

        tracing::debug!(
            quality = average,
            triplet = self.weights.triplet,
            arcface = self.weights.arcface,
            cosface = self.weights.cosface,
            sphereface = self.weights.sphereface,
            "ensemble weights adjusted for capture quality"
        );
    }

    /// Compare two embeddings and return the fused verdict.
    ///
    /// Fails fast on empty or unequal-length inputs; truncation would
    /// silently change every downstream score.
    pub fn compare(&self, a: &Embedding, b: &Embedding) -> Result<EnsembleResult, VerifyError> {
        if a.is_empty() || b.is_empty() {
            return Err(VerifyError::EmptyEmbedding);
        }
        if a.len() != b.len() {
            return Err(VerifyError::DimensionMismatch {
                left: a.len(),
                right: b.len(),
            });
        }

        let results = vec![
            self.triplet.compare(a, b),
            self.arcface.compare(a, b),
            self.cosface.compare(a, b),
            self.sphereface.compare(a, b),
        ];
        let weights = [
            self.weights.triplet,
            self.weights.arcface,
            self.weights.cosface,
            self.weights.sphereface,
        ];

        let weighted_score: f32 = results
            .iter()
            .zip(weights.iter())
            .map(|(r, w)| r.score() * w)
            .sum();

        let votes = results.iter().filter(|r| r.matched()).count() as u32;

        let variance: f32 = results
            .iter()
            .map(|r| (r.score() - weighted_score).powi(2))
            .sum::<f32>()
            / results.len() as f32;
        let std_dev = variance.sqrt();

        let confidence = if std_dev < HIGH_CONFIDENCE_STDDEV
            && weighted_score > HIGH_CONFIDENCE_SCORE
            && votes >= HIGH_CONFIDENCE_VOTES
        {
            Confidence::High
        } else if std_dev < MEDIUM_CONFIDENCE_STDDEV
            && weighted_score > MEDIUM_CONFIDENCE_SCORE
            && votes >= MEDIUM_CONFIDENCE_VOTES
        {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let threshold = match confidence {
            Confidence::High => HIGH_CONFIDENCE_THRESHOLD,
            Confidence::Medium => MEDIUM_CONFIDENCE_THRESHOLD,
            Confidence::Low => LOW_CONFIDENCE_THRESHOLD,
        };

        let passed = weighted_score >= threshold
            && votes >= MIN_VOTES_TO_PASS
            && confidence != Confidence::Low;

        tracing::debug!(
            score = weighted_score,
            votes,
            std_dev,
            ?confidence,
            threshold,
            passed,
            "ensemble verdict"
        );

        Ok(EnsembleResult {
            passed,
            score: weighted_score.round(),
            confidence,
            algorithms: results,
            stats: EnsembleStats {
                weighted_score,
                votes,
                variance,
                std_dev,
                threshold,
                agreement_count: votes,
                adaptive_threshold: threshold,
            },
        })
    }
}
