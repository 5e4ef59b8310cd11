//! Metric algorithms for face-embedding comparison.
//!
//! Four decision geometries from the face-recognition literature:
//! Euclidean margin (triplet loss) and three angular-margin variants
//! (additive ArcFace, subtractive CosFace, multiplicative SphereFace).
//! The ensemble combines all four so no single geometric assumption
//! dominates the verdict.

use crate::types::{AlgorithmResult, Confidence, Embedding};

/// Strategy for turning a pair of embeddings into a similarity score,
/// a match decision, and a confidence label.
///
/// Implementations are deterministic and side-effect-free. Inputs are
/// assumed non-empty and equal-length; the ensemble validates this
/// before dispatching.
pub trait MetricAlgorithm {
    fn name(&self) -> &'static str;
    fn compare(&self, a: &Embedding, b: &Embedding) -> AlgorithmResult;
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Logits are divided by this before the sigmoid so the 0–100 score
/// spreads over a useful range instead of saturating.
const LOGIT_SOFTENING: f32 = 10.0;

// ---------------------------------------------------------------------------
// Triplet loss
// ---------------------------------------------------------------------------

const TRIPLET_MARGIN: f32 = 0.2;
const TRIPLET_DECAY: f32 = 2.5;
const TRIPLET_HIGH_DISTANCE: f32 = 0.30;
const TRIPLET_MEDIUM_DISTANCE: f32 = 0.50;

/// Euclidean-margin comparison on raw (unnormalized) embeddings.
///
/// Similarity decays exponentially with distance; a pair matches when
/// the distance is inside twice the training margin.
pub struct TripletLoss {
    pub margin: f32,
    pub decay_factor: f32,
}

impl Default for TripletLoss {
    fn default() -> Self {
        Self {
            margin: TRIPLET_MARGIN,
            decay_factor: TRIPLET_DECAY,
        }
    }
}

impl TripletLoss {
    pub fn new(margin: f32, decay_factor: f32) -> Self {
        Self { margin, decay_factor }
    }
}

impl MetricAlgorithm for TripletLoss {
    fn name(&self) -> &'static str {
        "triplet"
    }

    fn compare(&self, a: &Embedding, b: &Embedding) -> AlgorithmResult {
        let distance = a.euclidean_distance(b);
        let score = (-distance * self.decay_factor).exp() * 100.0;
        let matched = distance < self.margin * 2.0;
        let confidence = if distance < TRIPLET_HIGH_DISTANCE {
            Confidence::High
        } else if distance < TRIPLET_MEDIUM_DISTANCE {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        AlgorithmResult::Triplet {
            score,
            matched,
            confidence,
            distance,
        }
    }
}

// ---------------------------------------------------------------------------
// ArcFace (additive angular margin)
// ---------------------------------------------------------------------------

const ANGULAR_SCALE: f32 = 64.0;
const ARCFACE_MARGIN: f32 = 0.5; // radians
const ARCFACE_HIGH_COSINE: f32 = 0.85;
const ARCFACE_MEDIUM_COSINE: f32 = 0.70;

/// Additive angular-margin comparison: the margin is added to the angle
/// between the normalized embeddings before scoring.
///
/// The match decision deliberately uses the unmodified cosine against a
/// margin-derived threshold; only the similarity score sees the
/// margin-shifted angle.
pub struct ArcFaceLoss {
    pub scale: f32,
    pub margin: f32,
}

impl Default for ArcFaceLoss {
    fn default() -> Self {
        Self {
            scale: ANGULAR_SCALE,
            margin: ARCFACE_MARGIN,
        }
    }
}

impl ArcFaceLoss {
    pub fn new(scale: f32, margin: f32) -> Self {
        Self { scale, margin }
    }

    /// Cosine threshold for a positive match: `cos(margin * 1.5)` (~0.73
    /// at the default margin).
    pub fn match_threshold(&self) -> f32 {
        (self.margin * 1.5).cos()
    }
}

impl MetricAlgorithm for ArcFaceLoss {
    fn name(&self) -> &'static str {
        "arcface"
    }

    fn compare(&self, a: &Embedding, b: &Embedding) -> AlgorithmResult {
        let cosine = a.normalized().dot(&b.normalized()).clamp(-1.0, 1.0);
        let angle = cosine.acos();
        let cosine_with_margin = (angle + self.margin).cos();
        let logit = self.scale * cosine_with_margin;
        let score = sigmoid(logit / LOGIT_SOFTENING) * 100.0;

        let matched = cosine > self.match_threshold();
        let confidence = if cosine > ARCFACE_HIGH_COSINE {
            Confidence::High
        } else if cosine > ARCFACE_MEDIUM_COSINE {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        AlgorithmResult::ArcFace {
            score,
            matched,
            confidence,
            cosine,
            angle_degrees: angle.to_degrees(),
        }
    }
}

// ---------------------------------------------------------------------------
// CosFace (subtractive cosine margin)
// ---------------------------------------------------------------------------

const COSFACE_MARGIN: f32 = 0.35;
const COSFACE_HIGH_COSINE: f32 = 0.90;
const COSFACE_MEDIUM_COSINE: f32 = 0.75;

/// Subtractive cosine-margin comparison: the margin is subtracted from
/// the cosine directly, skipping the angle domain.
pub struct CosFaceLoss {
    pub scale: f32,
    pub margin: f32,
}

impl Default for CosFaceLoss {
    fn default() -> Self {
        Self {
            scale: ANGULAR_SCALE,
            margin: COSFACE_MARGIN,
        }
    }
}

impl CosFaceLoss {
    pub fn new(scale: f32, margin: f32) -> Self {
        Self { scale, margin }
    }

    /// Cosine threshold for a positive match: `0.5 + margin` (~0.85 at
    /// the default margin).
    pub fn match_threshold(&self) -> f32 {
        0.5 + self.margin
    }
}

impl MetricAlgorithm for CosFaceLoss {
    fn name(&self) -> &'static str {
        "cosface"
    }

    fn compare(&self, a: &Embedding, b: &Embedding) -> AlgorithmResult {
        let cosine = a.normalized().dot(&b.normalized());
        let cosine_with_margin = cosine - self.margin;
        let logit = self.scale * cosine_with_margin;
        let score = sigmoid(logit / LOGIT_SOFTENING) * 100.0;

        let matched = cosine > self.match_threshold();
        let confidence = if cosine > COSFACE_HIGH_COSINE {
            Confidence::High
        } else if cosine > COSFACE_MEDIUM_COSINE {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        AlgorithmResult::CosFace {
            score,
            matched,
            confidence,
            cosine,
        }
    }
}

// ---------------------------------------------------------------------------
// SphereFace (multiplicative angular margin)
// ---------------------------------------------------------------------------

const SPHEREFACE_MARGIN: f32 = 1.35; // multiplicative
const SPHEREFACE_HIGH_COSINE: f32 = 0.85;
const SPHEREFACE_MEDIUM_COSINE: f32 = 0.70;

/// Multiplicative angular-margin comparison: the angle between the
/// normalized embeddings is multiplied by the margin before scoring.
pub struct SphereFaceLoss {
    pub scale: f32,
    pub margin: f32,
}

impl Default for SphereFaceLoss {
    fn default() -> Self {
        Self {
            scale: ANGULAR_SCALE,
            margin: SPHEREFACE_MARGIN,
        }
    }
}

impl SphereFaceLoss {
    pub fn new(scale: f32, margin: f32) -> Self {
        Self { scale, margin }
    }

    /// Cosine threshold for a positive match: `cos(π/4 * margin)` (~0.49
    /// at the default margin).
    pub fn match_threshold(&self) -> f32 {
        (std::f32::consts::FRAC_PI_4 * self.margin).cos()
    }
}

impl MetricAlgorithm for SphereFaceLoss {
    fn name(&self) -> &'static str {
        "sphereface"
    }

    fn compare(&self, a: &Embedding, b: &Embedding) -> AlgorithmResult {
        let cosine = a.normalized().dot(&b.normalized());
        let angle = cosine.clamp(-1.0, 1.0).acos();
        let cosine_with_margin = (angle * self.margin).cos();
        let logit = self.scale * cosine_with_margin;
        let score = sigmoid(logit / LOGIT_SOFTENING) * 100.0;

        let matched = cosine > self.match_threshold();
        let confidence = if cosine > SPHEREFACE_HIGH_COSINE {
            Confidence::High
        } else if cosine > SPHEREFACE_MEDIUM_COSINE {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        AlgorithmResult::SphereFace {
            score,
            matched,
            confidence,
            cosine,
            angle_degrees: angle.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_triplet_identical_embeddings() {
        let a = emb(&[0.4, -0.2, 0.9, 0.1]);
        let r = TripletLoss::default().compare(&a, &a);
        match r {
            AlgorithmResult::Triplet {
                score,
                matched,
                confidence,
                distance,
            } => {
                assert_eq!(distance, 0.0);
                assert!((score - 100.0).abs() < 1e-4);
                assert!(matched);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_triplet_score_decays_with_distance() {
        let a = emb(&[0.0, 0.0]);
        let near = emb(&[0.1, 0.0]);
        let far = emb(&[1.0, 0.0]);
        let triplet = TripletLoss::default();
        let r_near = triplet.compare(&a, &near);
        let r_far = triplet.compare(&a, &far);
        assert!(r_near.score() > r_far.score());
    }

    #[test]
    fn test_triplet_match_boundary() {
        // Default margin 0.2 → match iff distance < 0.4
        let a = emb(&[0.0, 0.0]);
        let inside = emb(&[0.39, 0.0]);
        let outside = emb(&[0.41, 0.0]);
        let triplet = TripletLoss::default();
        assert!(triplet.compare(&a, &inside).matched());
        assert!(!triplet.compare(&a, &outside).matched());
    }

    #[test]
    fn test_triplet_confidence_bands() {
        let a = emb(&[0.0, 0.0]);
        let triplet = TripletLoss::default();
        assert_eq!(
            triplet.compare(&a, &emb(&[0.29, 0.0])).confidence(),
            Confidence::High
        );
        assert_eq!(
            triplet.compare(&a, &emb(&[0.45, 0.0])).confidence(),
            Confidence::Medium
        );
        assert_eq!(
            triplet.compare(&a, &emb(&[0.8, 0.0])).confidence(),
            Confidence::Low
        );
    }

    #[test]
    fn test_arcface_identical_embeddings() {
        let a = emb(&[0.3, 0.7, -0.1]);
        let r = ArcFaceLoss::default().compare(&a, &a);
        match r {
            AlgorithmResult::ArcFace {
                matched,
                confidence,
                cosine,
                angle_degrees,
                ..
            } => {
                assert!((cosine - 1.0).abs() < 1e-5);
                assert!(angle_degrees.abs() < 0.5);
                assert!(matched);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_arcface_opposite_embeddings() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[-1.0, 0.0]);
        let r = ArcFaceLoss::default().compare(&a, &b);
        match r {
            AlgorithmResult::ArcFace { matched, cosine, .. } => {
                assert!((cosine + 1.0).abs() < 1e-5);
                assert!(!matched);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_arcface_match_uses_unmargined_cosine() {
        // Threshold is cos(0.75) ≈ 0.7317. A pair with cosine ~0.80 must
        // match even though the margin-shifted angle is far wider.
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.8, 0.6]); // unit vector, cosine 0.8
        let r = ArcFaceLoss::default().compare(&a, &b);
        assert!(r.matched());
    }

    #[test]
    fn test_arcface_scale_ignores_raw_magnitude() {
        // Normalization makes comparison magnitude-invariant.
        let a = emb(&[2.0, 0.0]);
        let b = emb(&[0.001, 0.0]);
        let r = ArcFaceLoss::default().compare(&a, &b);
        match r {
            AlgorithmResult::ArcFace { cosine, .. } => {
                assert!((cosine - 1.0).abs() < 1e-5)
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_cosface_identical_embeddings() {
        let a = emb(&[0.5, 0.5, 0.5]);
        let r = CosFaceLoss::default().compare(&a, &a);
        match r {
            AlgorithmResult::CosFace {
                matched,
                confidence,
                cosine,
                ..
            } => {
                assert!((cosine - 1.0).abs() < 1e-5);
                assert!(matched);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_cosface_match_threshold() {
        // Threshold 0.5 + 0.35 = 0.85 on the unmargined cosine.
        let a = emb(&[1.0, 0.0]);
        let above = emb(&[0.9, (1.0f32 - 0.81).sqrt()]); // cosine 0.9
        let below = emb(&[0.8, 0.6]); // cosine 0.8
        let cosface = CosFaceLoss::default();
        assert!(cosface.compare(&a, &above).matched());
        assert!(!cosface.compare(&a, &below).matched());
    }

    #[test]
    fn test_sphereface_identical_embeddings() {
        let a = emb(&[0.1, -0.9, 0.4]);
        let r = SphereFaceLoss::default().compare(&a, &a);
        match r {
            AlgorithmResult::SphereFace {
                matched,
                confidence,
                cosine,
                angle_degrees,
                ..
            } => {
                assert!((cosine - 1.0).abs() < 1e-5);
                assert!(angle_degrees.abs() < 0.5);
                assert!(matched);
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_sphereface_opposite_no_match() {
        let a = emb(&[0.0, 1.0]);
        let b = emb(&[0.0, -1.0]);
        let r = SphereFaceLoss::default().compare(&a, &b);
        assert!(!r.matched());
        assert_eq!(r.confidence(), Confidence::Low);
    }

    #[test]
    fn test_all_scores_within_scale() {
        let a = emb(&[0.6, -0.3, 0.1, 0.7]);
        let b = emb(&[-0.2, 0.8, 0.4, -0.5]);
        let algorithms: Vec<Box<dyn MetricAlgorithm>> = vec![
            Box::new(TripletLoss::default()),
            Box::new(ArcFaceLoss::default()),
            Box::new(CosFaceLoss::default()),
            Box::new(SphereFaceLoss::default()),
        ];
        for alg in &algorithms {
            let r = alg.compare(&a, &b);
            let s = r.score();
            assert!((0.0..=100.0).contains(&s), "{}: score {s}", alg.name());
        }
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }
}
