use serde::ser::{Serialize, SerializeMap, Serializer};

/// Dermatological categories, in the order every model output follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkinClass {
    Melanoma,
    MelanocyticNevus,
    BasalCellCarcinoma,
    ActinicKeratosis,
    BenignKeratosis,
    Dermatofibroma,
    VascularLesion,
    SquamousCellCarcinoma,
}

pub const NUM_CLASSES: usize = 8;

impl SkinClass {
    pub const ALL: [SkinClass; NUM_CLASSES] = [
        SkinClass::Melanoma,
        SkinClass::MelanocyticNevus,
        SkinClass::BasalCellCarcinoma,
        SkinClass::ActinicKeratosis,
        SkinClass::BenignKeratosis,
        SkinClass::Dermatofibroma,
        SkinClass::VascularLesion,
        SkinClass::SquamousCellCarcinoma,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SkinClass::Melanoma => "Melanoma",
            SkinClass::MelanocyticNevus => "Melanocytic Nevus",
            SkinClass::BasalCellCarcinoma => "Basal Cell Carcinoma",
            SkinClass::ActinicKeratosis => "Actinic Keratosis",
            SkinClass::BenignKeratosis => "Benign Keratosis",
            SkinClass::Dermatofibroma => "Dermatofibroma",
            SkinClass::VascularLesion => "Vascular Lesion",
            SkinClass::SquamousCellCarcinoma => "Squamous Cell Carcinoma",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Tolerance for "sums to one".
pub const SUM_TOLERANCE: f64 = 1e-3;

/// One probability per [`SkinClass`], indexed in class order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities([f64; NUM_CLASSES]);

impl ClassProbabilities {
    /// Takes scores that are already a distribution, rounded to `decimals` places.
    pub fn from_distribution(values: [f64; NUM_CLASSES], decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        ClassProbabilities(values.map(|p| (p * scale).round() / scale))
    }

    /// Turns raw network scores into a distribution.
    ///
    /// Scores that are already non-negative and sum to one are kept as they are,
    /// anything else is treated as logits and run through a softmax.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.len() != NUM_CLASSES || scores.iter().any(|s| !s.is_finite()) {
            return None;
        }

        let mut values = [0f64; NUM_CLASSES];
        for (slot, &score) in values.iter_mut().zip(scores) {
            *slot = f64::from(score);
        }

        let sum: f64 = values.iter().sum();
        let is_distribution =
            values.iter().all(|&p| p >= 0.0) && (sum - 1.0).abs() <= SUM_TOLERANCE;
        if is_distribution {
            return Some(ClassProbabilities(values));
        }

        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps = values.map(|v| (v - max).exp());
        let total: f64 = exps.iter().sum();
        Some(ClassProbabilities(exps.map(|e| e / total)))
    }

    pub fn get(&self, class: SkinClass) -> f64 {
        self.0[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkinClass, f64)> + '_ {
        SkinClass::ALL.iter().map(move |&class| (class, self.get(class)))
    }

    #[cfg(test)]
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Highest-probability class; the earliest class in order wins a tie.
    pub fn argmax(&self) -> SkinClass {
        let mut best = SkinClass::ALL[0];
        for (class, p) in self.iter().skip(1) {
            if p > self.get(best) {
                best = class;
            }
        }
        best
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (class, p) in self.iter() {
            map.serialize_entry(class.label(), &p)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_class: SkinClass,
    pub probabilities: ClassProbabilities,
}

impl From<ClassProbabilities> for PredictionResult {
    fn from(probabilities: ClassProbabilities) -> Self {
        PredictionResult {
            predicted_class: probabilities.argmax(),
            probabilities,
        }
    }
}
