//! Feature vectors
//!
//! [`NormalizedPoint`] is a parsed record scaled to unit length, together with the
//! magnitude needed to reconstruct the original values and its cluster label.
//! [`AggregateSum`] is the component-wise sum of several points. It has no meaningful
//! magnitude, so it can only be added to or handed to the centroid updater; distance
//! and rendering are not defined on it.

use std::ops::Add;

use crate::{
    error::{KMeansError, Result},
    schema::{ColumnKind, FeatureCodec},
    types::{EuclideanDistance, KmeansValue, l2_norm},
};

/// Rendered value of an unassigned label
pub const UNASSIGNED: i64 = -1;

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPoint {
    components: Vec<f64>,
    magnitude: f64,
    label: Option<usize>,
}

impl NormalizedPoint {
    /// Wrap components that are already on the unit scale
    pub fn new(components: Vec<f64>, magnitude: f64) -> Self {
        Self { components, magnitude, label: None }
    }

    /// Normalize a raw vector by its Euclidean norm
    ///
    /// The all-zero vector keeps its components and gets magnitude 0.
    pub fn from_raw(mut raw: Vec<f64>) -> Self {
        let magnitude = l2_norm(&raw);
        if magnitude > 0.0 {
            raw.iter_mut().for_each(|value| *value /= magnitude);
        }
        Self { components: raw, magnitude, label: None }
    }

    /// Parse one delimited record against the schema
    ///
    /// # Errors
    /// * `MalformedRecord` if the field count differs from the schema
    /// * `UnknownToken` for a categorical token outside the dictionary
    /// * `InvalidNumericField` for a non-categorical field that is not a finite number,
    ///   or for the largest field when the magnitude of the record overflows
    pub fn parse(record: &str, codec: &FeatureCodec) -> Result<Self> {
        let line = record.trim_end_matches(['\r', '\n']);
        let tokens: Vec<&str> = line.split(codec.delimiter()).collect();
        if tokens.len() != codec.features() {
            return Err(KMeansError::MalformedRecord {
                record: line.to_string(),
                expected: codec.features(),
                found: tokens.len(),
            });
        }

        let raw = tokens.iter().enumerate().map(|(column, token)| {
            let token = token.trim();
            if codec.is_categorical(column) {
                codec.encode(column, token)
            } else {
                token.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| KMeansError::InvalidNumericField {
                        column,
                        token: token.to_string(),
                        record: line.to_string(),
                    })
            }
        }).collect::<Result<Vec<f64>>>()?;

        let largest = raw.iter().enumerate()
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .map(|(column, _)| column);
        let point = Self::from_raw(raw);
        if !point.magnitude.is_finite() {
            let column = largest.unwrap_or_default();
            return Err(KMeansError::InvalidNumericField {
                column,
                token: tokens[column].trim().to_string(),
                record: line.to_string(),
            });
        }
        Ok(point)
    }

    pub fn components(&self) -> &[f64] {
        &self.components
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn label(&self) -> Option<usize> {
        self.label
    }

    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    /// Explicit initialization of the label (centroid sampling)
    pub fn set_label(&mut self, label: usize) {
        self.label = Some(label);
    }

    /// Copy of this point carrying another label
    pub fn with_label(&self, label: Option<usize>) -> Self {
        Self { components: self.components.clone(), magnitude: self.magnitude, label }
    }

    pub(crate) fn set_components(&mut self, components: Vec<f64>) {
        self.components = components;
    }

    /// Euclidean distance between the normalized components
    pub fn distance_to(&self, other: &Self) -> Result<f64> {
        if self.dimension() != other.dimension() {
            return Err(KMeansError::DimensionMismatch { expected: self.dimension(), found: other.dimension() });
        }
        Ok(self.components.euclidean_distance(&other.components))
    }

    /// Bit-exact comparison of label, magnitude and components
    pub fn same_state(&self, other: &Self) -> bool {
        self.label == other.label
            && self.magnitude.to_bits() == other.magnitude.to_bits()
            && self.components.len() == other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Render the point on its original scale followed by its label
    ///
    /// Categorical columns are decoded back to their token, integer columns are
    /// rounded, continuous columns are printed with two decimals.
    pub fn render(&self, codec: &FeatureCodec) -> Result<String> {
        if self.dimension() != codec.features() {
            return Err(KMeansError::DimensionMismatch { expected: codec.features(), found: self.dimension() });
        }
        let delimiter = codec.delimiter().to_string();
        let mut fields = self.components.iter().enumerate().map(|(column, component)| {
            let value = component * self.magnitude;
            Ok(match codec.kind(column) {
                Some(ColumnKind::Categorical) => codec.decode(column, value)?.to_string(),
                // + 0.0 folds -0 into 0
                Some(ColumnKind::Integer) => format!("{:.0}", value.round() + 0.0),
                _ => format!("{:.2}", value),
            })
        }).collect::<Result<Vec<String>>>()?;

        fields.push(match self.label {
            Some(label) => label.to_string(),
            None => UNASSIGNED.to_string(),
        });
        Ok(fields.join(delimiter.as_str()))
    }
}

/// Component-wise sum of points
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSum {
    components: Vec<f64>,
    label: Option<usize>,
}

impl AggregateSum {
    pub fn zero(dim: usize, label: Option<usize>) -> Self {
        Self { components: <Vec<f64> as KmeansValue>::zero(dim), label }
    }

    pub fn components(&self) -> &[f64] {
        &self.components
    }

    pub fn label(&self) -> Option<usize> {
        self.label
    }

    pub fn dimension(&self) -> usize {
        self.components.len()
    }

    /// Sum with a length check; keeps the label of `self`
    pub fn try_add(self, other: &AggregateSum) -> Result<AggregateSum> {
        if self.dimension() != other.dimension() {
            return Err(KMeansError::DimensionMismatch { expected: self.dimension(), found: other.dimension() });
        }
        Ok(self + other.clone())
    }
}

impl From<&NormalizedPoint> for AggregateSum {
    fn from(point: &NormalizedPoint) -> Self {
        Self { components: point.components.clone(), label: point.label }
    }
}

impl Add for AggregateSum {
    type Output = AggregateSum;

    // lengths are expected to match, see try_add
    fn add(self, right: AggregateSum) -> AggregateSum {
        AggregateSum { components: self.components.sum_by_field(&right.components), label: self.label }
    }
}

impl Add for &NormalizedPoint {
    type Output = AggregateSum;

    fn add(self, right: &NormalizedPoint) -> AggregateSum {
        AggregateSum { components: self.components.sum_by_field(&right.components), label: self.label }
    }
}
