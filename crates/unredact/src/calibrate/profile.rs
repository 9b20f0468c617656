//! The calibration profile and its JSON persistence.

use std::path::Path;

use super::reference::ReferenceObservation;
use super::search::SweepPoint;
use crate::collab::{FontDescriptor, GlyphMetrics, KerningMode};
use crate::error::{EngineError, EngineResult};
use crate::matching::predict_width;

/// Schema tag written into saved profiles.
pub const PROFILE_SCHEMA: &str = "unredact.profile.v1";

/// Document-wide rendering profile recovered from reference text.
///
/// `scale_factor` maps unit-scale glyph widths onto working-raster pixels
/// at `working_ppi`; `tracking_offset_px` is extra space between adjacent
/// characters, also in working pixels.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProfile {
    pub font: FontDescriptor,
    pub scale_factor: f64,
    pub tracking_offset_px: f64,
    pub kerning_mode: KerningMode,
    /// `1 - min(cv, 1)`, in [0, 1].
    pub confidence: f64,
    pub reference_text: String,
    pub working_ppi: f32,
    pub coefficient_of_variation: f64,
    pub sample_count: usize,
}

#[derive(serde::Serialize)]
struct ProfileFileOut<'a> {
    schema: &'a str,
    #[serde(flatten)]
    profile: &'a CalibrationProfile,
}

#[derive(serde::Deserialize)]
struct ProfileFileIn {
    schema: String,
    #[serde(flatten)]
    profile: CalibrationProfile,
}

/// Observed vs predicted width for one reference word.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceFit {
    pub text: String,
    pub observed_width_px: u32,
    pub predicted_width_px: f64,
    /// `predicted - observed`.
    pub error_px: f64,
    /// `|error_px| / observed * 100`.
    pub error_pct: f64,
}

impl CalibrationProfile {
    pub(crate) fn from_point(point: &SweepPoint, working_ppi: f32) -> Self {
        Self {
            font: point.font.clone(),
            scale_factor: point.mean_scale,
            tracking_offset_px: point.tracking_offset_px,
            kerning_mode: point.kerning_mode,
            confidence: 1.0 - point.coefficient_of_variation.min(1.0),
            reference_text: point.reference_text.clone(),
            working_ppi,
            coefficient_of_variation: point.coefficient_of_variation,
            sample_count: point.sample_count,
        }
    }

    /// Check the profile invariants (positive scale, confidence in [0, 1],
    /// positive resolution).
    pub fn check(&self) -> EngineResult<()> {
        if !(self.scale_factor > 0.0) || !self.scale_factor.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "profile scale_factor must be positive, got {}",
                self.scale_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::InvalidConfig(format!(
                "profile confidence must be in [0, 1], got {}",
                self.confidence
            )));
        }
        if !(self.working_ppi > 0.0) || !self.working_ppi.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "profile working_ppi must be positive, got {}",
                self.working_ppi
            )));
        }
        if !self.tracking_offset_px.is_finite() {
            return Err(EngineError::InvalidConfig(
                "profile tracking_offset_px must be finite".into(),
            ));
        }
        Ok(())
    }

    /// The same profile expressed for a working raster at `ppi`.
    pub fn at_ppi(&self, ppi: f32) -> Self {
        let k = ppi as f64 / self.working_ppi as f64;
        if !k.is_finite() || k <= 0.0 || (k - 1.0).abs() < 1e-12 {
            return self.clone();
        }
        Self {
            scale_factor: self.scale_factor * k,
            tracking_offset_px: self.tracking_offset_px * k,
            working_ppi: ppi,
            ..self.clone()
        }
    }

    /// Predicted vs observed width for each reference word.
    pub fn validate(
        &self,
        references: &[ReferenceObservation],
        metrics: &dyn GlyphMetrics,
    ) -> Vec<ReferenceFit> {
        references
            .iter()
            .filter(|r| r.width > 0)
            .map(|r| {
                let predicted = predict_width(self, metrics, r.measured_text());
                let error_px = predicted - r.width as f64;
                ReferenceFit {
                    text: r.measured_text().to_string(),
                    observed_width_px: r.width,
                    predicted_width_px: predicted,
                    error_px,
                    error_pct: error_px.abs() / r.width as f64 * 100.0,
                }
            })
            .collect()
    }

    /// Serialize with the schema tag.
    pub fn to_json_string(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&ProfileFileOut {
            schema: PROFILE_SCHEMA,
            profile: self,
        })?)
    }

    /// Parse a tagged profile and check its invariants.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let file: ProfileFileIn = serde_json::from_str(json)?;
        if file.schema != PROFILE_SCHEMA {
            return Err(EngineError::InvalidConfig(format!(
                "unsupported profile schema '{}', expected '{}'",
                file.schema, PROFILE_SCHEMA
            )));
        }
        file.profile.check()?;
        Ok(file.profile)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|e| EngineError::io(path, e))
    }

    pub fn load_json(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TableMetrics;

    fn profile() -> CalibrationProfile {
        CalibrationProfile {
            font: FontDescriptor::new("serif", 12.0),
            scale_factor: 4.0,
            tracking_offset_px: 0.3,
            kerning_mode: KerningMode::Metric,
            confidence: 0.98,
            reference_text: "Company".into(),
            working_ppi: 300.0,
            coefficient_of_variation: 0.02,
            sample_count: 12,
        }
    }

    #[test]
    fn json_round_trip_keeps_schema_tag() {
        let p = profile();
        let json = p.to_json_string().unwrap();
        assert!(json.contains(PROFILE_SCHEMA));
        assert_eq!(CalibrationProfile::from_json_str(&json).unwrap(), p);
    }

    #[test]
    fn loading_rejects_foreign_schema_and_bad_values() {
        let json = profile()
            .to_json_string()
            .unwrap()
            .replace(PROFILE_SCHEMA, "something.else");
        assert!(matches!(
            CalibrationProfile::from_json_str(&json),
            Err(EngineError::InvalidConfig(_))
        ));

        let bad = CalibrationProfile {
            scale_factor: 0.0,
            ..profile()
        };
        let json = bad.to_json_string().unwrap();
        assert!(CalibrationProfile::from_json_str(&json).is_err());
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = std::env::temp_dir().join(format!("unredact-profile-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.json");
        profile().save_json(&path).unwrap();
        assert_eq!(CalibrationProfile::load_json(&path).unwrap(), profile());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_reports_path() {
        let path = "/nonexistent/unredact/profile.json";
        let err = CalibrationProfile::load_json(path).unwrap_err();
        assert!(err.to_string().contains(path));
    }

    #[test]
    fn at_ppi_rescales_pixel_quantities() {
        let p = profile().at_ppi(600.0);
        assert!((p.scale_factor - 8.0).abs() < 1e-12);
        assert!((p.tracking_offset_px - 0.6).abs() < 1e-12);
        assert_eq!(p.working_ppi, 600.0);
        assert_eq!(p.font, profile().font);
    }

    #[test]
    fn validate_reports_per_word_error() {
        let metrics = TableMetrics::default();
        let p = CalibrationProfile {
            tracking_offset_px: 0.0,
            ..profile()
        };
        let width = metrics.measure_width("Company", &p.font, p.kerning_mode) * p.scale_factor;
        let refs = vec![
            ReferenceObservation::new("Company", 0, 0, width.round() as u32, 30, 95.0),
            ReferenceObservation::new("Company", 0, 0, (width * 1.1).round() as u32, 30, 95.0),
        ];
        let fits = p.validate(&refs, &metrics);
        assert_eq!(fits.len(), 2);
        assert!(fits[0].error_pct < 1.0);
        assert!(fits[1].error_pct > 8.0 && fits[1].error_pct < 10.0);
    }
}
