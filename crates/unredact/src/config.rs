//! Engine configuration: one section per stage, all serde-loadable.

use std::path::Path;

use crate::artifact::ArtifactConfig;
use crate::calibrate::{tracking_offsets, CalibrationConfig};
use crate::detect::BoxDetectConfig;
use crate::error::{EngineError, EngineResult};
use crate::halo::HaloConfig;
use crate::matching::WidthMatchConfig;
use crate::rank::RankConfig;

/// Complete engine configuration.
///
/// Every field has a default; a JSON file only needs the values it changes.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detect: BoxDetectConfig,
    pub calibration: CalibrationConfig,
    pub width: WidthMatchConfig,
    pub halo: HaloConfig,
    pub artifact: ArtifactConfig,
    pub rank: RankConfig,
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(msg.into())
}

fn non_negative(name: &str, v: f64) -> EngineResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a finite non-negative number, got {v}")))
    }
}

impl EngineConfig {
    /// Load a (partial) configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> EngineResult<()> {
        non_negative("detect.min_aspect_ratio", self.detect.min_aspect_ratio)?;

        let cal = &self.calibration;
        if cal.min_samples == 0 {
            return Err(invalid("calibration.min_samples must be at least 1"));
        }
        if !(cal.max_variation > 0.0) || !cal.max_variation.is_finite() {
            return Err(invalid(format!(
                "calibration.max_variation must be positive, got {}",
                cal.max_variation
            )));
        }
        let refs = &cal.references;
        if refs.min_text_len > refs.max_text_len {
            return Err(invalid(format!(
                "calibration.references: min_text_len {} exceeds max_text_len {}",
                refs.min_text_len, refs.max_text_len
            )));
        }
        tracking_offsets(
            cal.tracking_min_px,
            cal.tracking_max_px,
            cal.tracking_step_px,
        )
        .map_err(|e| invalid(format!("calibration: {e}")))?;

        non_negative("width.tolerance_floor_px", self.width.tolerance_floor_px)?;
        non_negative("width.tolerance_fraction", self.width.tolerance_fraction)?;

        if self.halo.thickness_px == 0 {
            return Err(invalid("halo.thickness_px must be at least 1"));
        }
        let q = self.halo.enhance.jpeg_quality;
        if !(1..=100).contains(&q) {
            return Err(invalid(format!("halo.enhance.jpeg_quality must be 1..=100, got {q}")));
        }

        let edges = &self.artifact.edges;
        non_negative("artifact.edges.canny_low", edges.canny_low as f64)?;
        non_negative("artifact.edges.canny_high", edges.canny_high as f64)?;
        if edges.canny_low > edges.canny_high {
            return Err(invalid(format!(
                "artifact.edges: canny_low {} exceeds canny_high {}",
                edges.canny_low, edges.canny_high
            )));
        }
        let w = &self.artifact.weights;
        for (name, v) in [
            ("top", w.top),
            ("bottom", w.bottom),
            ("left", w.left),
            ("right", w.right),
        ] {
            non_negative(&format!("artifact.weights.{name}"), v)?;
        }

        non_negative("rank.artifact_weight", self.rank.artifact_weight)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().expect("default config");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{ "width": { "tolerance_fraction": 0.08 }, "rank": { "artifact_weight": 0.5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.width.tolerance_fraction, 0.08);
        assert_eq!(cfg.width.tolerance_floor_px, 3.0);
        assert_eq!(cfg.rank.artifact_weight, 0.5);
        assert_eq!(cfg.detect.dark_threshold, 15);
        assert_eq!(cfg.halo.corner_radius_px, 15);
        assert_eq!(cfg.calibration.references.min_ocr_confidence, 85.0);
    }

    #[test]
    fn serialized_defaults_parse_back() {
        let json = EngineConfig::default().to_json_pretty().unwrap();
        let cfg: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.calibration.kerning_modes.len(), 2);
        assert_eq!(cfg.width.variants.len(), 4);
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.calibration.tracking_step_px = 0.0;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));

        let mut cfg = EngineConfig::default();
        cfg.width.tolerance_fraction = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.artifact.edges.canny_low = 200.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.halo.thickness_px = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_json_file("/nonexistent/unredact.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
