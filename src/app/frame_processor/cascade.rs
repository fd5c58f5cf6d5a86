// SPDX-License-Identifier: GPL-3.0-only

//! Haar cascade classifier model
//!
//! Reads the XML layout written by OpenCV's `opencv_traincascade`
//! (`<opencv_storage><cascade>...`) with HAAR features. Each stage is a
//! boosted set of decision trees; a window is accepted when it passes every
//! stage.

use crate::errors::DetectorError;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Stage thresholds are loosened by this much when loaded
const THRESHOLD_EPS: f64 = 1e-5;

/// A weighted rectangle of a Haar feature, relative to the window origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Internal node of a weak classifier tree
///
/// `left` and `right` greater than zero index another node; zero or less
/// means leaf `-value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

/// A loaded cascade
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    /// Training window size (width, height)
    pub window: (u32, u32),
    pub stages: Vec<Stage>,
    pub features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Load a cascade from disk
    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        let failure = |reason: String| DetectorError::ModelLoadFailure {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| failure(e.to_string()))?;
        let cascade = Self::from_xml_str(&text).map_err(failure)?;

        info!(
            path = %path.display(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            "Loaded face cascade"
        );
        Ok(cascade)
    }

    /// Parse a cascade from XML text
    pub fn from_xml_str(text: &str) -> Result<Self, String> {
        let storage: StorageXml =
            quick_xml::de::from_str(text).map_err(|e| format!("Invalid cascade XML: {}", e))?;
        let xml = storage.cascade;

        if let Some(feature_type) = &xml.feature_type
            && !feature_type.trim().eq_ignore_ascii_case("HAAR")
        {
            return Err(format!("Unsupported feature type {}", feature_type.trim()));
        }

        let window = (parse_num::<u32>(&xml.width, "width")?, parse_num::<u32>(&xml.height, "height")?);
        if window.0 < 3 || window.1 < 3 {
            return Err(format!("Window {}x{} too small", window.0, window.1));
        }

        let features = xml
            .features
            .items
            .iter()
            .map(|f| parse_feature(f, window))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = xml
            .stages
            .items
            .iter()
            .map(|s| parse_stage(s, features.len()))
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err("Cascade has no stages".into());
        }

        debug!(
            width = window.0,
            height = window.1,
            stages = stages.len(),
            "Parsed cascade"
        );

        Ok(Self {
            window,
            stages,
            features,
        })
    }
}

fn parse_num<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, String> {
    text.trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid {}: {:?}", what, text.trim()))
}

fn parse_list(text: &str, what: &str) -> Result<Vec<f64>, String> {
    text.split_whitespace()
        .map(|v| parse_num::<f64>(v, what))
        .collect()
}

fn parse_feature(xml: &FeatureXml, window: (u32, u32)) -> Result<HaarFeature, String> {
    if let Some(tilted) = &xml.tilted
        && tilted.trim() != "0"
    {
        return Err("Tilted features are not supported".into());
    }

    let mut rects = Vec::with_capacity(xml.rects.items.len());
    for item in &xml.rects.items {
        let values = parse_list(item, "feature rect")?;
        let [x, y, w, h, weight] = values[..] else {
            return Err(format!("Feature rect needs 5 values, got {}", values.len()));
        };
        if x < 0.0 || y < 0.0 || w <= 0.0 || h <= 0.0 {
            return Err(format!("Invalid feature rect {:?}", item.trim()));
        }
        let rect = WeightedRect {
            x: x as u32,
            y: y as u32,
            width: w as u32,
            height: h as u32,
            weight,
        };
        if rect.x + rect.width > window.0 || rect.y + rect.height > window.1 {
            return Err(format!("Feature rect {:?} outside window", item.trim()));
        }
        rects.push(rect);
    }

    if rects.is_empty() {
        return Err("Feature without rects".into());
    }
    Ok(HaarFeature { rects })
}

fn parse_stage(xml: &StageXml, feature_count: usize) -> Result<Stage, String> {
    let threshold = parse_num::<f64>(&xml.stage_threshold, "stage threshold")? - THRESHOLD_EPS;

    let classifiers = xml
        .weak_classifiers
        .items
        .iter()
        .map(|w| parse_weak(w, feature_count))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak(xml: &WeakClassifierXml, feature_count: usize) -> Result<WeakClassifier, String> {
    let raw = parse_list(&xml.internal_nodes, "internal node")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(format!(
            "Internal nodes need groups of 4 values, got {}",
            raw.len()
        ));
    }
    let leaves = parse_list(&xml.leaf_values, "leaf value")?;

    let nodes: Vec<TreeNode> = raw
        .chunks_exact(4)
        .map(|c| TreeNode {
            left: c[0] as i32,
            right: c[1] as i32,
            feature: c[2] as usize,
            threshold: c[3],
        })
        .collect();

    for node in &nodes {
        if node.feature >= feature_count {
            return Err(format!("Feature index {} out of range", node.feature));
        }
        for child in [node.left, node.right] {
            let valid = if child > 0 {
                (child as usize) < nodes.len()
            } else {
                ((-child) as usize) < leaves.len()
            };
            if !valid {
                return Err(format!("Tree child {} out of range", child));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}

// XML layout. Repeated children are all named `_`.

#[derive(Debug, Deserialize)]
struct StorageXml {
    cascade: CascadeXml,
}

#[derive(Debug, Deserialize)]
struct CascadeXml {
    #[serde(rename = "featureType")]
    feature_type: Option<String>,
    height: String,
    width: String,
    stages: StagesXml,
    features: FeaturesXml,
}

#[derive(Debug, Deserialize)]
struct StagesXml {
    #[serde(rename = "_", default)]
    items: Vec<StageXml>,
}

#[derive(Debug, Deserialize)]
struct StageXml {
    #[serde(rename = "stageThreshold")]
    stage_threshold: String,
    #[serde(rename = "weakClassifiers")]
    weak_classifiers: WeakClassifiersXml,
}

#[derive(Debug, Deserialize)]
struct WeakClassifiersXml {
    #[serde(rename = "_", default)]
    items: Vec<WeakClassifierXml>,
}

#[derive(Debug, Deserialize)]
struct WeakClassifierXml {
    #[serde(rename = "internalNodes")]
    internal_nodes: String,
    #[serde(rename = "leafValues")]
    leaf_values: String,
}

#[derive(Debug, Deserialize)]
struct FeaturesXml {
    #[serde(rename = "_", default)]
    items: Vec<FeatureXml>,
}

#[derive(Debug, Deserialize)]
struct FeatureXml {
    rects: RectsXml,
    tilted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RectsXml {
    #[serde(rename = "_", default)]
    items: Vec<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One stage, one stump: accepts windows whose left half is brighter
    /// than the right half.
    pub(crate) const LEFT_BRIGHT_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000000000000e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_>
  </stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 24 24 -1.</_>
        <_>
          0 0 12 24 2.</_></rects></_>
  </features>
</cascade>
</opencv_storage>
"#;

    #[test]
    fn parses_minimal_cascade() {
        let cascade = HaarCascade::from_xml_str(LEFT_BRIGHT_CASCADE).unwrap();
        assert_eq!(cascade.window, (24, 24));
        assert_eq!(cascade.stages.len(), 1);
        assert_eq!(cascade.features.len(), 1);

        let stump = &cascade.stages[0].classifiers[0];
        assert_eq!(
            stump.nodes,
            vec![TreeNode {
                left: 0,
                right: -1,
                feature: 0,
                threshold: 0.1
            }]
        );
        assert_eq!(stump.leaves, vec![-1.0, 1.0]);
        assert_eq!(cascade.features[0].rects[1].width, 12);
        assert_eq!(cascade.features[0].rects[1].weight, 2.0);
    }

    #[test]
    fn rejects_lbp_cascades() {
        let lbp = LEFT_BRIGHT_CASCADE.replace("<featureType>HAAR", "<featureType>LBP");
        let err = HaarCascade::from_xml_str(&lbp).unwrap_err();
        assert!(err.contains("LBP"));
    }

    #[test]
    fn rejects_out_of_range_feature() {
        let broken = LEFT_BRIGHT_CASCADE.replace("0 -1 0 1.0", "0 -1 3 1.0");
        assert!(HaarCascade::from_xml_str(&broken).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(HaarCascade::from_xml_str("not xml at all").is_err());
    }

    #[test]
    fn missing_file_is_model_load_failure() {
        let err = HaarCascade::load(Path::new("/nonexistent/cascade.xml")).unwrap_err();
        assert!(matches!(err, DetectorError::ModelLoadFailure { .. }));
    }
}
