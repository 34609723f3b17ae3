//! The four classifier families shown on screen

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a model's raw labels are turned into display text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// Label is shown as produced by the model
    Raw,
    /// Label carries a leading identifier (e.g. `n02123045 tabby`) that is
    /// dropped up to and including the first space
    SynsetPrefixed,
}

/// Identifier of one classifier and its screen region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "ResNet50")]
    ResNet50,
    #[serde(rename = "VGG16")]
    Vgg16,
    #[serde(rename = "MobileNet")]
    MobileNet,
    #[serde(rename = "NASNetMobile")]
    NasNetMobile,
}

impl ModelKind {
    /// All kinds in display order
    pub const ALL: [ModelKind; 4] = [
        ModelKind::ResNet50,
        ModelKind::Vgg16,
        ModelKind::MobileNet,
        ModelKind::NasNetMobile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::ResNet50 => "ResNet50",
            ModelKind::Vgg16 => "VGG16",
            ModelKind::MobileNet => "MobileNet",
            ModelKind::NasNetMobile => "NASNetMobile",
        }
    }

    /// Base file name used for the model and label files
    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelKind::ResNet50 => "resnet50",
            ModelKind::Vgg16 => "vgg16",
            ModelKind::MobileNet => "mobilenet",
            ModelKind::NasNetMobile => "nasnet_mobile",
        }
    }

    pub fn label_style(&self) -> LabelStyle {
        match self {
            ModelKind::MobileNet => LabelStyle::SynsetPrefixed,
            _ => LabelStyle::Raw,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name) || kind.file_stem() == name)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mobilenet_strips_prefix() {
        for kind in ModelKind::ALL {
            let expected = if kind == ModelKind::MobileNet {
                LabelStyle::SynsetPrefixed
            } else {
                LabelStyle::Raw
            };
            assert_eq!(kind.label_style(), expected);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ModelKind::from_name("vgg16"), Some(ModelKind::Vgg16));
        assert_eq!(ModelKind::from_name("NASNetMobile"), Some(ModelKind::NasNetMobile));
        assert_eq!(ModelKind::from_name("nasnet_mobile"), Some(ModelKind::NasNetMobile));
        assert_eq!(ModelKind::from_name("inception"), None);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&ModelKind::NasNetMobile).unwrap();
        assert_eq!(json, "\"NASNetMobile\"");
        let back: ModelKind = serde_json::from_str("\"VGG16\"").unwrap();
        assert_eq!(back, ModelKind::Vgg16);
    }
}
