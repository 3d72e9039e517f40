//! Driver behavior classes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Behavior classes, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorClass {
    #[serde(rename = "Safe Driving")]
    SafeDriving,
    Texting,
    #[serde(rename = "Talking on Phone")]
    TalkingOnPhone,
    Drinking,
    Eating,
    Smoking,
    #[serde(rename = "Operating Radio")]
    OperatingRadio,
    #[serde(rename = "Reaching Behind")]
    ReachingBehind,
}

impl BehaviorClass {
    /// All classes, indexed like the detector's class scores
    pub const ALL: [BehaviorClass; 8] = [
        BehaviorClass::SafeDriving,
        BehaviorClass::Texting,
        BehaviorClass::TalkingOnPhone,
        BehaviorClass::Drinking,
        BehaviorClass::Eating,
        BehaviorClass::Smoking,
        BehaviorClass::OperatingRadio,
        BehaviorClass::ReachingBehind,
    ];

    /// Map a model class index to its label
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display label, as reported in `detected_behaviors`
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorClass::SafeDriving => "Safe Driving",
            BehaviorClass::Texting => "Texting",
            BehaviorClass::TalkingOnPhone => "Talking on Phone",
            BehaviorClass::Drinking => "Drinking",
            BehaviorClass::Eating => "Eating",
            BehaviorClass::Smoking => "Smoking",
            BehaviorClass::OperatingRadio => "Operating Radio",
            BehaviorClass::ReachingBehind => "Reaching Behind",
        }
    }
}

impl fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_mapping() {
        assert_eq!(BehaviorClass::from_index(0), Some(BehaviorClass::SafeDriving));
        assert_eq!(BehaviorClass::from_index(1), Some(BehaviorClass::Texting));
        assert_eq!(BehaviorClass::from_index(7), Some(BehaviorClass::ReachingBehind));
        assert_eq!(BehaviorClass::from_index(8), None);
    }

    #[test]
    fn test_serde_uses_display_label() {
        for class in BehaviorClass::ALL {
            let json = serde_json::to_string(&class).unwrap();
            assert_eq!(json, format!("\"{}\"", class));
            let back: BehaviorClass = serde_json::from_str(&json).unwrap();
            assert_eq!(back, class);
        }
    }
}
