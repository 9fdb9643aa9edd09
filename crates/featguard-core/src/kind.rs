use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::CoreError;

/// The closed set of resource kinds managed by the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Entity,
    FeatureView,
    OnDemandFeatureView,
    BatchFeatureView,
    StreamFeatureView,
    FeatureService,
    DataSource,
    ValidationReference,
    SavedDataset,
    Permission,
}

impl ResourceType {
    /// Every managed resource kind, in declaration order.
    pub const ALL: [ResourceType; 10] = [
        ResourceType::Entity,
        ResourceType::FeatureView,
        ResourceType::OnDemandFeatureView,
        ResourceType::BatchFeatureView,
        ResourceType::StreamFeatureView,
        ResourceType::FeatureService,
        ResourceType::DataSource,
        ResourceType::ValidationReference,
        ResourceType::SavedDataset,
        ResourceType::Permission,
    ];

    /// Snake-case identifier used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Entity => "entity",
            ResourceType::FeatureView => "feature_view",
            ResourceType::OnDemandFeatureView => "on_demand_feature_view",
            ResourceType::BatchFeatureView => "batch_feature_view",
            ResourceType::StreamFeatureView => "stream_feature_view",
            ResourceType::FeatureService => "feature_service",
            ResourceType::DataSource => "data_source",
            ResourceType::ValidationReference => "validation_reference",
            ResourceType::SavedDataset => "saved_dataset",
            ResourceType::Permission => "permission",
        }
    }

    /// Class-style name (`FeatureView`), accepted by [`FromStr`] as well.
    pub fn class_name(&self) -> &'static str {
        match self {
            ResourceType::Entity => "Entity",
            ResourceType::FeatureView => "FeatureView",
            ResourceType::OnDemandFeatureView => "OnDemandFeatureView",
            ResourceType::BatchFeatureView => "BatchFeatureView",
            ResourceType::StreamFeatureView => "StreamFeatureView",
            ResourceType::FeatureService => "FeatureService",
            ResourceType::DataSource => "DataSource",
            ResourceType::ValidationReference => "ValidationReference",
            ResourceType::SavedDataset => "SavedDataset",
            ResourceType::Permission => "Permission",
        }
    }

    /// Direct supertype of this kind, if any.
    ///
    /// Batch and stream feature views specialize [`ResourceType::FeatureView`].
    pub fn parent(&self) -> Option<ResourceType> {
        match self {
            ResourceType::BatchFeatureView | ResourceType::StreamFeatureView => {
                Some(ResourceType::FeatureView)
            }
            _ => None,
        }
    }

    /// Returns `true` if `self` is `other` or one of its subtypes.
    pub fn is_subtype_of(&self, other: ResourceType) -> bool {
        let mut current = Some(*self);
        while let Some(t) = current {
            if t == other {
                return true;
            }
            current = t.parent();
        }
        false
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.class_name() == s)
            .ok_or_else(|| CoreError::invalid_resource_type(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_from_str() {
        assert_eq!(ResourceType::from_str("feature_view").unwrap(), ResourceType::FeatureView);
        assert_eq!(ResourceType::from_str("FeatureView").unwrap(), ResourceType::FeatureView);
        assert_eq!(ResourceType::from_str(" data_source ").unwrap(), ResourceType::DataSource);

        assert!(ResourceType::from_str("featureview").is_err());
        assert!(ResourceType::from_str("Project").is_err());
        assert!(ResourceType::from_str("").is_err());
    }

    #[test]
    fn test_resource_type_display() {
        assert_eq!(ResourceType::OnDemandFeatureView.to_string(), "on_demand_feature_view");
        assert_eq!(ResourceType::Permission.to_string(), "permission");
    }

    #[test]
    fn test_resource_type_serialization() {
        let json = serde_json::to_string(&ResourceType::StreamFeatureView).unwrap();
        assert_eq!(json, "\"stream_feature_view\"");

        let parsed: ResourceType = serde_json::from_str("\"saved_dataset\"").unwrap();
        assert_eq!(parsed, ResourceType::SavedDataset);
    }

    #[test]
    fn test_subtypes() {
        assert!(ResourceType::BatchFeatureView.is_subtype_of(ResourceType::FeatureView));
        assert!(ResourceType::StreamFeatureView.is_subtype_of(ResourceType::FeatureView));
        assert!(ResourceType::FeatureView.is_subtype_of(ResourceType::FeatureView));
        assert!(!ResourceType::FeatureView.is_subtype_of(ResourceType::BatchFeatureView));
        assert!(!ResourceType::OnDemandFeatureView.is_subtype_of(ResourceType::FeatureView));
        assert_eq!(ResourceType::Entity.parent(), None);
    }

    #[test]
    fn test_all_is_complete_and_unique() {
        let mut all = ResourceType::ALL.to_vec();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), ResourceType::ALL.len());
    }
}
