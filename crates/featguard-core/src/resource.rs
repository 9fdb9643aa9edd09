//! Managed resource model.
//!
//! Resources form a closed sum type ([`Resource`]); attributes that only some
//! kinds expose are reached through the optional [`Named`] and [`Tagged`]
//! capabilities instead of probing fields by name.

use crate::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resources that expose a name.
///
/// `None` means the resource has the attribute but no usable value (an
/// unnamed data source, for instance).
pub trait Named {
    fn name(&self) -> Option<&str>;
}

/// Resources that expose a tag map.
pub trait Tagged {
    fn tags(&self) -> &HashMap<String, String>;
}

macro_rules! tagged_resource {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $ty {
            pub name: String,
            #[serde(default, skip_serializing_if = "String::is_empty")]
            pub description: String,
            #[serde(default, skip_serializing_if = "HashMap::is_empty")]
            pub tags: HashMap<String, String>,
        }

        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    ..Default::default()
                }
            }

            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.description = description.into();
                self
            }

            pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
                self.tags.insert(key.into(), value.into());
                self
            }
        }

        impl Named for $ty {
            fn name(&self) -> Option<&str> {
                Some(&self.name)
            }
        }

        impl Tagged for $ty {
            fn tags(&self) -> &HashMap<String, String> {
                &self.tags
            }
        }
    };
}

tagged_resource!(
    /// A business entity with join keys shared across feature views.
    Entity
);
tagged_resource!(
    /// A group of features materialized from a batch source.
    FeatureView
);
tagged_resource!(
    /// Features computed at request time.
    OnDemandFeatureView
);
tagged_resource!(
    /// A feature view backed by a batch-only source.
    BatchFeatureView
);
tagged_resource!(
    /// A feature view backed by a streaming source.
    StreamFeatureView
);
tagged_resource!(
    /// A named selection of features served together.
    FeatureService
);
tagged_resource!(
    /// A dataset persisted from a historical retrieval.
    SavedDataset
);
tagged_resource!(
    /// A permission as stored in the registry.
    PermissionRecord
);

/// A source of feature data. Older registries allow unnamed sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl DataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            tags: HashMap::new(),
        }
    }

    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl Named for DataSource {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Tagged for DataSource {
    fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

/// Binds a saved dataset to a validation profile. Carries no tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReference {
    pub name: String,
    pub dataset_name: String,
}

impl ValidationReference {
    pub fn new(name: impl Into<String>, dataset_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dataset_name: dataset_name.into(),
        }
    }
}

impl Named for ValidationReference {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Any object managed by the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    Entity(Entity),
    FeatureView(FeatureView),
    OnDemandFeatureView(OnDemandFeatureView),
    BatchFeatureView(BatchFeatureView),
    StreamFeatureView(StreamFeatureView),
    FeatureService(FeatureService),
    DataSource(DataSource),
    ValidationReference(ValidationReference),
    SavedDataset(SavedDataset),
    Permission(PermissionRecord),
}

impl Resource {
    /// Kind of this resource.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Entity(_) => ResourceType::Entity,
            Resource::FeatureView(_) => ResourceType::FeatureView,
            Resource::OnDemandFeatureView(_) => ResourceType::OnDemandFeatureView,
            Resource::BatchFeatureView(_) => ResourceType::BatchFeatureView,
            Resource::StreamFeatureView(_) => ResourceType::StreamFeatureView,
            Resource::FeatureService(_) => ResourceType::FeatureService,
            Resource::DataSource(_) => ResourceType::DataSource,
            Resource::ValidationReference(_) => ResourceType::ValidationReference,
            Resource::SavedDataset(_) => ResourceType::SavedDataset,
            Resource::Permission(_) => ResourceType::Permission,
        }
    }

    /// The [`Named`] capability; every managed kind has one.
    pub fn as_named(&self) -> &dyn Named {
        match self {
            Resource::Entity(r) => r,
            Resource::FeatureView(r) => r,
            Resource::OnDemandFeatureView(r) => r,
            Resource::BatchFeatureView(r) => r,
            Resource::StreamFeatureView(r) => r,
            Resource::FeatureService(r) => r,
            Resource::DataSource(r) => r,
            Resource::ValidationReference(r) => r,
            Resource::SavedDataset(r) => r,
            Resource::Permission(r) => r,
        }
    }

    /// The [`Tagged`] capability, if this kind has one.
    pub fn as_tagged(&self) -> Option<&dyn Tagged> {
        match self {
            Resource::Entity(r) => Some(r),
            Resource::FeatureView(r) => Some(r),
            Resource::OnDemandFeatureView(r) => Some(r),
            Resource::BatchFeatureView(r) => Some(r),
            Resource::StreamFeatureView(r) => Some(r),
            Resource::FeatureService(r) => Some(r),
            Resource::DataSource(r) => Some(r),
            Resource::ValidationReference(_) => None,
            Resource::SavedDataset(r) => Some(r),
            Resource::Permission(r) => Some(r),
        }
    }

    /// Shortcut for the resource name, when present.
    pub fn name(&self) -> Option<&str> {
        self.as_named().name()
    }
}

macro_rules! impl_from_resource {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Resource {
                fn from(value: $ty) -> Self {
                    Resource::$variant(value)
                }
            }
        )*
    };
}

impl_from_resource!(
    Entity => Entity,
    FeatureView => FeatureView,
    OnDemandFeatureView => OnDemandFeatureView,
    BatchFeatureView => BatchFeatureView,
    StreamFeatureView => StreamFeatureView,
    FeatureService => FeatureService,
    DataSource => DataSource,
    ValidationReference => ValidationReference,
    SavedDataset => SavedDataset,
    Permission => PermissionRecord,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_of_variants() {
        let fv: Resource = FeatureView::new("driver_stats").into();
        assert_eq!(fv.resource_type(), ResourceType::FeatureView);

        let bfv: Resource = BatchFeatureView::new("driver_daily").into();
        assert_eq!(bfv.resource_type(), ResourceType::BatchFeatureView);

        let perm: Resource = PermissionRecord::new("readers").into();
        assert_eq!(perm.resource_type(), ResourceType::Permission);
    }

    #[test]
    fn test_capabilities() {
        let entity: Resource = Entity::new("driver").with_tag("team", "ml").into();
        assert_eq!(entity.name(), Some("driver"));
        assert_eq!(
            entity.as_tagged().map(|t| t.tags().get("team").cloned()),
            Some(Some("ml".to_string()))
        );

        let reference: Resource = ValidationReference::new("ref", "dataset").into();
        assert_eq!(reference.name(), Some("ref"));
        assert!(reference.as_tagged().is_none());

        let source: Resource = DataSource::unnamed().into();
        assert_eq!(source.as_named().name(), None);
        assert_eq!(source.name(), None);
    }

    #[test]
    fn test_resource_serde() {
        let resource: Resource = FeatureService::new("driver_activity")
            .with_description("serving bundle")
            .with_tag("env", "prod")
            .into();
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "feature_service");
        assert_eq!(json["name"], "driver_activity");
        assert_eq!(json["tags"]["env"], "prod");

        let back: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(back, resource);
    }

    #[test]
    fn test_unnamed_source_deserializes() {
        let resource: Resource = serde_json::from_str(r#"{"type":"data_source"}"#).unwrap();
        assert_eq!(resource, Resource::DataSource(DataSource::unnamed()));
    }
}
