//! # featguard-core
//!
//! The resource model shared by Featguard components: the closed set of
//! managed resource kinds and the optional capabilities (`Named`, `Tagged`)
//! that permission matching relies on.

pub mod error;
pub mod kind;
pub mod resource;

pub use error::{CoreError, Result};
pub use kind::ResourceType;
pub use resource::{
    BatchFeatureView, DataSource, Entity, FeatureService, FeatureView, Named,
    OnDemandFeatureView, PermissionRecord, Resource, SavedDataset, StreamFeatureView, Tagged,
    ValidationReference,
};
