//! `Resource` implementations for the supported kinds.

use crate::types::{Resource, ResourceId};
use cdeploy_core::schema::{DELIVERY_PIPELINE, TARGET};
use cdeploy_core::{DeliveryPipeline, ResourceSchema, Target};
use std::collections::BTreeMap;

macro_rules! impl_resource {
    ($ty:ty, $schema:expr) => {
        impl Resource for $ty {
            fn schema() -> &'static ResourceSchema {
                &$schema
            }

            fn id(&self) -> Option<ResourceId> {
                ResourceId::from_parts(
                    self.project.as_deref(),
                    self.location.as_deref(),
                    self.name.as_deref(),
                )
            }

            fn set_id(&mut self, id: &ResourceId) {
                self.project = Some(id.project.clone());
                self.location = Some(id.location.clone());
                self.name = Some(id.name.clone());
            }

            fn labels(&self) -> Option<&BTreeMap<String, String>> {
                self.labels.value()
            }
        }
    };
}

impl_resource!(DeliveryPipeline, DELIVERY_PIPELINE);
impl_resource!(Target, TARGET);
