//! Shared boundary type definitions
//!
//! This crate contains the value types exchanged between the mediated-device
//! pool and its external collaborators: the host driver that enumerates and
//! creates mediated devices, the consumer store that resolves workload
//! metadata, and the orchestrator embedding the pool.

use derive_more::Display;
use derive_more::From;
use serde::Deserialize;
use serde::Serialize;

/// Opaque identifier of a single mediated device, stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct MdevId(String);

/// Tag identifying a mediated-device kind (the resource category a slice
/// belongs to, e.g. a vGPU profile).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct MdevKind(String);

/// Identifier of the consumer (workload) owning a claimed device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct ConsumerId(String);

/// Tag for the logical configuration a consumer claimed a device under.
///
/// One consumer may hold devices under two classes at once, e.g. while
/// transitioning between sizes, so the class is part of the ownership key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct AllocationClass(String);

macro_rules! impl_str_id {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

impl_str_id!(MdevId, MdevKind, ConsumerId, AllocationClass);

/// Raw mediated-device record as reported by the host driver.
///
/// Fixed-shape structure for the driver boundary; identity fields only,
/// ownership is tracked by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdevDescriptor {
    /// The mediated device's id.
    pub id: MdevId,
    /// The mediated device's kind.
    pub kind: MdevKind,
    /// The parent of the mdev, which references the physical device.
    pub parent: String,
}

impl MdevDescriptor {
    pub fn new(
        id: impl Into<MdevId>,
        kind: impl Into<MdevKind>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parent: parent.into(),
        }
    }
}

/// Consumer record as resolved by the consumer store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    /// Consumer id the record belongs to.
    pub id: ConsumerId,
    /// Allocation class the consumer currently runs under, when known.
    pub allocation_class: Option<AllocationClass>,
}

/// Credential/context passed to consumer-store lookups.
///
/// Discovery reads consumer records with an explicit privileged context
/// instead of an ambient one, so embedding daemons decide what identity the
/// lookups run as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreContext {
    /// Principal the lookup runs as.
    pub principal: String,
    /// Bearer token for the store, when it requires one.
    pub token: Option<String>,
}

impl StoreContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
