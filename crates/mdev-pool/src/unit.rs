//! Mediated-device value types

use api_types::AllocationClass;
use api_types::ConsumerId;
use api_types::MdevDescriptor;
use api_types::MdevId;
use api_types::MdevKind;
use serde::Deserialize;
use serde::Serialize;

/// Ownership record for a claimed mediated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitClaim {
    /// Consumer (workload) owning the device.
    pub consumer: ConsumerId,
    /// Allocation class the device was claimed under. Unset when the owner
    /// could not be resolved during discovery.
    pub class: Option<AllocationClass>,
}

impl UnitClaim {
    pub fn new(consumer: ConsumerId, class: Option<AllocationClass>) -> Self {
        Self { consumer, class }
    }
}

/// One allocatable mediated device on this host.
///
/// Pure value object; all mutation is performed by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdevUnit {
    /// The mediated device's id, stable across restarts.
    pub id: MdevId,
    /// The mediated device's kind.
    pub kind: MdevKind,
    /// The parent of the mdev, which references the physical device.
    pub parent: String,
    /// Current ownership; `None` means the device is free.
    pub claim: Option<UnitClaim>,
}

impl MdevUnit {
    /// Build a free unit from a driver descriptor.
    pub fn from_descriptor(descriptor: MdevDescriptor) -> Self {
        Self {
            id: descriptor.id,
            kind: descriptor.kind,
            parent: descriptor.parent,
            claim: None,
        }
    }

    /// Build a unit from a driver descriptor with ownership already set.
    pub fn with_claim(descriptor: MdevDescriptor, claim: UnitClaim) -> Self {
        let mut unit = Self::from_descriptor(descriptor);
        unit.claim = Some(claim);
        unit
    }

    /// Check the device is assigned or not.
    pub fn is_assigned(&self) -> bool {
        self.claim.is_some()
    }

    /// True when the device is owned by this exact (consumer, class) pair.
    /// The class is part of the ownership key, so a consumer mid-transition
    /// holding devices under two classes matches only one of them.
    pub fn is_claimed_by(&self, consumer: &ConsumerId, class: &AllocationClass) -> bool {
        match &self.claim {
            Some(claim) => claim.consumer == *consumer && claim.class.as_ref() == Some(class),
            None => false,
        }
    }

    /// Identity-only view of this unit, as the driver boundary expects it.
    pub fn descriptor(&self) -> MdevDescriptor {
        MdevDescriptor {
            id: self.id.clone(),
            kind: self.kind.clone(),
            parent: self.parent.clone(),
        }
    }

    pub(crate) fn assign(&mut self, consumer: ConsumerId, class: AllocationClass) {
        self.claim = Some(UnitClaim::new(consumer, Some(class)));
    }

    pub(crate) fn clear_claim(&mut self) {
        self.claim = None;
    }
}

impl std::fmt::Display for MdevUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let consumer = self
            .claim
            .as_ref()
            .map(|claim| claim.consumer.as_str())
            .unwrap_or("-");
        let class = self
            .claim
            .as_ref()
            .and_then(|claim| claim.class.as_ref())
            .map(|class| class.as_str())
            .unwrap_or("-");
        write!(
            f,
            "MdevUnit(id={}, kind={}, parent={}, consumer={}, class={})",
            self.id, self.kind, self.parent, consumer, class
        )
    }
}
