//! Shadow slot allocation
//!
//! Slots are granted strictly in sorted priority order under a global
//! per-frame budget. A directional shadow takes 1 slot and only the first
//! directional requester is granted one (the single-cascade "sun"); a
//! point light takes 6 contiguous slots for its cube faces; everything
//! else takes 1. The first request that would exceed the budget closes
//! allocation, so a later, cheaper request can never outrank an earlier
//! denial.

use super::types::GpuLightType;
use crate::constants::capacity;

#[derive(Debug)]
pub struct ShadowSlotAllocator {
    budget: u32,
    used: u32,
    exhausted: bool,
    directional_granted: bool,
    sun_index: Option<usize>,
}

impl ShadowSlotAllocator {
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            used: 0,
            exhausted: false,
            directional_granted: false,
            sun_index: None,
        }
    }

    pub fn with_default_budget() -> Self {
        Self::new(capacity::MAX_SHADOWS_ON_SCREEN)
    }

    /// Remember the first directional light seen as the sun reference,
    /// whether or not it ends up shadow-granted.
    pub fn note_directional(&mut self, source_index: usize) {
        if self.sun_index.is_none() {
            self.sun_index = Some(source_index);
        }
    }

    /// Request shadow slots for a light in sorted order. Returns the base
    /// slot index, or `None` when denied; the caller leaves the packed
    /// shadow index as "none" in that case.
    pub fn request(&mut self, gpu_type: GpuLightType, source_index: usize) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        if gpu_type == GpuLightType::Directional && self.directional_granted {
            return None;
        }

        let cost = gpu_type.shadow_slot_cost();
        if self.used + cost > self.budget {
            self.exhausted = true;
            return None;
        }

        let base = self.used;
        self.used += cost;
        if gpu_type == GpuLightType::Directional {
            self.directional_granted = true;
            // The shadow-casting directional wins the sun reference.
            self.sun_index = Some(source_index);
        }
        Some(base)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn sun_index(&self) -> Option<usize> {
        self.sun_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_consumes_six_slots() {
        let mut alloc = ShadowSlotAllocator::new(16);
        assert_eq!(alloc.request(GpuLightType::Point, 0), Some(0));
        assert_eq!(alloc.request(GpuLightType::Spot, 1), Some(6));
        assert_eq!(alloc.used(), 7);
    }

    #[test]
    fn only_first_directional_is_granted() {
        let mut alloc = ShadowSlotAllocator::new(16);
        assert_eq!(alloc.request(GpuLightType::Directional, 0), Some(0));
        assert_eq!(alloc.request(GpuLightType::Directional, 1), None);
        assert_eq!(alloc.sun_index(), Some(0));
    }

    #[test]
    fn sun_is_remembered_even_without_a_grant() {
        let mut alloc = ShadowSlotAllocator::new(0);
        alloc.note_directional(5);
        assert_eq!(alloc.request(GpuLightType::Directional, 5), None);
        assert_eq!(alloc.sun_index(), Some(5));
    }

    #[test]
    fn allocation_is_priority_monotonic() {
        // Budget 8: spot(1), point(6) leaves 1 slot; the next point is
        // denied and closes allocation, so the cheaper spot after it must
        // be denied too.
        let mut alloc = ShadowSlotAllocator::new(8);
        assert_eq!(alloc.request(GpuLightType::Spot, 0), Some(0));
        assert_eq!(alloc.request(GpuLightType::Point, 1), Some(1));
        assert_eq!(alloc.request(GpuLightType::Point, 2), None);
        assert_eq!(alloc.request(GpuLightType::Spot, 3), None);
        assert_eq!(alloc.used(), 7);
    }
}
