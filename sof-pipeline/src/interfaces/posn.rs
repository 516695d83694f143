//! Stream position tracking for host position queries
//! (`HostVerb::GetPosition`), backed by a fixed-size slot pool rather
//! than a growable map (spec §6.3: a pool sized `mailbox_size /
//! entry_size`, not real host-mailbox memory).

use crate::component::ComponentHandle;

/// Cumulative frames moved through a single host/dai endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamPosn {
    pub frames: u64,
}

impl StreamPosn {
    pub fn advance(&mut self, frames: i64) {
        if frames > 0 {
            self.frames += frames as u64;
        }
    }
}

/// Stands in for `mailbox_size / entry_size`: a real target sizes its
/// position pool from the host mailbox region it's carved from, this
/// workspace picks a slot count comfortably above any topology it
/// builds.
pub const MAX_TRACKED_STREAMS: usize = 32;

/// Fixed-size slot pool, one slot per tracked endpoint. A linear scan
/// over `MAX_TRACKED_STREAMS` slots is cheap at this scale and keeps
/// the table's footprint fixed at compile time instead of growing a
/// heap-backed map the way real mailbox memory never would.
#[derive(Clone, Copy)]
pub struct StreamPosnTable {
    slots: [Option<(u32, StreamPosn)>; MAX_TRACKED_STREAMS],
}

impl StreamPosnTable {
    pub fn new() -> Self {
        Self { slots: [None; MAX_TRACKED_STREAMS] }
    }

    pub fn advance(&mut self, component: ComponentHandle, frames: i64) {
        let index = component.index();
        if let Some((_, posn)) = self.slots.iter_mut().flatten().find(|(i, _)| *i == index) {
            posn.advance(frames);
            return;
        }
        if let Some(empty) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            let mut posn = StreamPosn::default();
            posn.advance(frames);
            *empty = Some((index, posn));
        }
        // a topology with more live endpoints than MAX_TRACKED_STREAMS
        // drops position tracking for the overflow rather than failing
        // the copy that's actually moving samples.
    }

    pub fn get(&self, component: ComponentHandle) -> u64 {
        let index = component.index();
        self.slots
            .iter()
            .flatten()
            .find(|(i, _)| *i == index)
            .map(|(_, posn)| posn.frames)
            .unwrap_or(0)
    }

    pub fn reset(&mut self, component: ComponentHandle) {
        let index = component.index();
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some((i, _)) if *i == index) {
                *slot = None;
            }
        }
    }
}

impl Default for StreamPosnTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::component::Component;
    use crate::component::ComponentKind;
    use crate::components::passthrough::PassThrough;

    #[test]
    fn advance_accumulates_only_positive_frames() {
        let mut arena: Arena<Component> = Arena::new();
        let handle = arena.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let mut table = StreamPosnTable::new();
        table.advance(handle, 128);
        table.advance(handle, -5);
        table.advance(handle, 64);
        assert_eq!(table.get(handle), 192);
    }

    #[test]
    fn reset_frees_the_slot_for_reuse() {
        let mut arena: Arena<Component> = Arena::new();
        let a = arena.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let b = arena.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
        let mut table = StreamPosnTable::new();
        table.advance(a, 100);
        table.reset(a);
        assert_eq!(table.get(a), 0);
        table.advance(b, 50);
        assert_eq!(table.get(b), 50);
    }

    #[test]
    fn overflowing_the_slot_pool_drops_tracking_without_panicking() {
        let mut arena: Arena<Component> = Arena::new();
        let mut table = StreamPosnTable::new();
        let mut handles = Vec::new();
        for _ in 0..MAX_TRACKED_STREAMS + 1 {
            let h = arena.insert(Component::new(ComponentKind::PassThrough(PassThrough::new())));
            table.advance(h, 10);
            handles.push(h);
        }
        let overflow = *handles.last().unwrap();
        assert_eq!(table.get(overflow), 0);
        assert_eq!(table.get(handles[0]), 10);
    }
}
