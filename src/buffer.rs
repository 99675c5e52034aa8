// Copyright (C) 2024-2026 Push Infra Contributors.
// This file is part of the apns-legacy-client library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The replay buffer: a bounded, ordered, FIFO-evicting window of recently
//! sent notifications, addressed by stable handles.
//!
//! Backed by a [`slotmap::SlotMap`] of intrusive nodes carrying `prev`/`next`
//! links, rather than a `VecDeque`, because the send/recover loop needs a
//! cursor that survives insertions and removals elsewhere in the buffer.

use slotmap::SlotMap;

use crate::notification::Notification;

slotmap::new_key_type! {
    /// A stable handle to an entry in the [`ReplayBuffer`].
    pub struct Handle;
}

struct Node {
    notification: Notification,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// A bounded, ordered window of notifications, most-recently-written at the back.
pub struct ReplayBuffer {
    capacity: usize,
    nodes: SlotMap<Handle, Node>,
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            capacity,
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<Handle> {
        self.head
    }

    pub fn back(&self) -> Option<Handle> {
        self.tail
    }

    pub fn next(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).and_then(|n| n.next)
    }

    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).and_then(|n| n.prev)
    }

    pub fn get(&self, handle: Handle) -> Option<&Notification> {
        self.nodes.get(handle).map(|n| &n.notification)
    }

    /// Appends `notification` at the back. If the buffer is at capacity, the
    /// front element is evicted first, preserving the invariant `len <= capacity`.
    pub fn add(&mut self, notification: Notification) -> Handle {
        if self.len >= self.capacity {
            if let Some(front) = self.head {
                self.remove(front);
            }
        }

        let handle = self.nodes.insert(Node { notification, prev: self.tail, next: None });

        if let Some(tail) = self.tail {
            self.nodes[tail].next = Some(handle);
        } else {
            self.head = Some(handle);
        }
        self.tail = Some(handle);
        self.len += 1;

        handle
    }

    /// Removes the entry referenced by `handle`, if still present. Returns
    /// the removed notification.
    pub fn remove(&mut self, handle: Handle) -> Option<Notification> {
        let node = self.nodes.remove(handle)?;

        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.len -= 1;

        Some(node.notification)
    }

    /// Scans back-to-front for the entry whose identifier matches `id`, since
    /// a rejected notification is, in practice, almost always near the back.
    pub fn find_by_id(&self, id: u32) -> Option<Handle> {
        let mut cursor = self.tail;
        while let Some(handle) = cursor {
            if self.nodes[handle].notification.id == id {
                return Some(handle);
            }
            cursor = self.nodes[handle].prev;
        }
        None
    }

    /// Iterates from `handle` to the back of the buffer, inclusive — the set
    /// of notifications eligible for replay once the cursor lands on `handle`.
    pub fn iter_from(&self, handle: Handle) -> IterFrom<'_> {
        IterFrom { buffer: self, cursor: Some(handle) }
    }
}

pub struct IterFrom<'a> {
    buffer: &'a ReplayBuffer,
    cursor: Option<Handle>,
}

impl<'a> Iterator for IterFrom<'a> {
    type Item = &'a Notification;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.buffer.nodes.get(handle)?;
        self.cursor = node.next;
        Some(&node.notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: u32) -> Notification {
        Notification::new([0u8; 32], b"{}".to_vec()).with_id(id)
    }

    #[test]
    fn bound_is_respected_on_overflow() {
        let mut buffer = ReplayBuffer::new(3);
        for id in 1..=5 {
            buffer.add(notification(id));
        }
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn eviction_is_fifo() {
        let mut buffer = ReplayBuffer::new(3);
        for id in 1..=5 {
            buffer.add(notification(id));
        }
        let ids: Vec<u32> = buffer.iter_from(buffer.front().unwrap()).map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn handles_remain_valid_across_unrelated_inserts() {
        let mut buffer = ReplayBuffer::new(5);
        let h1 = buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        buffer.add(notification(3));
        assert_eq!(buffer.get(h1).unwrap().id, 1);
        assert_eq!(buffer.get(h2).unwrap().id, 2);
    }

    #[test]
    fn remove_relinks_neighbors() {
        let mut buffer = ReplayBuffer::new(5);
        let h1 = buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        let h3 = buffer.add(notification(3));

        buffer.remove(h2);

        assert_eq!(buffer.next(h1), Some(h3));
        assert_eq!(buffer.prev(h3), Some(h1));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn remove_front_updates_head() {
        let mut buffer = ReplayBuffer::new(5);
        let h1 = buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        buffer.remove(h1);
        assert_eq!(buffer.front(), Some(h2));
    }

    #[test]
    fn remove_back_updates_tail() {
        let mut buffer = ReplayBuffer::new(5);
        let h1 = buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        buffer.remove(h2);
        assert_eq!(buffer.back(), Some(h1));
    }

    #[test]
    fn find_by_id_scans_back_to_front() {
        let mut buffer = ReplayBuffer::new(5);
        buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        buffer.add(notification(3));
        assert_eq!(buffer.find_by_id(2), Some(h2));
        assert_eq!(buffer.find_by_id(999), None);
    }

    #[test]
    fn iter_from_is_inclusive_and_ordered() {
        let mut buffer = ReplayBuffer::new(5);
        buffer.add(notification(1));
        let h2 = buffer.add(notification(2));
        buffer.add(notification(3));
        buffer.add(notification(4));

        let ids: Vec<u32> = buffer.iter_from(h2).map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }
}
