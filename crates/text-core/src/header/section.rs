//! Ordered header section with O(1) lookup by field id
//!
//! A [`HeaderSection`] keeps every field in wire order (a doubly-linked list
//! threaded through a slot vector, so insertion anywhere and removal are
//! O(1)) and, in parallel, an id-indexed array for O(1) presence checks and
//! lookups.
//!
//! Invariant: every field reachable through the array is also reachable in
//! order; the reverse need not hold. A field stays order-only when its id is
//! unresolved, outside the array, or the array was never allocated.
//!
//! When several header namespaces share one section, the array size must be
//! the sum of their field counts; see [`HeaderAccessors`].
//!
//! [`HeaderAccessors`]: super::HeaderAccessors

use tracing::trace;

use crate::error::{Error, Result};

use super::field::{FieldId, HeaderField};

/// Stable reference to a field inside one [`HeaderSection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node {
    field: HeaderField,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Ordered collection of the header fields of one message
#[derive(Debug, Clone, Default)]
pub struct HeaderSection {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    by_id: Vec<Option<usize>>,
    len: usize,
}

impl HeaderSection {
    /// Empty section without an id array
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty section with an id array for `max_ids` ids
    pub fn with_array(max_ids: usize) -> Self {
        let mut section = Self::new();
        section.alloc_array(max_ids);
        section
    }

    /// Allocates a zero-filled id array sized for every namespace that will
    /// use this section. Existing fields stay order-only until [`set`].
    ///
    /// [`set`]: HeaderSection::set
    pub fn alloc_array(&mut self, max_ids: usize) {
        self.by_id = vec![None; max_ids];
    }

    /// Size of the id array
    pub fn array_size(&self) -> usize {
        self.by_id.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, index: usize) -> &Node {
        self.slots[index].node.as_ref().expect("linked index refers to a live node")
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        self.slots[index].node.as_mut().expect("linked index refers to a live node")
    }

    fn index_of(&self, handle: FieldHandle) -> Result<usize> {
        match self.slots.get(handle.index) {
            Some(slot) if slot.generation == handle.generation && slot.node.is_some() => Ok(handle.index),
            _ => Err(Error::StaleHandle(handle.index)),
        }
    }

    fn handle(&self, index: usize) -> FieldHandle {
        FieldHandle { index, generation: self.slots[index].generation }
    }

    /// Fails if the field's id is in range and its slot is taken
    fn check_slot(&self, field: &HeaderField) -> Result<Option<FieldId>> {
        match field.id() {
            Some(id) if id < self.by_id.len() => {
                if self.by_id[id].is_some() {
                    return Err(Error::FieldOccupied { id });
                }
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    fn alloc_node(&mut self, field: HeaderField) -> usize {
        let node = Node { field, prev: None, next: None };
        match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                self.slots.len() - 1
            }
        }
    }

    fn link_before(&mut self, index: usize, before: Option<usize>) {
        let prev = match before {
            Some(next) => self.node(next).prev,
            None => self.tail,
        };
        {
            let node = self.node_mut(index);
            node.prev = prev;
            node.next = before;
        }
        match prev {
            Some(prev) => self.node_mut(prev).next = Some(index),
            None => self.head = Some(index),
        }
        match before {
            Some(next) => self.node_mut(next).prev = Some(index),
            None => self.tail = Some(index),
        }
        self.len += 1;
    }

    fn unlink(&mut self, index: usize) -> HeaderField {
        let node = self.slots[index].node.take().expect("linked index refers to a live node");
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        node.field
    }

    /// Appends a field at the end.
    ///
    /// Fails without touching the section if the field's id slot is already
    /// occupied; use [`insert`](Self::insert) after removing the old field
    /// to replace one.
    pub fn add(&mut self, field: HeaderField) -> Result<FieldHandle> {
        let slot = self.check_slot(&field)?;
        let index = self.alloc_node(field);
        self.link_before(index, None);
        if let Some(id) = slot {
            self.by_id[id] = Some(index);
        }
        Ok(self.handle(index))
    }

    /// Like [`add`](Self::add), but places an in-range field before the first
    /// field with a greater id (unresolved fields count as greater), keeping
    /// resolved fields in ascending id order. Other fields go to the end.
    pub fn insert(&mut self, field: HeaderField) -> Result<FieldHandle> {
        let slot = self.check_slot(&field)?;
        let before = match slot {
            Some(id) => {
                let mut cursor = self.head;
                while let Some(index) = cursor {
                    let node = self.node(index);
                    if node.field.id().map_or(true, |other| id < other) {
                        break;
                    }
                    cursor = node.next;
                }
                cursor
            }
            None => None,
        };
        let index = self.alloc_node(field);
        self.link_before(index, before);
        if let Some(id) = slot {
            self.by_id[id] = Some(index);
        }
        Ok(self.handle(index))
    }

    /// Records an existing member in the id array (second-pass resolution).
    pub fn set(&mut self, handle: FieldHandle) -> Result<()> {
        let index = self.index_of(handle)?;
        let field = &self.node(index).field;
        let id = field
            .id()
            .ok_or_else(|| Error::UnresolvedField(String::from_utf8_lossy(field.name()).into_owned()))?;
        if id >= self.by_id.len() {
            return Err(Error::FieldIdOutOfRange { id, size: self.by_id.len() });
        }
        match self.by_id[id] {
            Some(existing) if existing != index => Err(Error::FieldOccupied { id }),
            _ => {
                self.by_id[id] = Some(index);
                Ok(())
            }
        }
    }

    /// Assigns an id to a member and records it in the id array
    pub fn resolve(&mut self, handle: FieldHandle, id: FieldId) -> Result<()> {
        let index = self.index_of(handle)?;
        if id < self.by_id.len() && matches!(self.by_id[id], Some(existing) if existing != index) {
            return Err(Error::FieldOccupied { id });
        }
        if let Some(old) = self.node(index).field.id() {
            if self.by_id.get(old) == Some(&Some(index)) {
                self.by_id[old] = None;
            }
        }
        self.node_mut(index).field.set_id(Some(id));
        if id < self.by_id.len() {
            self.by_id[id] = Some(index);
        }
        Ok(())
    }

    /// Removes a member, clearing its id slot
    pub fn remove(&mut self, handle: FieldHandle) -> Option<HeaderField> {
        let index = self.index_of(handle).ok()?;
        if let Some(id) = self.node(index).field.id() {
            if self.by_id.get(id) == Some(&Some(index)) {
                self.by_id[id] = None;
            }
        }
        let field = self.unlink(index);
        trace!("removed header field {}", field);
        Some(field)
    }

    /// Removes the field recorded under `id`
    pub fn remove_by_id(&mut self, id: FieldId) -> Option<HeaderField> {
        let handle = self.handle_at(id)?;
        self.remove(handle)
    }

    /// Removes every field; the id array keeps its size
    pub fn clear(&mut self) {
        let size = self.by_id.len();
        *self = Self::with_array(size);
    }

    /// Field recorded under `id`
    pub fn field_at(&self, id: FieldId) -> Option<&HeaderField> {
        let index = (*self.by_id.get(id)?)?;
        Some(&self.node(index).field)
    }

    /// Handle of the field recorded under `id`
    pub fn handle_at(&self, id: FieldId) -> Option<FieldHandle> {
        let index = (*self.by_id.get(id)?)?;
        Some(self.handle(index))
    }

    /// True if a field is recorded under `id`
    pub fn has(&self, id: FieldId) -> bool {
        matches!(self.by_id.get(id), Some(Some(_)))
    }

    pub fn get(&self, handle: FieldHandle) -> Option<&HeaderField> {
        let index = self.index_of(handle).ok()?;
        Some(&self.node(index).field)
    }

    /// Replaces a member's value
    pub fn set_value(&mut self, handle: FieldHandle, value: impl Into<bytes::Bytes>) -> Result<()> {
        let index = self.index_of(handle)?;
        self.node_mut(index).field.set_value(value);
        Ok(())
    }

    /// Appends folded content to a member's value
    pub fn append_value(&mut self, handle: FieldHandle, more: &[u8]) -> Result<()> {
        let index = self.index_of(handle)?;
        self.node_mut(index).field.append_value(more);
        Ok(())
    }

    /// First field named `name` (case-insensitive), resolved or not
    pub fn find_by_name(&self, name: &[u8]) -> Option<&HeaderField> {
        self.iter().find(|field| field.name_eq(name))
    }

    /// Handles of every field, in order
    pub fn handles(&self) -> Vec<FieldHandle> {
        let mut handles = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            handles.push(self.handle(index));
            cursor = self.node(index).next;
        }
        handles
    }

    /// Fields in order
    pub fn iter(&self) -> Iter<'_> {
        Iter { section: self, next: self.head }
    }

    /// Copies fields from `src` that this section lacks: resolved fields whose
    /// id slot is empty here, and unresolved fields whose name is not present.
    /// Returns the number of copied fields.
    pub fn inherit(&mut self, src: &HeaderSection) -> usize {
        let mut copied = 0;
        for field in src.iter() {
            let missing = match field.id() {
                Some(id) => !self.has(id) && id < self.by_id.len(),
                None => self.find_by_name(field.name()).is_none(),
            };
            if missing && self.add(field.clone()).is_ok() {
                copied += 1;
            }
        }
        copied
    }
}

impl<'a> IntoIterator for &'a HeaderSection {
    type Item = &'a HeaderField;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a section's fields in order
pub struct Iter<'a> {
    section: &'a HeaderSection,
    next: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HeaderField;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let node = self.section.node(index);
        self.next = node.next;
        Some(&node.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(section: &HeaderSection) -> Vec<String> {
        section
            .iter()
            .map(|f| String::from_utf8_lossy(f.name()).into_owned())
            .collect()
    }

    fn assert_consistent(section: &HeaderSection) {
        for id in 0..section.array_size() {
            if let Some(field) = section.field_at(id) {
                assert_eq!(field.id(), Some(id));
                assert!(section.iter().any(|f| std::ptr::eq(f, field)));
            }
        }
        assert_eq!(section.iter().count(), section.len());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut section = HeaderSection::with_array(4);
        section.add(HeaderField::with_id("B", "1", 1)).unwrap();
        section.add(HeaderField::new("X-Unknown", "v")).unwrap();
        section.add(HeaderField::with_id("A", "0", 0)).unwrap();

        assert_eq!(names(&section), vec!["B", "X-Unknown", "A"]);
        assert!(section.has(0));
        assert!(section.has(1));
        assert!(!section.has(2));
        assert!(!section.has(99));
        assert_eq!(section.field_at(1).unwrap().value(), b"1");
        assert_consistent(&section);
    }

    #[test]
    fn test_add_rejects_occupied_slot() {
        let mut section = HeaderSection::with_array(2);
        section.add(HeaderField::with_id("A", "first", 0)).unwrap();
        let err = section.add(HeaderField::with_id("A", "second", 0)).unwrap_err();
        assert!(matches!(err, Error::FieldOccupied { id: 0 }));
        assert_eq!(section.len(), 1);
        assert_eq!(section.field_at(0).unwrap().value(), b"first");
    }

    #[test]
    fn test_out_of_range_id_is_order_only() {
        let mut section = HeaderSection::with_array(2);
        section.add(HeaderField::with_id("Far", "v", 10)).unwrap();
        section.add(HeaderField::with_id("Far", "w", 10)).unwrap();
        assert_eq!(section.len(), 2);
        assert!(!section.has(10));
        assert_consistent(&section);
    }

    #[test]
    fn test_insert_keeps_id_order() {
        let mut section = HeaderSection::with_array(8);
        section.insert(HeaderField::with_id("F5", "", 5)).unwrap();
        section.insert(HeaderField::with_id("F1", "", 1)).unwrap();
        section.insert(HeaderField::new("U1", "")).unwrap();
        section.insert(HeaderField::with_id("F3", "", 3)).unwrap();
        section.insert(HeaderField::new("U2", "")).unwrap();
        section.insert(HeaderField::with_id("F7", "", 7)).unwrap();

        assert_eq!(names(&section), vec!["F1", "F3", "F5", "F7", "U1", "U2"]);
        assert_consistent(&section);
    }

    #[test]
    fn test_remove() {
        let mut section = HeaderSection::with_array(4);
        let a = section.add(HeaderField::with_id("A", "", 0)).unwrap();
        let b = section.add(HeaderField::with_id("B", "", 1)).unwrap();
        let c = section.add(HeaderField::with_id("C", "", 2)).unwrap();

        assert_eq!(section.remove(b).unwrap().name(), b"B");
        assert!(!section.has(1));
        assert_eq!(names(&section), vec!["A", "C"]);

        // stale handles stay stale even after the slot is reused
        assert!(section.remove(b).is_none());
        let d = section.add(HeaderField::with_id("D", "", 1)).unwrap();
        assert!(section.get(b).is_none());
        assert_eq!(section.get(d).unwrap().name(), b"D");

        section.remove(a);
        section.remove(c);
        assert_eq!(names(&section), vec!["D"]);
        assert_eq!(section.remove_by_id(1).unwrap().name(), b"D");
        assert!(section.is_empty());
        assert_consistent(&section);
    }

    #[test]
    fn test_set_and_resolve() {
        let mut section = HeaderSection::new();
        let handle = section.add(HeaderField::new("Late", "v")).unwrap();
        section.alloc_array(4);
        assert!(matches!(section.set(handle), Err(Error::UnresolvedField(_))));

        section.resolve(handle, 2).unwrap();
        assert!(section.has(2));
        assert_eq!(section.field_at(2).unwrap().name(), b"Late");

        let other = section.add(HeaderField::new("Other", "w")).unwrap();
        assert!(matches!(section.resolve(other, 2), Err(Error::FieldOccupied { id: 2 })));
        section.resolve(other, 3).unwrap();
        section.set(other).unwrap();
        assert_consistent(&section);
    }

    #[test]
    fn test_values_and_names() {
        let mut section = HeaderSection::new();
        let handle = section.add(HeaderField::new("Content-Type", "text/")).unwrap();
        section.append_value(handle, b"plain").unwrap();
        assert_eq!(section.find_by_name(b"content-type").unwrap().value(), b"text/plain");
        section.set_value(handle, "application/ssml+xml").unwrap();
        assert_eq!(section.get(handle).unwrap().value(), b"application/ssml+xml");
    }

    #[test]
    fn test_inherit() {
        let mut src = HeaderSection::with_array(4);
        src.add(HeaderField::with_id("A", "src", 0)).unwrap();
        src.add(HeaderField::with_id("B", "src", 1)).unwrap();
        src.add(HeaderField::new("X-Extra", "src")).unwrap();

        let mut dst = HeaderSection::with_array(4);
        dst.add(HeaderField::with_id("A", "dst", 0)).unwrap();

        assert_eq!(dst.inherit(&src), 2);
        assert_eq!(dst.field_at(0).unwrap().value(), b"dst");
        assert_eq!(dst.field_at(1).unwrap().value(), b"src");
        assert_eq!(names(&dst), vec!["A", "B", "X-Extra"]);
        assert_eq!(dst.inherit(&src), 0);
    }

    #[test]
    fn test_clear() {
        let mut section = HeaderSection::with_array(3);
        section.add(HeaderField::with_id("A", "", 0)).unwrap();
        section.clear();
        assert!(section.is_empty());
        assert_eq!(section.array_size(), 3);
        assert!(!section.has(0));
    }
}
