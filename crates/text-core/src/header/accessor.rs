//! Header namespaces and accessors
//!
//! A *header namespace* is the constant operation table of one group of
//! header fields: it knows the field names (a [`StringTable`]), how to build
//! the zero-valued struct that holds decoded values, and how to parse,
//! generate and duplicate each field by id. Namespaces are `static` values
//! implementing [`HeaderNamespace`]; they hold no per-message state.
//!
//! A [`HeaderAccessor`] pairs a namespace with one message's decoded data,
//! allocated lazily on first use.
//!
//! Several accessors can share one [`HeaderSection`] (e.g. a generic
//! namespace and a resource-specific one). They are composed into
//! [`HeaderAccessors`], which assigns each namespace a disjoint id range:
//! the second namespace's ids start after the first one's field count, and
//! so on. Composition fails if two namespaces claim the same header name,
//! so the partitioning never has to be re-checked per call.
//!
//! # Examples
//!
//! ```rust
//! use bytes::Bytes;
//! use rvoip_text_core::prelude::*;
//! use rvoip_text_core::text::parse_size;
//!
//! static FIELDS: StringTable = StringTable::from_static(&[
//!     StringTableEntry::new("Content-Length", 0),
//! ]);
//!
//! struct Basic;
//!
//! impl HeaderNamespace for Basic {
//!     type Data = Option<usize>;
//!
//!     fn name(&self) -> &'static str { "basic" }
//!     fn field_table(&self) -> &StringTable { &FIELDS }
//!     fn allocate(&self) -> Self::Data { None }
//!
//!     fn parse_field(&self, data: &mut Self::Data, _id: FieldId, value: &[u8]) -> Result<()> {
//!         *data = Some(parse_size(value).ok_or_else(|| Error::invalid_value("Content-Length", "not a size"))?);
//!         Ok(())
//!     }
//!
//!     fn generate_field(&self, data: &Self::Data, _id: FieldId) -> Result<Bytes> {
//!         Ok(Bytes::from(data.unwrap_or(0).to_string()))
//!     }
//!
//!     fn duplicate_field(&self, dst: &mut Self::Data, src: &Self::Data, _id: FieldId, _value: &[u8]) -> Result<()> {
//!         *dst = *src;
//!         Ok(())
//!     }
//! }
//!
//! static BASIC: Basic = Basic;
//!
//! let mut accessors = HeaderAccessors::new().with(HeaderAccessor::new(&BASIC))?;
//! let mut section = accessors.new_section();
//! accessors.add_field(&mut section, HeaderField::new("content-length", "42"))?;
//!
//! assert!(section.has(0));
//! let basic = accessors.accessor::<Basic>().unwrap();
//! assert_eq!(basic.data(), Some(&Some(42)));
//! # Ok::<(), rvoip_text_core::Error>(())
//! ```

use std::any::Any;
use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::string_table::StringTable;

use super::field::{FieldId, HeaderField};
use super::section::{FieldHandle, HeaderSection};

/// Constant operation table of one header namespace
pub trait HeaderNamespace: Send + Sync + 'static {
    /// Decoded values of every field in the namespace. Cloned along with
    /// the message that owns it.
    type Data: Clone + Send + 'static;

    /// Namespace name, used in diagnostics and to match accessors across chains
    fn name(&self) -> &'static str;

    /// Field names; a field's id is its index in this table
    fn field_table(&self) -> &StringTable;

    /// Number of field ids this namespace occupies
    fn field_count(&self) -> usize {
        self.field_table().len()
    }

    /// Builds the zero-valued data struct
    fn allocate(&self) -> Self::Data;

    /// Releases anything the data struct owns outside of itself. Runs when
    /// the accessor is dropped; most namespaces need nothing here.
    fn destroy(&self, _data: &mut Self::Data) {}

    /// Decodes one field. Must accept an empty value for fields whose
    /// presence alone is meaningful.
    fn parse_field(&self, data: &mut Self::Data, id: FieldId, value: &[u8]) -> Result<()>;

    /// Encodes one field back to text
    fn generate_field(&self, data: &Self::Data, id: FieldId) -> Result<Bytes>;

    /// Copies one field's decoded value from another accessor of the same
    /// namespace. `value` is the field's text, for namespaces that prefer to
    /// re-parse.
    fn duplicate_field(&self, dst: &mut Self::Data, src: &Self::Data, id: FieldId, value: &[u8]) -> Result<()>;
}

/// A namespace plus one message's lazily allocated decoded data
pub struct HeaderAccessor<N: HeaderNamespace> {
    namespace: &'static N,
    data: Option<N::Data>,
}

impl<N: HeaderNamespace> HeaderAccessor<N> {
    pub fn new(namespace: &'static N) -> Self {
        Self { namespace, data: None }
    }

    pub fn namespace(&self) -> &'static N {
        self.namespace
    }

    /// Decoded data, if anything has been parsed or allocated yet
    pub fn data(&self) -> Option<&N::Data> {
        self.data.as_ref()
    }

    /// Decoded data, allocating it on first use
    pub fn data_mut(&mut self) -> &mut N::Data {
        let namespace = self.namespace;
        self.data.get_or_insert_with(|| namespace.allocate())
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    fn resolve_and_parse_at(&mut self, field: &mut HeaderField, offset: FieldId) -> Result<bool> {
        let namespace = self.namespace;
        let Some(local) = namespace.field_table().find(field.name()) else {
            return Ok(false);
        };
        field.set_id(Some(offset + local));
        if !field.value().is_empty() {
            namespace.parse_field(self.data_mut(), local, field.value())?;
        } else {
            // presence alone still needs somewhere to live
            self.data_mut();
        }
        Ok(true)
    }

    /// Looks the field's name up in this namespace. On a hit the field gets
    /// its id and a non-empty value is decoded; `Ok(false)` means the name
    /// belongs to some other namespace. A decode failure leaves the id set.
    pub fn resolve_and_parse(&mut self, field: &mut HeaderField) -> Result<bool> {
        self.resolve_and_parse_at(field, 0)
    }

    /// Builds a field named from the table whose value is either empty or
    /// generated from the decoded data
    pub fn generate_field(&mut self, id: FieldId, empty: bool) -> Result<HeaderField> {
        let namespace = self.namespace;
        let name = namespace
            .field_table()
            .get(id)
            .ok_or(Error::UnknownFieldId { namespace: namespace.name(), id })?;
        let value = if empty {
            Bytes::new()
        } else {
            namespace.generate_field(self.data_mut(), id)?
        };
        Ok(HeaderField::with_id(name, value, id))
    }

    /// Copies one field's decoded value from `src`
    pub fn duplicate_field(&mut self, src: &HeaderAccessor<N>, id: FieldId, value: &[u8]) -> Result<()> {
        let namespace = self.namespace;
        if id >= namespace.field_count() {
            return Err(Error::UnknownFieldId { namespace: namespace.name(), id });
        }
        match src.data() {
            Some(src_data) => namespace.duplicate_field(self.data_mut(), src_data, id, value),
            None if value.is_empty() => {
                self.data_mut();
                Ok(())
            }
            None => namespace.parse_field(self.data_mut(), id, value),
        }
    }
}

impl<N: HeaderNamespace> Drop for HeaderAccessor<N> {
    fn drop(&mut self) {
        if let Some(data) = self.data.as_mut() {
            self.namespace.destroy(data);
        }
    }
}

impl<N: HeaderNamespace> Clone for HeaderAccessor<N> {
    fn clone(&self) -> Self {
        Self { namespace: self.namespace, data: self.data.clone() }
    }
}

impl<N: HeaderNamespace> fmt::Debug for HeaderAccessor<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderAccessor")
            .field("namespace", &self.namespace.name())
            .field("allocated", &self.data.is_some())
            .finish()
    }
}

/// Type-erased view of a [`HeaderAccessor`], so namespaces with different
/// data types can share one chain
pub trait FieldAccessor: Any + Send {
    fn namespace_name(&self) -> &'static str;

    fn field_table(&self) -> &StringTable;

    fn field_count(&self) -> usize;

    /// Resolves against this namespace, assigning `offset + local id`
    fn resolve_and_parse_at(&mut self, field: &mut HeaderField, offset: FieldId) -> Result<bool>;

    /// Generates a field by local id (the returned field carries the local id)
    fn generate_local(&mut self, id: FieldId, empty: bool) -> Result<HeaderField>;

    /// Copies a field's decoded value from an accessor of the same namespace
    fn duplicate_from(&mut self, src: &dyn FieldAccessor, id: FieldId, value: &[u8]) -> Result<()>;

    /// Copy of this accessor, decoded data included
    fn clone_boxed(&self) -> Box<dyn FieldAccessor>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<N: HeaderNamespace> FieldAccessor for HeaderAccessor<N> {
    fn namespace_name(&self) -> &'static str {
        self.namespace.name()
    }

    fn field_table(&self) -> &StringTable {
        self.namespace.field_table()
    }

    fn field_count(&self) -> usize {
        self.namespace.field_count()
    }

    fn resolve_and_parse_at(&mut self, field: &mut HeaderField, offset: FieldId) -> Result<bool> {
        HeaderAccessor::resolve_and_parse_at(self, field, offset)
    }

    fn generate_local(&mut self, id: FieldId, empty: bool) -> Result<HeaderField> {
        self.generate_field(id, empty)
    }

    fn duplicate_from(&mut self, src: &dyn FieldAccessor, id: FieldId, value: &[u8]) -> Result<()> {
        let src = src
            .as_any()
            .downcast_ref::<HeaderAccessor<N>>()
            .ok_or(Error::NamespaceMismatch {
                expected: self.namespace.name(),
                found: src.namespace_name(),
            })?;
        self.duplicate_field(src, id, value)
    }

    fn clone_boxed(&self) -> Box<dyn FieldAccessor> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Member {
    offset: FieldId,
    accessor: Box<dyn FieldAccessor>,
}

impl Clone for Member {
    fn clone(&self) -> Self {
        Self { offset: self.offset, accessor: self.accessor.clone_boxed() }
    }
}

/// Ordered chain of accessors sharing one header section, each owning a
/// disjoint id range
#[derive(Default, Clone)]
pub struct HeaderAccessors {
    members: Vec<Member>,
    total: usize,
}

impl fmt::Debug for HeaderAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for member in &self.members {
            list.entry(&(member.accessor.namespace_name(), member.offset, member.accessor.field_count()));
        }
        list.finish()
    }
}

impl HeaderAccessors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Self::push)
    pub fn with<A: FieldAccessor>(mut self, accessor: A) -> Result<Self> {
        self.push(Box::new(accessor))?;
        Ok(self)
    }

    /// Appends a namespace and returns the first id of its range.
    ///
    /// Fails if the namespace is already in the chain or if any of its header
    /// names is claimed by a namespace already in the chain.
    pub fn push(&mut self, accessor: Box<dyn FieldAccessor>) -> Result<FieldId> {
        let second = accessor.namespace_name();
        for member in &self.members {
            let first = member.accessor.namespace_name();
            if first == second {
                return Err(Error::DuplicateNamespace(second));
            }
            if let Some((_, name)) = accessor
                .field_table()
                .iter()
                .find(|(_, name)| member.accessor.field_table().find(name.as_bytes()).is_some())
            {
                return Err(Error::NamespaceCollision { name: name.to_string(), first, second });
            }
        }

        let offset = self.total;
        self.total += accessor.field_count();
        debug!("header namespace '{}' owns ids {}..{}", second, offset, self.total);
        self.members.push(Member { offset, accessor });
        Ok(offset)
    }

    /// Total number of ids across the chain; the id array size for sections
    pub fn field_count(&self) -> usize {
        self.total
    }

    /// Empty section whose id array covers every namespace in the chain
    pub fn new_section(&self) -> HeaderSection {
        HeaderSection::with_array(self.total)
    }

    /// First id of the named namespace's range
    pub fn offset_of(&self, namespace: &str) -> Option<FieldId> {
        self.members
            .iter()
            .find(|member| member.accessor.namespace_name() == namespace)
            .map(|member| member.offset)
    }

    /// Typed access to one namespace's accessor
    pub fn accessor<N: HeaderNamespace>(&self) -> Option<&HeaderAccessor<N>> {
        self.members
            .iter()
            .find_map(|member| member.accessor.as_any().downcast_ref::<HeaderAccessor<N>>())
    }

    /// Typed mutable access to one namespace's accessor
    pub fn accessor_mut<N: HeaderNamespace>(&mut self) -> Option<&mut HeaderAccessor<N>> {
        self.members
            .iter_mut()
            .find_map(|member| member.accessor.as_any_mut().downcast_mut::<HeaderAccessor<N>>())
    }

    fn locate(&self, id: FieldId) -> Option<(usize, FieldId)> {
        self.members.iter().enumerate().find_map(|(index, member)| {
            let local = id.checked_sub(member.offset)?;
            (local < member.accessor.field_count()).then_some((index, local))
        })
    }

    /// Header name of a chain-wide id
    pub fn name_of(&self, id: FieldId) -> Option<&'static str> {
        let (index, local) = self.locate(id)?;
        self.members[index].accessor.field_table().get(local)
    }

    /// Chain-wide id of a header name
    pub fn id_of(&self, name: &[u8]) -> Option<FieldId> {
        self.members
            .iter()
            .find_map(|member| member.accessor.field_table().find(name).map(|local| member.offset + local))
    }

    /// Tries each namespace in order. `Ok(false)` means no namespace knows
    /// the name and the field stays unresolved.
    pub fn resolve_and_parse(&mut self, field: &mut HeaderField) -> Result<bool> {
        for member in &mut self.members {
            if member.accessor.resolve_and_parse_at(field, member.offset)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolves and decodes `field`, then adds it to `section`.
    ///
    /// Unknown fields are added unresolved. A field whose value fails to
    /// decode, or whose id is already present, is rejected.
    pub fn add_field(&mut self, section: &mut HeaderSection, mut field: HeaderField) -> Result<FieldHandle> {
        // an occupied slot must not let the rejected value reach the decoded data
        if let Some(id) = self.id_of(field.name()) {
            if section.has(id) {
                return Err(Error::FieldOccupied { id });
            }
        }
        self.resolve_and_parse(&mut field)?;
        section.add(field)
    }

    /// Second pass over fields that were added without resolution (for
    /// example by a parser that did not know the namespaces yet). Returns the
    /// number of newly resolved fields.
    pub fn resolve_section(&mut self, section: &mut HeaderSection) -> usize {
        let mut resolved = 0;
        for handle in section.handles() {
            let Some(field) = section.get(handle) else { continue };
            if field.is_resolved() {
                continue;
            }
            let Some(id) = self.id_of(field.name()) else { continue };
            if section.has(id) {
                warn!("header field '{}' repeats id {}, left unresolved", field, id);
                continue;
            }
            let mut probe = field.clone();
            if let Err(err) = self.resolve_and_parse(&mut probe) {
                warn!("header field '{}' failed to decode: {}", probe, err);
                continue;
            }
            match section.resolve(handle, id) {
                Ok(()) => resolved += 1,
                Err(err) => warn!("header field '{}' not recorded: {}", probe, err),
            }
        }
        resolved
    }

    /// Builds a field for a chain-wide id with an empty or generated value
    pub fn generate_field(&mut self, id: FieldId, empty: bool) -> Result<HeaderField> {
        let (index, local) = self
            .locate(id)
            .ok_or(Error::UnknownFieldId { namespace: "*", id })?;
        let mut field = self.members[index].accessor.generate_local(local, empty)?;
        field.set_id(Some(id));
        Ok(field)
    }

    /// Generates a field from decoded data and inserts it in id order,
    /// replacing any field already recorded under `id`
    pub fn add_property(&mut self, section: &mut HeaderSection, id: FieldId, empty: bool) -> Result<FieldHandle> {
        let field = self.generate_field(id, empty)?;
        section.remove_by_id(id);
        section.insert(field)
    }

    /// Re-encodes every resolved field in `section` from the decoded data
    pub fn generate_section(&mut self, section: &mut HeaderSection) -> Result<()> {
        for handle in section.handles() {
            let Some(id) = section.get(handle).and_then(HeaderField::id) else { continue };
            if self.locate(id).is_none() {
                continue;
            }
            let value = Bytes::copy_from_slice(self.generate_field(id, false)?.value());
            section.set_value(handle, value)?;
        }
        Ok(())
    }

    /// Maps a chain-wide id of `src` to `(src member, dst member, local id,
    /// dst chain-wide id)`, matching namespaces by name
    fn translate(&self, src: &HeaderAccessors, src_id: FieldId) -> Option<(usize, usize, FieldId, FieldId)> {
        let (src_index, local) = src.locate(src_id)?;
        let namespace = src.members[src_index].accessor.namespace_name();
        let (dst_index, dst) = self
            .members
            .iter()
            .enumerate()
            .find(|(_, member)| member.accessor.namespace_name() == namespace)?;
        Some((src_index, dst_index, local, dst.offset + local))
    }

    fn duplicate(
        &mut self,
        src: &HeaderAccessors,
        field: &HeaderField,
    ) -> Result<Option<HeaderField>> {
        let Some(src_id) = field.id() else { return Ok(None) };
        let Some((src_index, dst_index, local, dst_id)) = self.translate(src, src_id) else {
            return Ok(None);
        };
        self.members[dst_index]
            .accessor
            .duplicate_from(src.members[src_index].accessor.as_ref(), local, field.value())?;
        let mut copy = field.clone();
        copy.set_id(Some(dst_id));
        Ok(Some(copy))
    }

    /// Copies every field of `src_section` into `dst`, replacing fields with
    /// the same id. Unresolved fields are copied when `dst` has no field of
    /// that name. Returns the number of copied fields.
    pub fn fields_set(
        &mut self,
        dst: &mut HeaderSection,
        src: &HeaderAccessors,
        src_section: &HeaderSection,
    ) -> Result<usize> {
        let mut copied = 0;
        for field in src_section {
            if !field.is_resolved() {
                if dst.find_by_name(field.name()).is_none() {
                    dst.add(field.clone())?;
                    copied += 1;
                }
                continue;
            }
            if let Some(copy) = self.duplicate(src, field)? {
                if let Some(id) = copy.id() {
                    dst.remove_by_id(id);
                }
                dst.insert(copy)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Mirrors `template` into `dst`: fields present in `src_section` are
    /// duplicated with their value, the rest are added with an empty value.
    /// Returns the number of fields added.
    pub fn fields_get(
        &mut self,
        dst: &mut HeaderSection,
        template: &HeaderSection,
        src: &HeaderAccessors,
        src_section: &HeaderSection,
    ) -> Result<usize> {
        let mut added = 0;
        for wanted in template {
            let Some(id) = wanted.id() else { continue };
            let Some(name) = self.name_of(id) else { continue };
            let present = src
                .id_of(name.as_bytes())
                .and_then(|src_id| src_section.field_at(src_id));
            let field = match present {
                Some(field) => self.duplicate(src, field)?,
                None => Some(self.generate_field(id, true)?),
            };
            if let Some(field) = field {
                if let Some(id) = field.id() {
                    dst.remove_by_id(id);
                }
                dst.insert(field)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Copies only the resolved fields of `src_section` that `dst` lacks.
    /// Returns the number of copied fields.
    pub fn fields_inherit(
        &mut self,
        dst: &mut HeaderSection,
        src: &HeaderAccessors,
        src_section: &HeaderSection,
    ) -> Result<usize> {
        let mut copied = 0;
        for field in src_section {
            let Some(src_id) = field.id() else { continue };
            let Some((_, _, _, dst_id)) = self.translate(src, src_id) else { continue };
            if dst.has(dst_id) {
                continue;
            }
            if let Some(copy) = self.duplicate(src, field)? {
                dst.add(copy)?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}
