//! Block cache / pointer (C3): an owning buffer abstraction with typed,
//! non-copying-in-spirit views over it.
//!
//! `OwnedBlock` factors block reinterpretation into one type with three
//! view shapes: a single typed value, an array of same-sized elements, and
//! a header followed by an array of entries. Parsing still goes through
//! `FromBytesLE`, so a "view" costs one `Vec<u8>` clone per element rather
//! than a zero-copy transmute — an acceptable trade for a read-only
//! forensic tool that never touches hot paths larger than a few hundred
//! kilobytes at a time.

use crate::byte_iter::FromBytesLE;

/// A decoded, owned block buffer. Move-only by virtue of ordinary Rust
/// ownership: there is no `Clone` impl, so passing one around transfers
/// the buffer rather than duplicating it.
#[derive(Debug)]
pub struct OwnedBlock {
    bytes: Vec<u8>,
}

impl OwnedBlock {
    pub fn new(bytes: Vec<u8>) -> Self {
        OwnedBlock { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Interprets the whole block as a single `T`.
    pub fn as_single<T>(&self) -> Option<T>
    where
        T: FromBytesLE<std::vec::IntoIter<u8>>,
    {
        T::from_bytes_le(&mut self.bytes.clone().into_iter())
    }

    /// Interprets the block as a tightly packed array of `T`, each
    /// `elem_size` bytes. A trailing partial element is dropped.
    pub fn as_array<T>(&self, elem_size: usize) -> Vec<Option<T>>
    where
        T: FromBytesLE<std::vec::IntoIter<u8>>,
    {
        self.bytes
            .chunks(elem_size)
            .filter(|chunk| chunk.len() == elem_size)
            .map(|chunk| T::from_bytes_le(&mut chunk.to_vec().into_iter()))
            .collect()
    }

    /// Interprets the block as a fixed-size header `H` followed by a
    /// tightly packed array of `E`, each `elem_size` bytes.
    pub fn as_header_and_entries<H, E>(
        &self,
        header_size: usize,
        elem_size: usize,
    ) -> Option<(H, Vec<Option<E>>)>
    where
        H: FromBytesLE<std::vec::IntoIter<u8>>,
        E: FromBytesLE<std::vec::IntoIter<u8>>,
    {
        if self.bytes.len() < header_size {
            return None;
        }
        let header = H::from_bytes_le(&mut self.bytes[..header_size].to_vec().into_iter())?;
        let entries = self.bytes[header_size..]
            .chunks(elem_size)
            .filter(|chunk| chunk.len() == elem_size)
            .map(|chunk| E::from_bytes_le(&mut chunk.to_vec().into_iter()))
            .collect();
        Some((header, entries))
    }
}
