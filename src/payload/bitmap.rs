//! Compressed line bitmaps carried in payloads.

use std::io::Cursor;

use roaring::RoaringBitmap;

use crate::error::{PilumError, Result};

/// Set of line numbers a token occurs on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineBitmap {
    lines: RoaringBitmap,
}

impl LineBitmap {
    /// Create an empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bitmap from line numbers.
    pub fn from_lines<I: IntoIterator<Item = u32>>(lines: I) -> Self {
        LineBitmap {
            lines: lines.into_iter().collect(),
        }
    }

    /// Add a line.
    pub fn insert(&mut self, line: u32) -> bool {
        self.lines.insert(line)
    }

    /// Check if a line is set.
    pub fn contains(&self, line: u32) -> bool {
        self.lines.contains(line)
    }

    /// Number of lines set.
    pub fn len(&self) -> u64 {
        self.lines.len()
    }

    /// Check if no line is set.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Smallest line set.
    pub fn first(&self) -> Option<u32> {
        self.lines.min()
    }

    /// Lines in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter()
    }

    /// Lines as a vector.
    pub fn to_vec(&self) -> Vec<u32> {
        self.lines.iter().collect()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Serialize into payload bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.lines.serialized_size());
        self.lines.serialize_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Deserialize payload bytes. An empty payload is an empty bitmap.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let lines = RoaringBitmap::deserialize_from(Cursor::new(bytes))
            .map_err(|e| PilumError::payload(format!("invalid line bitmap: {e}")))?;
        Ok(LineBitmap { lines })
    }

    /// Lines set in both bitmaps.
    pub fn and(&self, other: &LineBitmap) -> LineBitmap {
        LineBitmap {
            lines: &self.lines & &other.lines,
        }
    }

    /// Lines set in every bitmap. No bitmaps yields an empty result.
    pub fn and_all(bitmaps: &[LineBitmap]) -> LineBitmap {
        let Some((first, rest)) = bitmaps.split_first() else {
            return LineBitmap::new();
        };
        let mut lines = first.lines.clone();
        for bitmap in rest {
            if lines.is_empty() {
                break;
            }
            lines &= &bitmap.lines;
        }
        LineBitmap { lines }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_of_two_terms() {
        let a = LineBitmap::from_lines([1, 2, 5]);
        let b = LineBitmap::from_lines([2, 5, 9]);
        assert_eq!(a.and(&b).to_vec(), vec![2, 5]);
        assert_eq!(LineBitmap::and_all(&[a, b]).to_vec(), vec![2, 5]);
    }

    #[test]
    fn test_and_all_edge_cases() {
        assert!(LineBitmap::and_all(&[]).is_empty());

        let a = LineBitmap::from_lines([3, 4]);
        assert_eq!(LineBitmap::and_all(std::slice::from_ref(&a)), a);

        let empty = LineBitmap::new();
        assert!(LineBitmap::and_all(&[a, empty]).is_empty());
    }

    #[test]
    fn test_serialization() {
        let bitmap = LineBitmap::from_lines([0, 7, 1000, 70_000]);
        let bytes = bitmap.to_bytes().unwrap();
        let decoded = LineBitmap::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, bitmap);
        assert_eq!(decoded.first(), Some(0));
        assert_eq!(decoded.len(), 4);

        assert!(LineBitmap::from_bytes(&[]).unwrap().is_empty());
        assert!(LineBitmap::from_bytes(&[0xde, 0xad]).is_err());
    }
}
