//! Length-Type-Value structures.
//!
//! Advertising data and codec-specific configuration share one layout:
//! `[len, type, value...]` where `len` counts the type octet plus the value.
//! A zero length octet ends the sequence early (AD padding).

/// One decoded LTV entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ltv<'a> {
    /// Type octet.
    pub ty: u8,
    /// Value octets (may be empty).
    pub value: &'a [u8],
}

/// Error raised when an LTV sequence is truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LtvTruncated {
    /// Offset of the entry whose length runs past the buffer.
    pub offset: usize,
}

/// Iterator over the entries of an LTV sequence.
///
/// Yields `Err` once for a truncated entry and then stops.
#[derive(Debug, Clone)]
pub struct LtvIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> LtvIter<'a> {
    /// Iterate the entries in `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }
}

impl<'a> Iterator for LtvIter<'a> {
    type Item = Result<Ltv<'a>, LtvTruncated>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.buf.get(self.offset..)?;
        let (&len, body) = rest.split_first()?;
        if len == 0 {
            self.offset = self.buf.len();
            return None;
        }
        let start = self.offset;
        let Some(entry) = body.get(..usize::from(len)) else {
            self.offset = self.buf.len();
            return Some(Err(LtvTruncated { offset: start }));
        };
        self.offset = start.saturating_add(1).saturating_add(usize::from(len));
        let (&ty, value) = entry.split_first()?;
        Some(Ok(Ltv { ty, value }))
    }
}

/// `true` when every entry in `buf` is well formed.
#[must_use]
pub fn is_well_formed(buf: &[u8]) -> bool {
    LtvIter::new(buf).all(|entry| entry.is_ok())
}

/// Value of the first well-formed entry of type `ty`.
#[must_use]
pub fn find(buf: &[u8], ty: u8) -> Option<&[u8]> {
    LtvIter::new(buf)
        .map_while(Result::ok)
        .find(|entry| entry.ty == ty)
        .map(|entry| entry.value)
}

/// Error raised when an entry does not fit the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LtvOverflow;

/// Append-only LTV writer over a fixed-capacity buffer.
#[derive(Debug, Clone, Default)]
pub struct LtvWriter<const N: usize> {
    buf: heapless::Vec<u8, N>,
}

impl<const N: usize> LtvWriter<N> {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
        }
    }

    /// Append one entry. Nothing is written when it does not fit.
    ///
    /// # Errors
    ///
    /// Returns [`LtvOverflow`] if the entry does not fit in the remaining
    /// capacity or its value is longer than 254 octets.
    pub fn push(&mut self, ty: u8, value: &[u8]) -> Result<(), LtvOverflow> {
        let len = u8::try_from(value.len())
            .ok()
            .and_then(|l| l.checked_add(1))
            .ok_or(LtvOverflow)?;
        let needed = value.len().saturating_add(2);
        if self.buf.capacity().saturating_sub(self.buf.len()) < needed {
            return Err(LtvOverflow);
        }
        self.buf.extend_from_slice(&[len, ty]).map_err(|_| LtvOverflow)?;
        self.buf.extend_from_slice(value).map_err(|_| LtvOverflow)
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_inner(self) -> heapless::Vec<u8, N> {
        self.buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn iterates_entries_in_order() {
        let buf = [0x02, 0x01, 0x06, 0x03, 0x16, 0x52, 0x18];
        let entries: Vec<_> = LtvIter::new(&buf).map(Result::unwrap).collect();
        assert_eq!(
            entries,
            [
                Ltv { ty: 0x01, value: &[0x06] },
                Ltv { ty: 0x16, value: &[0x52, 0x18] },
            ]
        );
    }

    #[test]
    fn zero_length_ends_sequence() {
        let buf = [0x02, 0x01, 0x06, 0x00, 0xFF, 0xFF];
        assert_eq!(LtvIter::new(&buf).count(), 1);
    }

    #[test]
    fn truncated_entry_yields_error_once() {
        let buf = [0x02, 0x01, 0x06, 0x05, 0x03, 0x01];
        let mut iter = LtvIter::new(&buf);
        assert!(iter.next().unwrap().is_ok());
        assert_eq!(iter.next(), Some(Err(LtvTruncated { offset: 3 })));
        assert_eq!(iter.next(), None);
        assert!(!is_well_formed(&buf));
    }

    #[test]
    fn find_returns_first_match() {
        let buf = [0x02, 0x09, b'a', 0x02, 0x09, b'b'];
        assert_eq!(find(&buf, 0x09), Some(&b"a"[..]));
        assert_eq!(find(&buf, 0x08), None);
    }

    #[test]
    fn writer_refuses_overflow_without_partial_write() {
        let mut writer = LtvWriter::<5>::new();
        writer.push(0x01, &[0x06]).unwrap();
        assert_eq!(writer.push(0x09, b"ab"), Err(LtvOverflow));
        assert_eq!(writer.as_slice(), &[0x02, 0x01, 0x06]);
    }
}
