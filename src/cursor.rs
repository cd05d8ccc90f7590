use crate::error::DecodeError;

/// Forward-only read position over an instruction buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteCursor { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    /// Consume exactly `N` bytes, or none at all if fewer remain.
    pub fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    /// Step over `count` bytes without looking at them.
    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.ensure(count)?;
        self.position += count;
        Ok(())
    }

    /// Bytes consumed since `start`
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.bytes[start.min(self.position)..self.position]
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::TruncatedStream {
                offset: self.position,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }
}
