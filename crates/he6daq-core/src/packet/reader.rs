use super::error::FormatError;
use super::layout;

pub struct PacketReader<'a> {
    buffer: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    pub fn require_exact_len(&self, expected: usize) -> Result<(), FormatError> {
        if self.buffer.len() != expected {
            return Err(FormatError::LengthMismatch {
                expected,
                actual: self.buffer.len(),
            });
        }
        Ok(())
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], FormatError> {
        self.buffer.get(range.clone()).ok_or(FormatError::TooShort {
            needed: range.end,
            actual: self.buffer.len(),
        })
    }

    pub fn read_u64_be(&self, range: std::ops::Range<usize>) -> Result<u64, FormatError> {
        let bytes = self.read_slice(range)?;
        let word: [u8; layout::WORD_LEN] =
            bytes.try_into().map_err(|_| FormatError::TooShort {
                needed: layout::WORD_LEN,
                actual: bytes.len(),
            })?;
        Ok(u64::from_be_bytes(word))
    }

    pub fn read_header_words(&self) -> Result<[u64; layout::HEADER_WORDS], FormatError> {
        let mut words = [0u64; layout::HEADER_WORDS];
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.read_u64_be(layout::header_word_range(index))?;
        }
        Ok(words)
    }

    /// Read the payload as big-endian words and unpack each word into
    /// samples, most significant byte first.
    pub fn read_payload_samples(&self) -> Result<[i8; layout::PAYLOAD_LEN], FormatError> {
        let payload = self.read_slice(layout::PAYLOAD_RANGE)?;
        let mut samples = [0i8; layout::PAYLOAD_LEN];
        for (chunk, out) in payload
            .chunks_exact(layout::WORD_LEN)
            .zip(samples.chunks_exact_mut(layout::WORD_LEN))
        {
            let mut word = [0u8; layout::WORD_LEN];
            word.copy_from_slice(chunk);
            unpack_word(u64::from_be_bytes(word), out);
        }
        Ok(samples)
    }
}

/// Extract `(word >> shift) & mask`.
pub fn field(word: u64, shift: u32, mask: u64) -> u64 {
    (word >> shift) & mask
}

fn unpack_word(word: u64, out: &mut [i8]) {
    let top = (layout::WORD_LEN - 1) * 8;
    for (jj, sample) in out.iter_mut().enumerate() {
        let shift = (top - jj * 8) as u32;
        *sample = ((word >> shift) & 0xFF) as u8 as i8;
    }
}
