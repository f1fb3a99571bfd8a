use std::slice::ChunksExact;

pub trait BytesExt {
    /// Xor self with another slice of bytes of equal length
    fn xor<B: AsRef<[u8]>>(&self, other: B) -> Vec<u8>;

    /// Xor another slice of bytes of equal length into self
    fn xor_assign<B: AsRef<[u8]>>(&mut self, other: B);

    /// The `number`th block of `block_length` bytes. Like slicing, a block that runs past the end
    /// is cut short, and a block that starts past the end is empty.
    fn block(&self, block_length: usize, number: usize) -> &[u8];

    /// `count` consecutive blocks starting at block `number`, or every block from `number` to the
    /// end if `count` is `None`. Clamped to the end of the data.
    fn block_span(&self, block_length: usize, number: usize, count: Option<usize>) -> &[u8];

    /// Iterate over the whole blocks, ignoring a trailing partial block.
    fn blocks(&self, block_length: usize) -> ChunksExact<'_, u8>;
}

fn assert_same_length(a: &[u8], b: &[u8]) {
    assert_eq!(
        a.len(),
        b.len(),
        "Length mismatch: {} != {}",
        a.len(),
        b.len()
    );
}

impl BytesExt for [u8] {
    fn xor<B: AsRef<[u8]>>(&self, other: B) -> Vec<u8> {
        assert_same_length(self, other.as_ref());

        self.iter()
            .zip(other.as_ref().iter())
            .map(|(a, b)| a ^ b)
            .collect()
    }

    fn xor_assign<B: AsRef<[u8]>>(&mut self, other: B) {
        assert_same_length(self, other.as_ref());

        for (a, b) in self.iter_mut().zip(other.as_ref()) {
            *a ^= b;
        }
    }

    fn block(&self, block_length: usize, number: usize) -> &[u8] {
        self.block_span(block_length, number, Some(1))
    }

    fn block_span(&self, block_length: usize, number: usize, count: Option<usize>) -> &[u8] {
        let start = number.saturating_mul(block_length).min(self.len());
        let end = match count {
            Some(count) => (number.saturating_add(count))
                .saturating_mul(block_length)
                .min(self.len()),
            None => self.len(),
        };
        &self[start..end]
    }

    fn blocks(&self, block_length: usize) -> ChunksExact<'_, u8> {
        self.chunks_exact(block_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn test_xor() {
        let a: [u8; 1] = [12];
        let b = [21];
        let expected = [25];

        let actual = a.xor(b);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_xor_assign() {
        let mut a = b"YELLOW".to_vec();
        a.xor_assign([0x20; 6]);

        assert_eq!(a, b"yellow");
    }

    #[test]
    #[should_panic(expected = "Length mismatch")]
    fn test_xor_length_mismatch() {
        let _ = [1u8, 2].xor([1u8]);
    }

    #[rstest]
    #[case(0, Some(1), b"0a")]
    #[case(1, Some(1), b"1b")]
    #[case(1, Some(2), b"1b2c")]
    #[case(3, Some(2), b"3d")]
    #[case(1, None, b"1b2c3d")]
    #[case(4, Some(1), b"")]
    fn test_block_span(#[case] number: usize, #[case] count: Option<usize>, #[case] expected: &[u8]) {
        let text = b"0a1b2c3d";

        assert_eq!(text.block_span(2, number, count), expected);
    }

    #[test]
    fn test_block() {
        let text = b"0a1b2c3";

        assert_eq!(text.block(2, 2), b"2c");
        assert_eq!(text.block(2, 3), b"3");
    }

    #[rstest]
    #[case(b"", 1, vec![])]
    #[case(b"a", 1, vec![b"a".as_slice()])]
    #[case(b"a", 2, vec![])]
    #[case(b"ab", 1, vec![b"a".as_slice(), b"b".as_slice()])]
    fn test_blocks(#[case] data: &[u8], #[case] block_length: usize, #[case] expected: Vec<&[u8]>) {
        assert_eq!(data.blocks(block_length).collect::<Vec<_>>(), expected);
    }
}
