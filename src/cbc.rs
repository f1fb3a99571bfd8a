//! Attacks on CBC: plaintext recovery through a padding oracle, and bit-flipping.
//!
//! CBC decryption computes `P_i = D(C_i) ^ C_{i-1}`, with the IV standing in for `C_{-1}`. The
//! attacker can't compute `D`, but owns `C_{i-1}`: XOR-ing a byte of it XORs the same byte of
//! `P_i`, and only scrambles `P_{i-1}`, which nobody checks.

use tracing::{debug, info, trace};

use crate::{
    error::{malformed, Error, Result},
    hex::Hex,
    oracle::{CommentOracle, PaddingOracle},
};

/// What the padding oracle attack needs: a ciphertext and its IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    block_length: usize,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl Params {
    /// Fails unless `block_length` fits a PKCS#7 padding byte, the IV is one block and the
    /// ciphertext is made of whole blocks.
    pub fn new(
        block_length: usize,
        iv: impl Into<Vec<u8>>,
        ciphertext: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let iv = iv.into();
        let ciphertext = ciphertext.into();

        if !(1..=255).contains(&block_length) {
            return malformed(format!("block length {block_length} is not in 1..=255"));
        }
        if iv.len() != block_length {
            return malformed(format!(
                "IV is {} bytes, expected {block_length}",
                iv.len()
            ));
        }
        if ciphertext.len() % block_length != 0 {
            return malformed(format!(
                "ciphertext is {} bytes, not a multiple of {block_length}",
                ciphertext.len()
            ));
        }

        Ok(Params {
            block_length,
            iv,
            ciphertext,
        })
    }

    #[must_use]
    pub fn block_length(&self) -> usize {
        self.block_length
    }

    #[must_use]
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    fn block_count(&self) -> usize {
        self.ciphertext.len() / self.block_length
    }
}

/// Plaintext of one block, recovered from the right.
struct CrackedBlock {
    bytes: Vec<u8>,
    recovered: usize,
}

impl CrackedBlock {
    fn empty(length: usize) -> Self {
        CrackedBlock {
            bytes: vec![0; length],
            recovered: 0,
        }
    }

    fn recovered(&self) -> usize {
        self.recovered
    }

    /// The bytes recovered so far, in plaintext order.
    fn plaintext(&self) -> &[u8] {
        &self.bytes[self.bytes.len() - self.recovered..]
    }

    fn push_front(&mut self, byte: u8) {
        assert!(!self.is_complete(), "block is already cracked");
        self.recovered += 1;
        let index = self.bytes.len() - self.recovered;
        self.bytes[index] = byte;
    }

    fn is_complete(&self) -> bool {
        self.recovered == self.bytes.len()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Copies of the IV and ciphertext that get mutated while attacking one block. The ciphertext is
/// truncated after the target block, so the oracle's padding check lands on it. Only the control
/// block (the block before the target, or the IV for block 0) is ever modified.
struct Workspace {
    block_length: usize,
    block_number: usize,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    original_control: Vec<u8>,
}

fn control_block<'a>(
    iv: &'a mut [u8],
    ciphertext: &'a mut [u8],
    block_length: usize,
    block_number: usize,
) -> &'a mut [u8] {
    match block_number {
        0 => iv,
        n => &mut ciphertext[(n - 1) * block_length..n * block_length],
    }
}

impl Workspace {
    fn new(params: &Params, block_number: usize) -> Self {
        let block_length = params.block_length;
        let mut iv = params.iv.clone();
        let mut ciphertext = params.ciphertext[..(block_number + 1) * block_length].to_vec();
        let original_control =
            control_block(&mut iv, &mut ciphertext, block_length, block_number).to_vec();

        Workspace {
            block_length,
            block_number,
            iv,
            ciphertext,
            original_control,
        }
    }

    fn control_mut(&mut self) -> &mut [u8] {
        control_block(
            &mut self.iv,
            &mut self.ciphertext,
            self.block_length,
            self.block_number,
        )
    }

    /// Restore the control block, then tweak it so every byte of known plaintext decrypts to
    /// `pad` instead.
    fn prepare(&mut self, cracked: &CrackedBlock, pad: u8) {
        let start = self.block_length - cracked.recovered();
        let control = control_block(
            &mut self.iv,
            &mut self.ciphertext,
            self.block_length,
            self.block_number,
        );
        control.copy_from_slice(&self.original_control);

        for (byte, known) in control[start..].iter_mut().zip(cracked.plaintext()) {
            *byte ^= known ^ pad;
        }
    }

    fn check<O: PaddingOracle + ?Sized>(&self, oracle: &O) -> bool {
        oracle.check(&self.iv, &self.ciphertext)
    }
}

/// Crack the rightmost unknown byte of the workspace's target block.
fn crack_byte<O: PaddingOracle + ?Sized>(
    oracle: &O,
    workspace: &mut Workspace,
    cracked: &CrackedBlock,
) -> Result<u8> {
    let block_length = workspace.block_length;
    let index = block_length - cracked.recovered() - 1;
    // at most 255, Params checks the block length
    #[allow(clippy::cast_possible_truncation)]
    let pad = (cracked.recovered() + 1) as u8;

    workspace.prepare(cracked, pad);
    let original = workspace.original_control[index];

    // Once the oracle accepts, the target byte decrypts to `pad`:
    //
    //     p = c ^ D       (decryption)
    //     pad = c ^ delta ^ D
    //
    // so p = pad ^ delta.
    for delta in 0..=u8::MAX {
        workspace.control_mut()[index] = original ^ delta;

        if !workspace.check(oracle) {
            continue;
        }

        if pad == 1 && index > 0 {
            // We asked for \x01 but \x02\x02 (or \x03\x03\x03...) is valid too. Changing the
            // byte on the left breaks any longer padding and leaves \x01 alone.
            workspace.control_mut()[index - 1] ^= 1;
            let confirmed = workspace.check(oracle);
            workspace.control_mut()[index - 1] ^= 1;

            if !confirmed {
                trace!(delta, "rejected ambiguous padding");
                continue;
            }
        }

        return Ok(pad ^ delta);
    }

    Err(Error::OracleInconsistency {
        block: workspace.block_number,
        byte: index,
    })
}

/// Crack one block, using the block before it (or the IV) as control block.
fn crack_block<O: PaddingOracle + ?Sized>(
    oracle: &O,
    params: &Params,
    block_number: usize,
) -> Result<Vec<u8>> {
    // Byte by byte from the right. With the last byte of plaintext `p` known, the control byte
    // above it is set to decrypt to \x02, and the byte to its left is searched until the oracle
    // sees \x02\x02. And so on until the whole block is known.
    //
    //     plaintext:  ________________ _______________p
    //     control:    ______________ed ________________
    //     oracle:     ???????????????? ______________*2
    let mut workspace = Workspace::new(params, block_number);
    let mut cracked = CrackedBlock::empty(params.block_length);

    while !cracked.is_complete() {
        debug!(
            block_number,
            plaintext = %Hex(cracked.plaintext()),
            "cracking byte"
        );
        let byte = crack_byte(oracle, &mut workspace, &cracked)?;
        cracked.push_front(byte);
    }

    Ok(cracked.into_bytes())
}

/// Recover the plaintext of `params`' ciphertext through a padding oracle.
///
/// The result still carries its PKCS#7 padding. Each block costs up to `256 * block_length`
/// oracle queries, plus one per ambiguous first byte.
///
/// # Errors
///
/// [`Error::OracleInconsistency`] if no candidate is accepted at some position, which means the
/// oracle doesn't behave like a padding oracle over a fixed key.
pub fn crack<O: PaddingOracle + ?Sized>(oracle: &O, params: &Params) -> Result<Vec<u8>> {
    let mut plaintext = Vec::with_capacity(params.ciphertext.len());

    for block_number in 0..params.block_count() {
        plaintext.extend(crack_block(oracle, params, block_number)?);
    }

    info!(blocks = params.block_count(), "cracked ciphertext");
    Ok(plaintext)
}

/// Rewrite the plaintext at `offset..offset + current.len()` from `current` to `desired`, without
/// the key. The bytes one block earlier in `iv || ciphertext` are modified, so the block before
/// the rewritten bytes decrypts to garbage (unless it is the IV).
pub fn inject(
    iv: &mut [u8],
    ciphertext: &mut [u8],
    block_length: usize,
    offset: usize,
    current: &[u8],
    desired: &[u8],
) -> Result<()> {
    if current.len() != desired.len() {
        return malformed(format!(
            "can't replace {} bytes with {}",
            current.len(),
            desired.len()
        ));
    }
    if iv.len() != block_length {
        return malformed(format!(
            "IV is {} bytes, expected {block_length}",
            iv.len()
        ));
    }
    if offset + current.len() > ciphertext.len() {
        return malformed(format!(
            "bytes {offset}..{} are past the end of the {}-byte ciphertext",
            offset + current.len(),
            ciphertext.len()
        ));
    }

    for (position, (c, d)) in (offset..).zip(current.iter().zip(desired)) {
        match position.checked_sub(block_length) {
            None => iv[position] ^= c ^ d,
            Some(position) => ciphertext[position] ^= c ^ d,
        }
    }

    Ok(())
}

const MAX_FORGE_ATTEMPTS: usize = 64;

/// Get `admin=true` into a [`CommentOracle`] cookie. The metacharacters are rejected as input,
/// so `9admin9true` is submitted at a block boundary and flipped into `;admin=true`. The flip
/// scrambles the block before it, which breaks the cookie if the garbage contains `;` or `=`,
/// so this retries with fresh encryptions.
///
/// Returns the forged `(iv, ciphertext)`.
pub fn forge_admin(oracle: &CommentOracle, block_length: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    const CURRENT: &str = "9admin9true";
    const DESIRED: &str = ";admin=true";

    let prefix_length = CommentOracle::PREFIX.len();
    let alignment = (block_length - prefix_length % block_length) % block_length;
    let userdata = format!("{}{CURRENT}", "_".repeat(alignment));

    for attempt in 1..=MAX_FORGE_ATTEMPTS {
        let (mut iv, mut ciphertext) = oracle.encrypt(&userdata)?;
        inject(
            &mut iv,
            &mut ciphertext,
            block_length,
            prefix_length + alignment,
            CURRENT.as_bytes(),
            DESIRED.as_bytes(),
        )?;

        if oracle.is_admin(&iv, &ciphertext) {
            info!(attempt, "forged admin cookie");
            return Ok((iv, ciphertext));
        }
        debug!(attempt, "scrambled block broke the cookie");
    }

    Err(Error::AttemptsExhausted(MAX_FORGE_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use rstest::rstest;

    use crate::crypto::aes_128::{decrypt_cbc, encrypt_cbc};
    use crate::oracle::CbcPaddingOracle;

    const BLOCK_LENGTH: usize = 16;
    const KEY: [u8; 16] = [0; 16];
    const IV: [u8; 16] = [1; 16];

    fn crack_with_fixed_key(plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let ciphertext = encrypt_cbc(plaintext, &KEY, &IV).unwrap();
        let oracle = CbcPaddingOracle::new(KEY.to_vec());
        let params = Params::new(BLOCK_LENGTH, IV, ciphertext.clone()).unwrap();

        let cracked = crack(&oracle, &params).unwrap();
        let padded = decrypt_cbc(&ciphertext, &KEY, &IV).unwrap();
        (cracked, padded)
    }

    #[test]
    fn test_crack_yellow_submarine() {
        let (cracked, padded) = crack_with_fixed_key(b"YELLOW SUBMARINE");

        assert_eq!(padded.len(), 32);
        assert_eq!(&cracked[..16], b"YELLOW SUBMARINE");
        assert_eq!(cracked, padded);
    }

    #[rstest]
    #[case(b"abcdefghijklmnop")]
    #[case(b"abcdefghijklmnopqrstuvwxyzABCDEF")]
    #[case(b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV")]
    #[case(b"short")]
    #[case(b"")]
    fn test_crack(#[case] plaintext: &[u8]) {
        let (cracked, padded) = crack_with_fixed_key(plaintext);

        assert_eq!(cracked, padded);
        assert_eq!(&cracked[..plaintext.len()], plaintext);
    }

    #[rstest]
    // \x02 next to the target: \x02\x02 is reachable with a smaller delta than \x02\x01
    #[case(b"ABCDEFGHIJKLMN\x02\x03")]
    // already valid \x02\x02 padding before any change
    #[case(b"ABCDEFGHIJKLMN\x02\x02")]
    #[case(b"ABCDEFGHIJKLMN\x02\x01")]
    #[case(b"ABCDEFGHIJKLM\x03\x03\x02")]
    fn test_crack_ambiguous_padding(#[case] block: &[u8]) {
        let (cracked, _) = crack_with_fixed_key(block);

        assert_eq!(&cracked[..16], block);
    }

    #[test]
    fn test_crack_single_block_uses_iv() {
        // one block, so the IV is the only thing that can be modified
        let iv_changes = Cell::new(0);
        let inner = CbcPaddingOracle::new(KEY.to_vec());
        let ciphertext = encrypt_cbc(b"fifteen bytes!!", &KEY, &IV).unwrap();
        let oracle = |iv: &[u8], ciphertext: &[u8]| {
            if iv != IV {
                iv_changes.set(iv_changes.get() + 1);
            }
            inner.check(iv, ciphertext)
        };
        let params = Params::new(BLOCK_LENGTH, IV, ciphertext.clone()).unwrap();

        let cracked = crack(&oracle, &params).unwrap();

        assert_eq!(cracked, b"fifteen bytes!!\x01");
        assert!(iv_changes.get() > 0);
        assert_eq!(params.ciphertext(), ciphertext);
    }

    #[test]
    fn test_crack_random_key() {
        let oracle = CbcPaddingOracle::new_random();
        let (iv, ciphertext) = oracle.encrypt(b"Cooking MC's like a pound of bacon").unwrap();
        let params = Params::new(BLOCK_LENGTH, iv, ciphertext).unwrap();

        let cracked = crack(&oracle, &params).unwrap();

        assert_eq!(
            cracked,
            b"Cooking MC's like a pound of bacon\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e\x0e"
        );
    }

    #[test]
    fn test_crack_inconsistent_oracle() {
        let params = Params::new(BLOCK_LENGTH, IV, [0u8; 32]).unwrap();

        let result = crack(&|_: &[u8], _: &[u8]| false, &params);

        assert!(matches!(
            result,
            Err(Error::OracleInconsistency { block: 0, byte: 15 })
        ));
    }

    #[rstest]
    #[case(16, vec![0; 16], vec![0; 31])]
    #[case(16, vec![0; 15], vec![0; 32])]
    #[case(0, vec![], vec![])]
    #[case(256, vec![0; 256], vec![0; 256])]
    fn test_params_rejects_malformed_input(
        #[case] block_length: usize,
        #[case] iv: Vec<u8>,
        #[case] ciphertext: Vec<u8>,
    ) {
        assert!(matches!(
            Params::new(block_length, iv, ciphertext),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_inject_first_block_through_iv() {
        let plaintext = b"0123456789abcdefghijklmnopqrstuv";
        let mut ciphertext = encrypt_cbc(plaintext, &KEY, &IV).unwrap();
        let mut iv = IV;

        inject(&mut iv, &mut ciphertext, 16, 2, b"23", b"XY").unwrap();
        let decrypted = decrypt_cbc(&ciphertext, &KEY, &iv).unwrap();

        assert_eq!(&decrypted[..32], b"01XY456789abcdefghijklmnopqrstuv");
    }

    #[test]
    fn test_inject_scrambles_previous_block() {
        let plaintext = b"0123456789abcdefghijklmnopqrstuv";
        let mut ciphertext = encrypt_cbc(plaintext, &KEY, &IV).unwrap();
        let mut iv = IV;

        inject(&mut iv, &mut ciphertext, 16, 20, b"klmn", b"KLMN").unwrap();
        let decrypted = decrypt_cbc(&ciphertext, &KEY, &iv).unwrap();

        assert_ne!(&decrypted[..16], b"0123456789abcdef");
        assert_eq!(&decrypted[16..32], b"ghijKLMNopqrstuv");
        assert_eq!(iv, IV);
    }

    #[test]
    fn test_inject_rejects_out_of_bounds() {
        let mut iv = IV;
        let mut ciphertext = [0u8; 16];

        assert!(inject(&mut iv, &mut ciphertext, 16, 30, b"abc", b"xyz").is_err());
        assert!(inject(&mut iv, &mut ciphertext, 16, 0, b"abc", b"xy").is_err());
    }
}
