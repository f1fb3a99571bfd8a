//! Attacks on ECB. Every block is encrypted on its own, so equal plaintext blocks give equal
//! ciphertext blocks, wherever they are. Everything here comes down to lining up blocks and
//! comparing them.

use std::collections::HashSet;

use tracing::{debug, info, trace};

use crate::{
    bytes_ext::BytesExt,
    crypto::aes_128::pad_pkcs7,
    error::{malformed, Error, Result},
    hex::Hex,
    oracle::{EncryptionOracle, ProfileOracle},
};

/// Filler for attacker-controlled input.
pub const FILLER: u8 = b'A';
/// Second filler, to tell our blocks apart from filler-looking bytes in the secret.
pub const ALT_FILLER: u8 = b'B';
/// Shifts input to a block boundary while looking for the prefix.
pub const ALIGNMENT: u8 = b'Z';

/// Whether `ciphertext` was likely encrypted with ECB: some block appears twice.
///
/// A `false` can also mean the ciphertext is too short, or the plaintext had no repeated
/// block. A `true` for anything other than ECB is astronomically unlikely.
#[must_use]
pub fn detect(ciphertext: &[u8], block_length: usize) -> bool {
    let blocks = ciphertext.blocks(block_length);
    let unique_blocks = blocks.clone().collect::<HashSet<_>>();
    blocks.len() != unique_blocks.len()
}

/// Whether an oracle encrypts with ECB. Up to one block of unknown prefix can hide the start of
/// our input, so three blocks of it guarantee two full, equal plaintext blocks.
pub fn is_ecb_oracle<O: EncryptionOracle + ?Sized>(oracle: &O, block_length: usize) -> Result<bool> {
    let ciphertext = oracle.encrypt(&vec![0; 3 * block_length])?;
    Ok(detect(&ciphertext, block_length))
}

/// What an oracle adds around our input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lengths {
    /// Block length of the cipher.
    pub block_length: usize,
    /// Bytes the oracle always adds to the input, prefix and suffix together, not counting
    /// padding.
    pub extra_byte_count: usize,
}

/// Measure the block length and the number of extra bytes by growing the input until the
/// ciphertext grows.
///
/// With a 5-byte secret and 8-byte blocks:
///
/// ```text
/// ________ -> 01234PPP
/// A_______ -> A01234PP
/// AA______ -> AA01234P
/// AAA_____ -> AAA01234 PPPPPPPP
/// ```
///
/// The length jumps by one block (16 - 8) when 3 bytes of input fill the last block, leaving 8 - 3
/// extra bytes.
///
/// Loops forever if the ciphertext never grows, i.e. if the oracle doesn't encrypt its input.
pub fn find_lengths<O: EncryptionOracle + ?Sized>(oracle: &O) -> Result<Lengths> {
    let base_length = oracle.encrypt(b"")?.len();

    let mut input = Vec::new();
    loop {
        input.push(FILLER);
        let length = oracle.encrypt(&input)?.len();

        if length != base_length {
            let lengths = Lengths {
                block_length: length - base_length,
                extra_byte_count: base_length.saturating_sub(input.len()),
            };
            debug!(?lengths, "found lengths");
            return Ok(lengths);
        }
    }
}

/// The first block that is repeated right after itself.
fn find_repeated_block(ciphertext: &[u8], block_length: usize) -> Option<&[u8]> {
    let blocks = ciphertext.blocks(block_length);
    blocks
        .clone()
        .zip(blocks.skip(1))
        .find(|(a, b)| a == b)
        .map(|(a, _)| a)
}

/// Offset in bytes of the first block equal to `block`.
fn block_offset(ciphertext: &[u8], block: &[u8]) -> Option<usize> {
    ciphertext
        .blocks(block.len())
        .position(|b| b == block)
        .map(|index| index * block.len())
}

/// Measure the length of an unknown prefix the oracle puts before our input.
///
/// Three blocks of filler give away what a filler block encrypts to. Then more and more
/// alignment bytes go in front of one filler block until that ciphertext block shows up: the
/// prefix plus the alignment bytes end on a block boundary.
///
/// ```text
/// 0 alignment bytes -> PPPPPAAA AAAAA___ -> ________ ________
/// 1 alignment bytes -> PPPPPZAA AAAAAA__ -> ________ ________
/// 2 alignment bytes -> PPPPPZZA AAAAAAA_ -> ________ ________
/// 3 alignment bytes -> PPPPPZZZ AAAAAAAA -> ________ aaaaaaaa
/// ```
///
/// The filler block sits at offset 8, so the prefix is 8 - 3 bytes long. The same is done with a
/// second filler, and both must agree, in case the secret happens to contain a filler block.
pub fn find_prefix_length<O: EncryptionOracle + ?Sized>(
    oracle: &O,
    block_length: usize,
) -> Result<usize> {
    if block_length == 0 {
        return malformed("block length can't be 0");
    }

    let filler_block = vec![FILLER; block_length];
    let alt_filler_block = vec![ALT_FILLER; block_length];

    let filler_ciphertext = oracle.encrypt(&filler_block.repeat(3))?;
    let filler_reference =
        find_repeated_block(&filler_ciphertext, block_length).ok_or(Error::NotEcb)?;
    let alt_filler_ciphertext = oracle.encrypt(&alt_filler_block.repeat(3))?;
    let alt_filler_reference =
        find_repeated_block(&alt_filler_ciphertext, block_length).ok_or(Error::NotEcb)?;

    for count in 0..block_length {
        let alignment = vec![ALIGNMENT; count];
        let ciphertext = oracle.encrypt(&[alignment.as_slice(), &filler_block].concat())?;
        let alt_ciphertext = oracle.encrypt(&[alignment.as_slice(), &alt_filler_block].concat())?;

        let (Some(offset), Some(alt_offset)) = (
            block_offset(&ciphertext, filler_reference),
            block_offset(&alt_ciphertext, alt_filler_reference),
        ) else {
            continue;
        };

        if offset == alt_offset {
            if let Some(prefix_length) = offset.checked_sub(count) {
                debug!(prefix_length, "found prefix length");
                return Ok(prefix_length);
            }
        }
    }

    Err(Error::NotEcb)
}

/// Recover the secret the oracle appends to our input, one byte at a time.
///
/// With 8-byte blocks and secret `0123456789`, each step reads:
/// `input -> plaintext of reference | brute forced input -> found byte`
///
/// ```text
/// AAAAAAA_ -> AAAAAAA0 ...          | AAAAAAAx          -> 0
/// AAAAAA__ -> AAAAAA01 ...          | AAAAAA0x          -> 1
/// ...
/// ________ -> 01234567 ...          | 0123456x          -> 7
/// AAAAAAA_ -> AAAAAAA0 12345678 ... | AAAAAAA0 1234567x -> 8
/// AAAAAA__ -> AAAAAA01 23456789     | AAAAAA01 2345678x -> 9
/// ```
///
/// With a prefix, the filler first tops the prefix up to a block boundary, and blocks are counted
/// from there.
pub fn find_unknown_suffix<O: EncryptionOracle + ?Sized>(
    oracle: &O,
    block_length: usize,
    prefix_length: usize,
    suffix_length: usize,
) -> Result<Vec<u8>> {
    if block_length == 0 {
        return malformed("block length can't be 0");
    }

    let prefix_padding_length = (block_length - prefix_length % block_length) % block_length;
    let prefix_block_count = (prefix_length + prefix_padding_length) / block_length;

    let mut suffix = Vec::with_capacity(suffix_length);

    for step in 0..suffix_length {
        let cut = step % block_length + 1;
        let filler = vec![FILLER; prefix_padding_length + block_length - cut];
        let block_number = prefix_block_count + step / block_length;

        // the next secret byte is the last byte of this block
        let reference = oracle.encrypt(&filler)?;
        let target = reference.block(block_length, block_number);

        let mut input = [filler.as_slice(), &suffix, &[0u8]].concat();
        let last = input.len() - 1;
        let mut found = None;

        for candidate in 0..=u8::MAX {
            input[last] = candidate;
            let ciphertext = oracle.encrypt(&input)?;

            if ciphertext.block(block_length, block_number) == target {
                trace!(step, candidate, "candidate matches");
                found = Some(candidate);
                break;
            }
        }

        let byte = found.ok_or(Error::OracleInconsistency {
            block: step / block_length,
            byte: step % block_length,
        })?;
        suffix.push(byte);

        if cut == block_length {
            debug!(
                block_number = step / block_length,
                suffix = %Hex(&suffix),
                "cracked block"
            );
        }
    }

    Ok(suffix)
}

/// Measure everything, check the oracle is ECB, and recover the secret it appends.
pub fn crack_unknown_suffix<O: EncryptionOracle + ?Sized>(oracle: &O) -> Result<Vec<u8>> {
    let lengths = find_lengths(oracle)?;

    if !is_ecb_oracle(oracle, lengths.block_length)? {
        return Err(Error::NotEcb);
    }

    let prefix_length = find_prefix_length(oracle, lengths.block_length)?;
    let suffix_length = lengths
        .extra_byte_count
        .checked_sub(prefix_length)
        .ok_or(Error::NotEcb)?;

    let suffix = find_unknown_suffix(oracle, lengths.block_length, prefix_length, suffix_length)?;
    info!(prefix_length, suffix_length, "cracked suffix");
    Ok(suffix)
}

/// Make a [`ProfileOracle`] ciphertext that decrypts to `role=admin`, by splicing blocks of two
/// profiles together.
///
/// ```text
/// email=fooooo@example.org&uid=10&role= user____________
/// email=AAAAAAAAAAadmin___________ &uid=10&role=user____
///                 ^^^^^^^^^^^^^^^^
/// ```
///
/// The first email pushes the role value to a block boundary; the second puts `admin` plus
/// padding alone in a block. Everything but the role's block from the first, followed by that
/// block from the second, decodes to an admin profile.
pub fn promote_to_admin(oracle: &ProfileOracle) -> Result<Vec<u8>> {
    const BEFORE_EMAIL: usize = "email=".len();
    const BEFORE_ROLE: usize = "&uid=10&role=".len();
    const DOMAIN: &str = "@example.org";

    let Lengths { block_length, .. } = find_lengths(oracle)?;

    // the local part has at least an "f"
    let unaligned = BEFORE_EMAIL + 1 + DOMAIN.len() + BEFORE_ROLE;
    let local_padding = (block_length - unaligned % block_length) % block_length;
    let email = format!("f{}{DOMAIN}", "o".repeat(local_padding));
    let head_block_count = (unaligned + local_padding) / block_length;
    let profile = oracle.encrypt(email.as_bytes())?;
    let head = profile.block_span(block_length, 0, Some(head_block_count));

    let email_alignment = (block_length - BEFORE_EMAIL % block_length) % block_length;
    let mut admin = b"admin".to_vec();
    pad_pkcs7(&mut admin, block_length);
    let admin_email = [vec![FILLER; email_alignment], admin].concat();
    let admin_profile = oracle.encrypt(&admin_email)?;
    let admin_block = admin_profile.block(
        block_length,
        (BEFORE_EMAIL + email_alignment) / block_length,
    );

    Ok([head, admin_block].concat())
}
