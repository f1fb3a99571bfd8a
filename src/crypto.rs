/// AES-128 in ECB and CBC mode. This is the cipher the reference oracles hide behind; the attacks
/// never call it directly.
pub mod aes_128 {
    use openssl::symm::{Cipher, Crypter, Mode};

    use crate::bytes_ext::BytesExt;
    use crate::error::{malformed, Error, Result};

    /// Block size of AES, in bytes.
    #[must_use]
    pub fn block_size() -> usize {
        Cipher::aes_128_ecb().block_size()
    }

    /// Run the raw block primitive over block-aligned `data`, one block at a time. No padding and
    /// no chaining: CBC is built on top of this by hand.
    fn transform(mode: Mode, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let cipher = Cipher::aes_128_ecb();

        if key.len() != cipher.key_len() {
            return malformed(format!(
                "key is {} bytes, expected {}",
                key.len(),
                cipher.key_len()
            ));
        }
        if data.len() % cipher.block_size() != 0 {
            return malformed(format!(
                "{} bytes is not a multiple of the block size {}",
                data.len(),
                cipher.block_size()
            ));
        }

        // openssl's own padding stays off, padding is pad_pkcs7/unpad_pkcs7's job
        let mut crypter = Crypter::new(cipher, mode, key, None)?;
        crypter.pad(false);

        let mut buf = vec![0; data.len() + cipher.block_size()];
        let mut count = crypter.update(data, &mut buf)?;
        count += crypter.finalize(&mut buf[count..])?;
        buf.truncate(count);

        Ok(buf)
    }

    fn check_iv(iv: &[u8]) -> Result<()> {
        if iv.len() == block_size() {
            Ok(())
        } else {
            malformed(format!("IV is {} bytes, expected {}", iv.len(), block_size()))
        }
    }

    /// Pad and encrypt with AES-128-ECB.
    pub fn encrypt_ecb(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let mut padded = plaintext.to_vec();
        pad_pkcs7(&mut padded, block_size());

        transform(Mode::Encrypt, &padded, key)
    }

    /// Decrypt AES-128-ECB. Padding is left in place.
    pub fn decrypt_ecb(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        transform(Mode::Decrypt, ciphertext, key)
    }

    /// Pad and encrypt with AES-128-CBC.
    pub fn encrypt_cbc(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        check_iv(iv)?;

        let block_size = block_size();
        let mut padded = plaintext.to_vec();
        pad_pkcs7(&mut padded, block_size);

        let mut ciphertext = Vec::with_capacity(padded.len());
        let mut previous = iv.to_vec();

        for block in padded.blocks(block_size) {
            let mut block = block.to_vec();
            block.xor_assign(&previous);
            previous = transform(Mode::Encrypt, &block, key)?;
            ciphertext.extend_from_slice(&previous);
        }

        Ok(ciphertext)
    }

    /// Decrypt AES-128-CBC. Padding is left in place.
    pub fn decrypt_cbc(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        check_iv(iv)?;

        let block_size = block_size();
        let mut plaintext = transform(Mode::Decrypt, ciphertext, key)?;

        for (number, block) in plaintext.chunks_exact_mut(block_size).enumerate() {
            let previous = match number {
                0 => iv,
                _ => ciphertext.block(block_size, number - 1),
            };
            block.xor_assign(previous);
        }

        Ok(plaintext)
    }

    /// Append between 1 and `block_size` bytes of PKCS#7 padding.
    pub fn pad_pkcs7(data: &mut Vec<u8>, block_size: usize) {
        assert!(
            (1..=255).contains(&block_size),
            "PKCS#7 block size must be in 1..=255, got {block_size}"
        );

        let pad_len = block_size - data.len() % block_size;
        #[allow(clippy::cast_possible_truncation)]
        data.resize(data.len() + pad_len, pad_len as u8);
    }

    /// Strip PKCS#7 padding. The last byte `n` must be in `1..=block_size` and the last `n` bytes
    /// must all equal `n`.
    pub fn unpad_pkcs7(data: &mut Vec<u8>, block_size: usize) -> Result<()> {
        let pad_len = match data.last() {
            Some(&n) if n != 0 && usize::from(n) <= block_size && usize::from(n) <= data.len() => n,
            _ => return Err(Error::InvalidPadding),
        };

        let unpadded_len = data.len() - usize::from(pad_len);
        if !data[unpadded_len..].iter().all(|&byte| byte == pad_len) {
            return Err(Error::InvalidPadding);
        }

        data.truncate(unpadded_len);
        Ok(())
    }
}

pub fn gen_random_bytes(len: usize) -> Vec<u8> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}
