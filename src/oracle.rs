//! Oracles: the only view an attack gets of the secret it is after.
//!
//! The attacks take anything implementing [`PaddingOracle`] or [`EncryptionOracle`], closures
//! included. The structs in this module are reference oracles hiding a random key, used to
//! exercise the attacks end to end.

use crate::{
    cookie::Codec,
    crypto::{
        aes_128::{self, decrypt_cbc, decrypt_ecb, encrypt_cbc, encrypt_ecb, unpad_pkcs7},
        gen_random_bytes,
    },
    error::Result,
};

/// Answers one question: does this ciphertext decrypt to validly padded plaintext?
pub trait PaddingOracle {
    fn check(&self, iv: &[u8], ciphertext: &[u8]) -> bool;
}

impl<F> PaddingOracle for F
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    fn check(&self, iv: &[u8], ciphertext: &[u8]) -> bool {
        self(iv, ciphertext)
    }
}

/// Encrypts attacker-controlled input, possibly surrounded by bytes the attacker can't see. Must
/// be deterministic for the duration of an attack.
pub trait EncryptionOracle {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>>;
}

impl<F> EncryptionOracle for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>>,
{
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>> {
        self(input)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Cipher {
    Ecb,
    Cbc { iv: Vec<u8> },
}

impl Cipher {
    fn new_cbc_with_random_iv() -> Self {
        Cipher::Cbc {
            iv: gen_random_bytes(aes_128::block_size()),
        }
    }
}

/// Encrypts `prefix || input || suffix` with AES-128, in either ECB or CBC mode. Key, prefix,
/// suffix and (for CBC) IV are fixed at construction.
pub struct AffixingOracle {
    cipher: Cipher,
    key: Vec<u8>,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl AffixingOracle {
    /// Random key, ECB or CBC with even odds, and 5 to 10 random bytes on each side.
    #[must_use]
    pub fn new_random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let cipher = if rng.gen_bool(0.5) {
            Cipher::Ecb
        } else {
            Cipher::new_cbc_with_random_iv()
        };

        let prefix_len = rng.gen_range(5..=10);
        let suffix_len = rng.gen_range(5..=10);

        AffixingOracle {
            cipher,
            key: gen_random_bytes(16),
            prefix: gen_random_bytes(prefix_len),
            suffix: gen_random_bytes(suffix_len),
        }
    }

    /// ECB with a given key and suffix and no prefix.
    #[must_use]
    pub fn new_suffixed_ecb(key: Vec<u8>, suffix: Vec<u8>) -> Self {
        Self::new_affixed_ecb(key, Vec::new(), suffix)
    }

    #[must_use]
    pub fn new_affixed_ecb(key: Vec<u8>, prefix: Vec<u8>, suffix: Vec<u8>) -> Self {
        AffixingOracle {
            cipher: Cipher::Ecb,
            key,
            prefix,
            suffix,
        }
    }

    /// Whether the oracle is using ECB. Lets tests grade mode detection.
    #[must_use]
    pub fn is_ecb(&self) -> bool {
        matches!(self.cipher, Cipher::Ecb)
    }
}

impl EncryptionOracle for AffixingOracle {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>> {
        let affixed = [&self.prefix, input, &self.suffix].concat();
        match &self.cipher {
            Cipher::Ecb => encrypt_ecb(&affixed, &self.key),
            Cipher::Cbc { iv } => encrypt_cbc(&affixed, &self.key, iv),
        }
    }
}

/// Hands out CBC ciphertexts and tells whether a ciphertext's padding is valid. Nothing else.
pub struct CbcPaddingOracle {
    key: Vec<u8>,
}

impl CbcPaddingOracle {
    #[must_use]
    pub fn new_random() -> Self {
        Self::new(gen_random_bytes(16))
    }

    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        CbcPaddingOracle { key }
    }

    /// Encrypt under a fresh random IV. Returns `(iv, ciphertext)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let iv = gen_random_bytes(aes_128::block_size());
        let ciphertext = encrypt_cbc(plaintext, &self.key, &iv)?;
        Ok((iv, ciphertext))
    }
}

impl PaddingOracle for CbcPaddingOracle {
    fn check(&self, iv: &[u8], ciphertext: &[u8]) -> bool {
        decrypt_cbc(ciphertext, &self.key, iv)
            .and_then(|mut padded| unpad_pkcs7(&mut padded, aes_128::block_size()))
            .is_ok()
    }
}

/// `email=...&uid=10&role=user` profiles, ECB encrypted.
pub struct ProfileOracle {
    key: Vec<u8>,
}

impl ProfileOracle {
    pub const CODEC: Codec = Codec {
        bind: '=',
        delim: '&',
    };

    #[must_use]
    pub fn new_random() -> Self {
        ProfileOracle {
            key: gen_random_bytes(16),
        }
    }

    /// The encoded profile of a new user. Fails if `email` tries to smuggle in `&` or `=`.
    pub fn profile_for(email: &str) -> Result<String> {
        Self::CODEC.encode(&[("email", email), ("uid", "10"), ("role", "user")])
    }

    /// Decrypt and decode a profile. `None` if the padding or the encoding is broken.
    #[must_use]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<(String, String)>> {
        let mut plaintext = decrypt_ecb(ciphertext, &self.key).ok()?;
        unpad_pkcs7(&mut plaintext, aes_128::block_size()).ok()?;
        Self::CODEC.decode(&String::from_utf8(plaintext).ok()?)
    }
}

impl EncryptionOracle for ProfileOracle {
    fn encrypt(&self, email: &[u8]) -> Result<Vec<u8>> {
        let profile = Self::profile_for(&String::from_utf8_lossy(email))?;
        encrypt_ecb(profile.as_bytes(), &self.key)
    }
}

/// Wraps user data in a `comment1=...;userdata=...;comment2=...` cookie, CBC encrypted under a
/// fresh IV each time.
pub struct CommentOracle {
    key: Vec<u8>,
}

impl CommentOracle {
    pub const CODEC: Codec = Codec {
        bind: '=',
        delim: ';',
    };
    pub const PREFIX: &'static str = "comment1=cooking%20MCs;userdata=";
    const COMMENT_1: &'static str = "cooking%20MCs";
    const COMMENT_2: &'static str = "%20like%20a%20pound%20of%20bacon";

    #[must_use]
    pub fn new_random() -> Self {
        CommentOracle {
            key: gen_random_bytes(16),
        }
    }

    /// Returns `(iv, ciphertext)`. Fails if `userdata` contains `;` or `=`.
    pub fn encrypt(&self, userdata: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let cookie = Self::CODEC.encode(&[
            ("comment1", Self::COMMENT_1),
            ("userdata", userdata),
            ("comment2", Self::COMMENT_2),
        ])?;
        let iv = gen_random_bytes(aes_128::block_size());
        let ciphertext = encrypt_cbc(cookie.as_bytes(), &self.key, &iv)?;
        Ok((iv, ciphertext))
    }

    /// Whether the cookie decrypts to something with `admin=true` in it.
    #[must_use]
    pub fn is_admin(&self, iv: &[u8], ciphertext: &[u8]) -> bool {
        let Ok(mut plaintext) = decrypt_cbc(ciphertext, &self.key, iv) else {
            return false;
        };
        if unpad_pkcs7(&mut plaintext, aes_128::block_size()).is_err() {
            return false;
        }

        Self::CODEC
            .decode(&String::from_utf8_lossy(&plaintext))
            .is_some_and(|pairs| pairs.iter().any(|(k, v)| k == "admin" && v == "true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    #[test]
    fn test_closures_are_oracles() {
        let padding = |_: &[u8], ciphertext: &[u8]| ciphertext.is_empty();
        assert!(padding.check(b"iv", b""));

        let echo = |input: &[u8]| -> Result<Vec<u8>> { Ok(input.to_vec()) };
        assert_eq!(echo.encrypt(b"abc").unwrap(), b"abc");
    }

    #[test]
    fn test_affixing_oracle_is_deterministic() {
        let oracle = AffixingOracle::new_affixed_ecb(
            gen_random_bytes(16),
            b"prefix".to_vec(),
            b"suffix".to_vec(),
        );

        let first = oracle.encrypt(b"input").unwrap();
        let second = oracle.encrypt(b"input").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert!(oracle.is_ecb());
    }

    #[test]
    fn test_cbc_padding_oracle() {
        let oracle = CbcPaddingOracle::new_random();
        let (iv, mut ciphertext) = oracle.encrypt(b"attack at dawn").unwrap();

        assert!(oracle.check(&iv, &ciphertext));

        // the padding is \x02\x02, turning the last byte into \x00 can never be valid
        let mut forced_iv = iv.clone();
        forced_iv[15] ^= 0x02;
        assert!(!oracle.check(&forced_iv, &ciphertext));

        ciphertext.pop();
        assert!(!oracle.check(&iv, &ciphertext));
    }

    #[test]
    fn test_profile_oracle() {
        let oracle = ProfileOracle::new_random();
        let ciphertext = oracle.encrypt(b"foo@bar.com").unwrap();

        assert_eq!(
            oracle.decrypt(&ciphertext).unwrap(),
            vec![
                ("email".to_string(), "foo@bar.com".to_string()),
                ("uid".to_string(), "10".to_string()),
                ("role".to_string(), "user".to_string()),
            ]
        );
        assert!(matches!(
            oracle.encrypt(b"foo@bar.com&role=admin"),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_comment_oracle() {
        let oracle = CommentOracle::new_random();
        let (iv, ciphertext) = oracle.encrypt("nothing to see here").unwrap();

        assert!(!oracle.is_admin(&iv, &ciphertext));
        assert!(oracle.encrypt(";admin=true").is_err());
    }
}
