//! `key=value` cookies joined by a delimiter, e.g. `email=foo@bar.com&uid=10&role=user`.

use crate::error::{malformed, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    /// Between a key and its value.
    pub bind: char,
    /// Between bindings.
    pub delim: char,
}

impl Codec {
    fn check(self, s: &str) -> Result<()> {
        if s.contains(self.bind) || s.contains(self.delim) {
            malformed(format!(
                "{s:?} contains one of the reserved characters {:?} and {:?}",
                self.bind, self.delim
            ))
        } else {
            Ok(())
        }
    }

    /// Encode the pairs in order. Keys and values can't contain either metacharacter: there is no
    /// escaping, so they would let a caller inject their own bindings.
    pub fn encode(self, pairs: &[(&str, &str)]) -> Result<String> {
        let mut bindings = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            self.check(key)?;
            self.check(value)?;
            bindings.push(format!("{key}{}{value}", self.bind));
        }
        Ok(bindings.join(&self.delim.to_string()))
    }

    /// Decode into pairs, in order. `None` if any binding isn't exactly one key and one value.
    #[must_use]
    pub fn decode(self, s: &str) -> Option<Vec<(String, String)>> {
        if s.is_empty() {
            return Some(Vec::new());
        }

        s.split(self.delim)
            .map(|binding| {
                let mut parts = binding.split(self.bind);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => Some((key.to_owned(), value.to_owned())),
                    _ => None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    const CODEC: Codec = Codec {
        bind: '=',
        delim: '&',
    };

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_encode() {
        let encoded = CODEC
            .encode(&[("foo", "bar"), ("baz", "qux"), ("zap", "zazzle")])
            .unwrap();

        assert_eq!(encoded, "foo=bar&baz=qux&zap=zazzle");
    }

    #[rstest]
    #[case(("a=b", "c"))]
    #[case(("a", "c&role=admin"))]
    fn test_encode_rejects_metacharacters(#[case] pair: (&str, &str)) {
        assert!(CODEC.encode(&[pair]).is_err());
    }

    #[rstest]
    #[case("", Some(vec![]))]
    #[case("foo=bar", Some(vec![("foo", "bar")]))]
    #[case("foo=bar&baz=qux&zap=zazzle", Some(vec![("foo", "bar"), ("baz", "qux"), ("zap", "zazzle")]))]
    #[case("foo=", Some(vec![("foo", "")]))]
    #[case("foo", None)]
    #[case("foo=bar=baz", None)]
    #[case("foo=bar&", None)]
    fn test_decode(#[case] s: &str, #[case] expected: Option<Vec<(&str, &str)>>) {
        assert_eq!(CODEC.decode(s), expected.as_deref().map(owned));
    }
}
