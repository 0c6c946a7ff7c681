use sha1::{Digest, Sha1};

use crate::error::IntegrityError;

/// Incremental SHA-1 check of a stream against a published digest.
#[derive(Debug, Clone)]
pub struct IntegrityCheck {
    hasher: Sha1,
    expected: String,
}

impl IntegrityCheck {
    pub fn new<S: AsRef<str>>(expected: S) -> Self {
        Self {
            hasher: Sha1::new(),
            expected: expected.as_ref().trim().to_ascii_lowercase(),
        }
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finish(self) -> Result<(), IntegrityError> {
        let actual = hex::encode(self.hasher.finalize());
        if actual == self.expected {
            Ok(())
        } else {
            Err(IntegrityError {
                expected: self.expected,
                actual,
            })
        }
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}
