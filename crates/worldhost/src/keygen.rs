//! Random token generation for per-instance secret keys.

use rand::Rng;

/// Length of the secret key provisioned for every instance at boot.
pub const SECRET_KEY_LENGTH: usize = 64;

/// Upper-case letters, lower-case letters, and digits.
pub const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Errors when configuring a [`KeyGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key length must be at least 1")]
    ZeroLength,

    #[error("alphabet must contain at least 2 symbols, got {0}")]
    AlphabetTooSmall(usize),
}

/// Produces fixed-length random tokens over a fixed alphabet.
///
/// Holds no mutable state: all randomness comes from the `Rng` passed to
/// [`produce`](Self::produce), so one generator can be shared by any number
/// of threads without coordination.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    length: usize,
    symbols: &'static [u8],
}

impl KeyGenerator {
    /// # Errors
    /// [`KeyError`] if `length` is zero or `symbols` has fewer than two entries.
    pub fn new(length: usize, symbols: &'static [u8]) -> Result<Self, KeyError> {
        if length == 0 {
            return Err(KeyError::ZeroLength);
        }
        if symbols.len() < 2 {
            return Err(KeyError::AlphabetTooSmall(symbols.len()));
        }
        Ok(Self { length, symbols })
    }

    /// The generator used for instance secret keys:
    /// [`SECRET_KEY_LENGTH`] symbols from [`ALPHANUMERIC`].
    pub fn secret_key() -> Self {
        Self {
            length: SECRET_KEY_LENGTH,
            symbols: ALPHANUMERIC,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draws `length` symbols from the alphabet using `rng`.
    pub fn produce<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        (0..self.length)
            .map(|_| char::from(self.symbols[rng.random_range(0..self.symbols.len())]))
            .collect()
    }
}
