//! A counter-mode AES CSPRNG: a process-global stream seeded from OS
//! entropy before `main` runs, plus per-instance contexts for callers
//! that want lock-free partitioning.
//!
//! The AES block cipher itself is an external collaborator, out of
//! scope here — provided by the `aes`/`ctr` crates as an assumed
//! available, byte-accurate `init(key, iv)` / `ctr_xcrypt(buf)`
//! primitive.

use std::io;

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr128BE;

pub mod global;

type Cipher = Ctr128BE<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

fn fresh_entropy() -> io::Result<([u8; KEY_LEN], [u8; IV_LEN])> {
    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    getrandom::getrandom(&mut key).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    getrandom::getrandom(&mut iv).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok((key, iv))
}

/// A single AES-256-CTR keystream context. Every draw asks the cipher to
/// XOR `n` zero bytes; because the input is zero, the output is the raw
/// keystream advanced by `n` bytes — forward progress of the counter is
/// the sole guarantor of non-repetition within a seed.
///
/// Not internally synchronised. Confine a `Csprng` to one thread, or add
/// external mutual exclusion, or use [`global`] for the process-wide
/// singleton and a separate `Csprng` per thread for lock-free
/// partitioning.
pub struct Csprng {
    cipher: Cipher,
}

impl Csprng {
    /// Seeds a fresh context from OS entropy. Unlike the process-global
    /// singleton, failure here is recoverable: per-context use is
    /// explicit, so this returns `Err` rather than aborting.
    pub fn new() -> io::Result<Csprng> {
        let (key, iv) = fresh_entropy()?;
        Ok(Csprng::from_key_iv(key, iv))
    }

    fn from_key_iv(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Csprng {
        Csprng {
            cipher: Cipher::new((&key).into(), (&iv).into()),
        }
    }

    pub fn rand_bytes(&mut self, buf: &mut [u8]) {
        buf.fill(0);
        self.cipher.apply_keystream(buf);
    }

    pub fn rand_byte(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        self.rand_bytes(&mut buf);
        buf[0]
    }

    pub fn rand_i64(&mut self) -> i64 {
        let mut buf = [0u8; 8];
        self.rand_bytes(&mut buf);
        i64::from_ne_bytes(buf)
    }

    pub fn rand_int(&mut self) -> i32 {
        let mut buf = [0u8; 4];
        self.rand_bytes(&mut buf);
        i32::from_ne_bytes(buf)
    }

    /// Re-draws fresh OS entropy and re-initialises this context.
    pub fn reseed(&mut self) -> io::Result<()> {
        let (key, iv) = fresh_entropy()?;
        self.cipher = Cipher::new((&key).into(), (&iv).into());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_test_seed(iv: [u8; IV_LEN], key: [u8; KEY_LEN]) -> Csprng {
        let mut ctx = Csprng::from_key_iv(key, iv);
        // Deliberate warm-up draw, carried over from `cpsrng_test_seed` so
        // deterministic test vectors agree across reimplementations.
        let _ = ctx.rand_i64();
        ctx
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ctr_never_repeats_within_a_seed() {
        let mut ctx = Csprng::from_test_seed([0u8; 16], [0u8; 32]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let mut block = [0u8; 16];
            ctx.rand_bytes(&mut block);
            assert!(seen.insert(block), "CTR keystream repeated a 16-byte block");
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let mut a = Csprng::from_test_seed([0u8; 16], [0u8; 32]);
        let mut b = Csprng::from_test_seed([0u8; 16], [0u8; 32]);

        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.rand_bytes(&mut out_a);
        b.rand_bytes(&mut out_b);

        assert_eq!(out_a, out_b);
    }
}
