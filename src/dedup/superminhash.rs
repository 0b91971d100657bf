//! SuperMinHash similarity sketches
//!
//! SuperMinHash (Ertl, 2017) fills `m` components in a single pass per
//! element, using a shared random permutation to spread each element over
//! the components. The fraction of equal components between two sketches
//! estimates the Jaccard index of the underlying sets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Number of components in a page signature
pub const SIGNATURE_SIZE: usize = 128;

/// Seed shared by every sketch so signatures are comparable across runs
pub const DEFAULT_SEED: u64 = 1984;

/// A fixed-size similarity sketch of a token set
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    values: Vec<f64>,
}

impl Signature {
    /// Estimated Jaccard similarity in `[0, 1]`
    ///
    /// Sketches of different sizes share no estimator and compare as 0.
    pub fn similarity(&self, other: &Signature) -> f64 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }

        let equal = self
            .values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sketch builder with a fixed size and seed
#[derive(Debug, Clone, Copy)]
pub struct SuperMinHash {
    size: usize,
    seed: u64,
}

impl Default for SuperMinHash {
    fn default() -> Self {
        Self::new(SIGNATURE_SIZE, DEFAULT_SEED)
    }
}

impl SuperMinHash {
    pub fn new(size: usize, seed: u64) -> Self {
        Self {
            size: size.max(1),
            seed,
        }
    }

    /// Per-element generator, identical for equal tokens under the same seed
    fn token_rng(&self, token: &str) -> ChaCha8Rng {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(token.as_bytes());
        let digest = hasher.finalize();

        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&digest[..8]);
        ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed_bytes))
    }

    /// Builds the sketch of a token sequence
    pub fn sketch<'a, I>(&self, tokens: I) -> Signature
    where
        I: IntoIterator<Item = &'a str>,
    {
        let m = self.size;
        let mut h = vec![f64::INFINITY; m];
        let mut p = vec![0usize; m];
        let mut q = vec![usize::MAX; m];
        let mut b = vec![0usize; m];
        b[m - 1] = m;
        let mut i_max = m - 1;

        for (i, token) in tokens.into_iter().enumerate() {
            let mut rng = self.token_rng(token);
            let mut j = 0;

            while j <= i_max {
                let r: f64 = rng.gen();
                let k = rng.gen_range(j..m);

                if q[j] != i {
                    q[j] = i;
                    p[j] = j;
                }
                if q[k] != i {
                    q[k] = i;
                    p[k] = k;
                }
                p.swap(j, k);

                let slot = p[j];
                let value = r + j as f64;
                if value < h[slot] {
                    let previous = (h[slot].floor() as usize).min(m - 1);
                    h[slot] = value;
                    if j < previous {
                        b[previous] -= 1;
                        b[j] += 1;
                        while i_max > 0 && b[i_max] == 0 {
                            i_max -= 1;
                        }
                    }
                }

                j += 1;
            }
        }

        Signature { values: h }
    }
}
