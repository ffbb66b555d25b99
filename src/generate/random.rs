//! Randomness for the generator.
//!
//! All randomness flows through one injected [`RandomSource`] so a run is
//! reproducible from a single u64 seed.

use crate::schema::{compile_regex, SchemaError};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Attempts before giving up on a pattern that keeps producing strings the
/// verifying regex rejects.
pub const REGEX_SYNTHESIS_RETRIES: usize = 128;

/// Repetition cap handed to the pattern sampler for unbounded quantifiers.
const MAX_REPEAT: u32 = 32;

#[derive(Debug)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn boolean(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Uniform index into a collection of `len` elements. `len` must be > 0.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    pub fn number(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    pub fn integer(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Length drawn uniformly from `min..=max`.
    pub fn length(&mut self, min: usize, max: usize) -> usize {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    pub fn alphanumeric_string(&mut self, min_length: usize, max_length: usize) -> String {
        let length = self.length(min_length, max_length);
        (0..length)
            .map(|_| ALPHANUMERIC[self.index(ALPHANUMERIC.len())] as char)
            .collect()
    }

    /// Synthesize a string matching `pattern`.
    ///
    /// The sampler does not support anchors or word boundaries, so those are
    /// stripped before compilation; every candidate is then verified against
    /// the real pattern, retrying up to [`REGEX_SYNTHESIS_RETRIES`] times.
    pub fn regex_string(
        &mut self,
        pattern: &str,
        max_size: usize,
    ) -> Result<String, RegexSynthesisError> {
        let verifier = compile_regex(pattern).map_err(RegexSynthesisError::Schema)?;
        let stripped = strip_unsupported(pattern);
        let sampler = rand_regex::Regex::compile(&stripped, MAX_REPEAT).map_err(|err| {
            RegexSynthesisError::Schema(SchemaError::InvalidRegex {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })
        })?;

        for _ in 0..REGEX_SYNTHESIS_RETRIES {
            let candidate: String = sampler.sample(&mut self.rng);
            if candidate.len() <= max_size && verifier.is_match(&candidate) {
                return Ok(candidate);
            }
        }
        Err(RegexSynthesisError::Exhausted {
            pattern: pattern.to_string(),
            attempts: REGEX_SYNTHESIS_RETRIES,
        })
    }
}

#[derive(Debug)]
pub enum RegexSynthesisError {
    Schema(SchemaError),
    Exhausted { pattern: String, attempts: usize },
}

/// Drop anchors and word boundaries, which the sampler cannot honor. `^` and
/// `$` inside a character class are ordinary members (`[^a]` negates, `[$]`
/// matches a dollar sign) and must survive.
fn strip_unsupported(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('b') if !in_class => {
                    chars.next();
                }
                _ => {
                    out.push('\\');
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
            },
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '^' | '$' if !in_class => {}
            other => out.push(other),
        }
    }
    out
}
