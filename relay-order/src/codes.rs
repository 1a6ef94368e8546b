use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};
use relay_core::repository::CodeRegistry;
use relay_core::{CoreError, CoreResult};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LEN: usize = 4;

pub const DEFAULT_MAX_ATTEMPTS: usize = 20;
pub const DEFAULT_SEED: &str = "BR";

/// Two-letter prefix derived from a seed text: the initials of its first
/// two words, or the first two letters of a single word, plus a hyphen.
///
/// Only ASCII letters and digits are considered; a seed with none of them
/// falls back to `DEFAULT_SEED`.
pub fn code_prefix(seed: &str) -> String {
    let words: Vec<String> = seed
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    let letters: String = match words.as_slice() {
        [] => return code_prefix(DEFAULT_SEED),
        [single] => single.chars().take(2).collect(),
        [first, second, ..] => first.chars().take(1).chain(second.chars().take(1)).collect(),
    };

    format!("{}-", letters.to_ascii_uppercase())
}

/// Generates short human-friendly identifiers (delivery codes, bike plates)
/// that are unique against what is already stored.
pub struct DeliveryCodeAllocator {
    registry: Arc<dyn CodeRegistry>,
    max_attempts: usize,
}

impl DeliveryCodeAllocator {
    pub fn new(registry: Arc<dyn CodeRegistry>) -> Self {
        Self {
            registry,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Code shaped like `XY-ABCD`, not currently used by any delivery.
    ///
    /// Another writer may still take the same code before it is stored;
    /// callers rely on the storage constraint and retry on `Conflict`.
    /// Running out of attempts is a `Conflict`.
    pub async fn allocate(&self, seed: &str) -> CoreResult<String> {
        let prefix = code_prefix(seed);

        for attempt in 1..=self.max_attempts {
            let candidate = format!("{}{}", prefix, random_suffix(CODE_SUFFIX_LEN));
            if !self.registry.delivery_code_exists(&candidate).await? {
                debug!(code = %candidate, attempt, "Allocated delivery code");
                return Ok(candidate);
            }
            debug!(code = %candidate, attempt, "Delivery code already taken");
        }

        warn!(prefix = %prefix, attempts = self.max_attempts, "Delivery code space exhausted");
        Err(CoreError::Conflict(format!(
            "no free delivery code for prefix {} after {} attempts",
            prefix, self.max_attempts
        )))
    }

    /// License plate for a bike, `BIKE` followed by four digits
    pub async fn allocate_plate(&self) -> CoreResult<String> {
        for _ in 0..self.max_attempts {
            let candidate = format!("BIKE{}", rand::thread_rng().gen_range(1000..10000));
            if !self.registry.license_plate_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        warn!(attempts = self.max_attempts, "Bike plate space exhausted");
        Err(CoreError::Conflict(format!(
            "no free bike plate after {} attempts",
            self.max_attempts
        )))
    }
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports the first `taken` candidates as already used
    struct Registry {
        taken: usize,
        checks: AtomicUsize,
    }

    impl Registry {
        fn with_taken(taken: usize) -> Arc<Self> {
            Arc::new(Self { taken, checks: AtomicUsize::new(0) })
        }

        fn seen(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) < self.taken
        }
    }

    #[async_trait]
    impl CodeRegistry for Registry {
        async fn delivery_code_exists(&self, _code: &str) -> CoreResult<bool> {
            Ok(self.seen())
        }

        async fn license_plate_exists(&self, _plate: &str) -> CoreResult<bool> {
            Ok(self.seen())
        }
    }

    fn is_code(code: &str, prefix: &str) -> bool {
        code.len() == 7
            && code.starts_with(prefix)
            && code[3..].bytes().all(|b| CODE_ALPHABET.contains(&b))
    }

    #[test]
    fn test_prefix_rules() {
        assert_eq!(code_prefix("Rua Augusta"), "RA-");
        assert_eq!(code_prefix("avenida boa viagem"), "AB-");
        assert_eq!(code_prefix("Paulista"), "PA-");
        assert_eq!(code_prefix("  Rua   Augusta  "), "RA-");
        assert_eq!(code_prefix(""), "BR-");
        assert_eq!(code_prefix("-- !!"), "BR-");
    }

    #[tokio::test]
    async fn test_allocate_shape() {
        let allocator = DeliveryCodeAllocator::new(Registry::with_taken(0));
        let code = allocator.allocate("Rua Augusta").await.unwrap();
        assert!(is_code(&code, "RA-"), "unexpected code {}", code);
    }

    #[tokio::test]
    async fn test_allocate_skips_taken_codes() {
        let registry = Registry::with_taken(3);
        let allocator = DeliveryCodeAllocator::new(registry.clone());

        let code = allocator.allocate("Rua Augusta").await.unwrap();
        assert!(is_code(&code, "RA-"));
        assert_eq!(registry.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_allocate_gives_up_after_max_attempts() {
        let registry = Registry::with_taken(usize::MAX);
        let allocator = DeliveryCodeAllocator::new(registry.clone()).with_max_attempts(5);

        let err = allocator.allocate("Rua Augusta").await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(registry.checks.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_bike_plate_shape() {
        let allocator = DeliveryCodeAllocator::new(Registry::with_taken(2));
        let plate = allocator.allocate_plate().await.unwrap();

        assert!(plate.starts_with("BIKE"));
        let number: u32 = plate[4..].parse().unwrap();
        assert!((1000..=9999).contains(&number));
    }
}
