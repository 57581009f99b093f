//! Ad placement selection for viewer pages.

use std::sync::Mutex;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::domain::viewer::{AdSlots, BannerAd, FloaterAd, UnderAd};

/// Average size above which the floater slot is enabled.
pub const FLOATER_THRESHOLD_BYTES: u64 = 10_000_000;
/// Average size above which the pop-under slot is enabled.
pub const UNDER_THRESHOLD_BYTES: u64 = 250_000_000;

const BANNER_ROTATION: [BannerAd; 3] = [BannerAd::ClickAduBanner, BannerAd::Brave, BannerAd::AAds];

/// Source of uniformly distributed integers. Not required to be
/// cryptographically secure.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..upper`. `upper` is never zero.
    fn below(&self, upper: u32) -> u32;
}

/// Per-thread generator used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: u32) -> u32 {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Deterministic generator for tests and reproducible runs.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, upper: u32) -> u32 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(0..upper)
    }
}

/// Pick ad placements for a batch of content sizes.
///
/// Returns `None` for an empty batch; callers only invoke this once at least
/// one item resolved.
pub fn select_ads(random: &dyn RandomSource, sizes: &[u64]) -> Option<AdSlots> {
    if sizes.is_empty() {
        return None;
    }

    let total: u128 = sizes.iter().map(|&size| u128::from(size)).sum();
    let average = (total / sizes.len() as u128) as u64;

    let banner = BANNER_ROTATION[random.below(BANNER_ROTATION.len() as u32) as usize];

    let floater = if average > FLOATER_THRESHOLD_BYTES {
        FloaterAd::Propeller
    } else {
        FloaterAd::None
    };

    let under = if average > UNDER_THRESHOLD_BYTES {
        UnderAd::ClickAduPopunder
    } else {
        UnderAd::None
    };

    Some(AdSlots {
        banner,
        floater,
        under,
    })
}
