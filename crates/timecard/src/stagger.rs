// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::RangeInclusive;
use std::time::Duration;

use parking_lot::Mutex;

use crate::rnd::Rnd;

/// Offsets are whole minutes in this range.
pub(crate) const STAGGER_MINUTES: RangeInclusive<u32> = 1..=20;

const MAX_DRAWS: u32 = 10;

/// Picks a random wait before each identifier's first attempt.
///
/// Offsets already handed out in the run are avoided; after [`MAX_DRAWS`] draws that all hit a
/// taken offset the last one is used anyway and reported as a coincidence.
#[derive(Debug)]
pub(crate) struct Stagger {
    rnd: Rnd,
    taken: Mutex<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StaggerDelay {
    pub delay: Duration,
    pub coincided: bool,
}

impl Stagger {
    pub fn new(rnd: Rnd) -> Self {
        Self {
            rnd,
            taken: Mutex::new(Vec::new()),
        }
    }

    pub fn next_delay(&self) -> StaggerDelay {
        let mut taken = self.taken.lock();

        let mut minutes = self.rnd.next_in(STAGGER_MINUTES);
        let mut draws = 1;
        while taken.contains(&minutes) && draws < MAX_DRAWS {
            minutes = self.rnd.next_in(STAGGER_MINUTES);
            draws += 1;
        }

        let coincided = taken.contains(&minutes);
        taken.push(minutes);

        StaggerDelay {
            delay: Duration::from_secs(u64::from(minutes) * 60),
            coincided,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[test]
    fn distinct_draws_are_kept() {
        let stagger = Stagger::new(Rnd::scripted([3, 7]));

        assert_eq!(
            stagger.next_delay(),
            StaggerDelay {
                delay: minutes(3),
                coincided: false
            }
        );
        assert_eq!(
            stagger.next_delay(),
            StaggerDelay {
                delay: minutes(7),
                coincided: false
            }
        );
    }

    #[test]
    fn taken_offset_is_redrawn() {
        let stagger = Stagger::new(Rnd::scripted([5, 5, 5, 12]));

        assert_eq!(stagger.next_delay().delay, minutes(5));

        let second = stagger.next_delay();
        assert_eq!(second.delay, minutes(12));
        assert!(!second.coincided);
    }

    #[test]
    fn persistent_collision_is_reported() {
        let stagger = Stagger::new(Rnd::scripted([9]));

        assert!(!stagger.next_delay().coincided);

        let second = stagger.next_delay();
        assert_eq!(second.delay, minutes(9));
        assert!(second.coincided);
    }

    #[test]
    fn real_offsets_stay_in_range() {
        let stagger = Stagger::new(Rnd::default());

        for _ in 0..10 {
            let delay = stagger.next_delay().delay;
            assert!(delay >= minutes(1) && delay <= minutes(20), "{delay:?}");
        }
    }
}
