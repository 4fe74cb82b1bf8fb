//! Shared PID gain cache.

use parking_lot::RwLock;

use crate::error::CommandError;
use crate::messages::PidGains;

/// Last-known control gains.
///
/// Parameter pushes write it, every control-input encode reads it. Updates
/// are validated in full before any gain changes, so readers never observe
/// a partially applied push.
#[derive(Debug, Default)]
pub struct PidCache {
    gains: RwLock<PidGains>,
}

impl PidCache {
    pub fn new(initial: PidGains) -> Self {
        Self {
            gains: RwLock::new(initial),
        }
    }

    /// Snapshot of the current gains.
    pub fn get(&self) -> PidGains {
        *self.gains.read()
    }

    /// Merge named gains into the cache and return the resulting set.
    ///
    /// Names may carry the `f` prefix. An unknown name rejects the whole
    /// update.
    pub fn update<'a, I>(&self, values: I) -> Result<PidGains, CommandError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let values: Vec<(&str, f32)> = values.into_iter().collect();

        let mut staged = self.get();
        for &(name, value) in &values {
            if !staged.set(name, value) {
                return Err(CommandError::UnknownGain(name.to_string()));
            }
        }

        let mut gains = self.gains.write();
        for &(name, value) in &values {
            gains.set(name, value);
        }
        Ok(*gains)
    }

    /// Replace every gain.
    pub fn replace(&self, gains: PidGains) {
        *self.gains.write() = gains;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cache = PidCache::default();
        assert_eq!(cache.get().ka_phi, 0.5);
        assert_eq!(cache.get().kg_rpm, 0.01);
    }

    #[test]
    fn test_update_merges() {
        let cache = PidCache::default();
        let gains = cache.update([("KaPHI", 0.8), ("fKcH", 0.4)]).unwrap();
        assert_eq!(gains.ka_phi, 0.8);
        assert_eq!(gains.kc_h, 0.4);
        assert_eq!(gains.ka_p, 0.2);
        assert_eq!(cache.get(), gains);
    }

    #[test]
    fn test_unknown_name_rejects_everything() {
        let cache = PidCache::default();
        let err = cache.update([("KaPHI", 0.9), ("Bogus", 1.0)]).unwrap_err();
        assert!(matches!(err, CommandError::UnknownGain(name) if name == "Bogus"));
        assert_eq!(cache.get().ka_phi, 0.5);
    }

    #[test]
    fn test_replace() {
        let cache = PidCache::default();
        let mut gains = PidGains::default();
        gains.scale_factor = 0.5;
        cache.replace(gains);
        assert_eq!(cache.get().scale_factor, 0.5);
    }
}
