//! Shared synthesis parameters
//!
//! [`AudioParameters`] is written by the state bus and read by the audio
//! callback on every block. The whole triple is swapped atomically through
//! [`ParameterStore`], so a reader never pairs a fresh frequency with a stale
//! gate, and the audio thread never waits on a lock.

use arc_swap::ArcSwap;
use serde::Serialize;

/// Frequency, volume and gate as one consistent value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioParameters {
    pub frequency_hz: f64,
    /// Output level in [0, 1]
    pub volume: f64,
    pub is_playing: bool,
}

impl Default for AudioParameters {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            volume: 0.5,
            is_playing: false,
        }
    }
}

impl AudioParameters {
    /// True when these parameters produce silence
    pub fn is_silent(&self) -> bool {
        !self.is_playing || self.frequency_hz <= 0.0
    }

    fn sanitized(mut self) -> Self {
        self.volume = self.volume.clamp(0.0, 1.0);
        if self.frequency_hz < 0.0 {
            self.frequency_hz = 0.0;
        }
        self
    }
}

/// Lock-free holder of the current [`AudioParameters`]
pub struct ParameterStore {
    current: ArcSwap<AudioParameters>,
}

impl ParameterStore {
    pub fn new(initial: AudioParameters) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial.sanitized()),
        }
    }

    /// Consistent snapshot of all three fields
    pub fn load(&self) -> AudioParameters {
        **self.current.load()
    }

    /// Replace the whole triple
    pub fn store(&self, params: AudioParameters) {
        self.current.store(std::sync::Arc::new(params.sanitized()));
    }

    /// Read-modify-write the triple; returns the stored value
    pub fn update<F>(&self, f: F) -> AudioParameters
    where
        F: Fn(&mut AudioParameters),
    {
        let previous = self.current.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next.sanitized()
        });
        let mut next = *previous;
        f(&mut next);
        next.sanitized()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(AudioParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_defaults() {
        let store = ParameterStore::default();
        let p = store.load();
        assert_eq!(p.frequency_hz, 440.0);
        assert_eq!(p.volume, 0.5);
        assert!(!p.is_playing);
        assert!(p.is_silent());
    }

    #[test]
    fn test_store_clamps_volume_and_frequency() {
        let store = ParameterStore::default();
        store.store(AudioParameters {
            frequency_hz: -10.0,
            volume: 1.5,
            is_playing: true,
        });
        let p = store.load();
        assert_eq!(p.frequency_hz, 0.0);
        assert_eq!(p.volume, 1.0);
        assert!(p.is_silent());
    }

    #[test]
    fn test_update_keeps_other_fields() {
        let store = ParameterStore::new(AudioParameters {
            frequency_hz: 640.0,
            volume: 0.5,
            is_playing: true,
        });
        let p = store.update(|p| p.volume = 0.25);
        assert_eq!(p, store.load());
        assert_eq!(p.frequency_hz, 640.0);
        assert_eq!(p.volume, 0.25);
        assert!(p.is_playing);
    }

    #[test]
    fn test_readers_never_see_torn_triples() {
        // Writer alternates between two consistent states; readers must only
        // ever observe one of them.
        let a = AudioParameters { frequency_hz: 300.0, volume: 0.2, is_playing: true };
        let b = AudioParameters { frequency_hz: 0.0, volume: 0.9, is_playing: false };
        let store = Arc::new(ParameterStore::new(a));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..20_000 {
                    store.store(if i % 2 == 0 { b } else { a });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..20_000 {
                        let p = store.load();
                        assert!(p == a || p == b, "torn read: {:?}", p);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
