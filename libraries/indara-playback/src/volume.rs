//! Volume control with mute
//!
//! Backends take a linear gain in 0.0-1.0. Muting drives the backend to zero
//! while the user level is kept for restoration.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// User volume level (0.0-1.0)
    level: f32,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl Volume {
    /// Create new volume controller
    ///
    /// Out-of-range and non-finite levels are clamped.
    pub fn new(level: f32) -> Self {
        Self {
            level: Self::sanitize(level),
            muted: false,
        }
    }

    /// Set volume level (0.0-1.0)
    ///
    /// Raising the level above zero while muted unmutes, matching how
    /// platform volume sliders behave.
    pub fn set_level(&mut self, level: f32) {
        self.level = Self::sanitize(level);
        if self.muted && self.level > 0.0 {
            self.muted = false;
        }
    }

    /// Get current volume level (0.0-1.0)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Mute audio (preserves volume level)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute audio (restores previous volume)
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Toggle mute state
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain handed to the backend
    ///
    /// Returns 0.0 if muted, otherwise the level
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }

    fn sanitize(level: f32) -> f32 {
        if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_volume() {
        let vol = Volume::new(0.8);
        assert_eq!(vol.level(), 0.8);
        assert!(!vol.is_muted());
    }

    #[test]
    fn set_volume_level_clamps() {
        let mut vol = Volume::new(0.5);
        vol.set_level(1.7);
        assert_eq!(vol.level(), 1.0);

        vol.set_level(-0.2);
        assert_eq!(vol.level(), 0.0);

        vol.set_level(f32::NAN);
        assert_eq!(vol.level(), 0.0);
    }

    #[test]
    fn mute_round_trip_restores_level() {
        let mut vol = Volume::new(0.6);

        vol.toggle_mute();
        assert!(vol.is_muted());
        assert_eq!(vol.gain(), 0.0);
        assert_eq!(vol.level(), 0.6);

        vol.toggle_mute();
        assert!(!vol.is_muted());
        assert_eq!(vol.gain(), 0.6);
    }

    #[test]
    fn raising_level_unmutes() {
        let mut vol = Volume::new(0.3);
        vol.mute();

        vol.set_level(0.0);
        assert!(vol.is_muted());

        vol.set_level(0.4);
        assert!(!vol.is_muted());
        assert_eq!(vol.gain(), 0.4);
    }
}
