use std::fmt;
use std::sync::Arc;

use smart_leds::RGB8;

use crate::ids::create_id;

/// How an animation's state count relates to the zone size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Exactly `state_count` states.
    Constant,
    /// `state_count` extra states on top of one per LED.
    LedCountRelative,
}

/// Frame callback: paint `pixels` for `state` in `color`.
///
/// Returns `true` when the pixels changed and should be pushed.
pub type AnimationFn = Arc<dyn Fn(&mut [RGB8], RGB8, u16) -> bool + Send + Sync>;

/// A registered animation definition.
#[derive(Clone)]
pub struct AnimationInstance {
    pub id: u16,
    pub name: String,
    pub state_mode: StateMode,
    pub state_count: u16,
    pub default_delay_ms: u16,
    pub default_color: RGB8,
    callback: AnimationFn,
}

impl AnimationInstance {
    pub fn new<F>(
        name: impl Into<String>,
        state_mode: StateMode,
        state_count: u16,
        default_delay_ms: u16,
        default_color: RGB8,
        callback: F,
    ) -> Self
    where
        F: Fn(&mut [RGB8], RGB8, u16) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            id: create_id(&name),
            name,
            state_mode,
            state_count,
            default_delay_ms,
            default_color,
            callback: Arc::new(callback),
        }
    }

    /// Number of states when running on `led_count` LEDs; never zero.
    pub fn total_states(&self, led_count: usize) -> u16 {
        let total = match self.state_mode {
            StateMode::Constant => usize::from(self.state_count),
            StateMode::LedCountRelative => usize::from(self.state_count) + led_count,
        };
        total.clamp(1, usize::from(u16::MAX)) as u16
    }

    pub fn render(&self, pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
        (self.callback)(pixels, color, state)
    }
}

impl fmt::Debug for AnimationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationInstance")
            .field("id", &format_args!("{:#06x}", self.id))
            .field("name", &self.name)
            .field("state_mode", &self.state_mode)
            .field("state_count", &self.state_count)
            .field("default_delay_ms", &self.default_delay_ms)
            .finish_non_exhaustive()
    }
}
