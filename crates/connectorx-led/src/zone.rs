//! Per-zone animation state machines.
//!
//! A zone never owns pixels. Its channel lends it the zone's slice of the
//! channel buffer for the duration of each `update`.

use std::sync::Arc;

use connectorx_proto::ScrollDirection;
use smart_leds::RGB8;

use crate::animation::AnimationInstance;
use crate::bitmap::Frame;
use crate::config::{ZoneConfig, ZoneKindConfig};
use crate::ids::create_id;
use crate::layout::MatrixLayout;
use crate::registry::{AnimationSequence, BitmapInstance};
use crate::text::{MatrixCanvas, TextJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Strip,
    Matrix,
}

/// Timing and job state shared by both zone kinds.
#[derive(Debug, Clone)]
pub struct ZoneCore {
    id: u16,
    name: String,
    len: usize,
    brightness: u8,
    state: u16,
    color: RGB8,
    last_update_ms: u64,
    delay_ms: u16,
    one_shot: bool,
    done_running: bool,
}

impl ZoneCore {
    fn new(config: &ZoneConfig) -> Self {
        Self {
            id: create_id(&config.id),
            name: config.id.clone(),
            len: config.led_count(),
            brightness: config.brightness.unwrap_or(u8::MAX),
            state: 0,
            color: RGB8::default(),
            last_update_ms: 0,
            delay_ms: 0,
            one_shot: true,
            done_running: true,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn state(&self) -> u16 {
        self.state
    }

    pub fn color(&self) -> RGB8 {
        self.color
    }

    pub fn delay_ms(&self) -> u16 {
        self.delay_ms
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    pub fn done(&self) -> bool {
        self.one_shot && self.done_running
    }

    pub fn should_advance(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_update_ms) >= u64::from(self.delay_ms) && !self.done()
    }

    /// Re-arm from state 0.
    pub fn reset(&mut self, now_ms: u64) {
        self.state = 0;
        self.last_update_ms = now_ms;
        self.done_running = false;
    }

    fn arm(&mut self, delay_ms: u16, color: RGB8, one_shot: bool, now_ms: u64) {
        self.reset(now_ms);
        self.delay_ms = delay_ms;
        self.color = color;
        self.one_shot = one_shot;
    }

    fn halt(&mut self) {
        self.one_shot = true;
        self.done_running = true;
    }
}

/// Settings for one animation run on a strip.
#[derive(Debug, Clone)]
pub struct AnimationJob {
    pub animation: Arc<AnimationInstance>,
    pub delay_ms: u16,
    pub color: RGB8,
    pub reversed: bool,
    pub one_shot: bool,
}

#[derive(Debug, Clone)]
pub struct StripZone {
    core: ZoneCore,
    wired_reversed: bool,
    animation: Option<Arc<AnimationInstance>>,
    reversed: bool,
    cycles: u16,
    sequence: Option<Arc<AnimationSequence>>,
    step_index: usize,
}

impl StripZone {
    fn new(config: &ZoneConfig, wired_reversed: bool) -> Self {
        Self {
            core: ZoneCore::new(config),
            wired_reversed,
            animation: None,
            reversed: false,
            cycles: 0,
            sequence: None,
            step_index: 0,
        }
    }

    pub fn core(&self) -> &ZoneCore {
        &self.core
    }

    pub fn animation(&self) -> Option<&Arc<AnimationInstance>> {
        self.animation.as_ref()
    }

    pub fn sequence(&self) -> Option<&Arc<AnimationSequence>> {
        self.sequence.as_ref()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn set_animation(&mut self, job: AnimationJob, now_ms: u64) {
        self.sequence = None;
        self.step_index = 0;
        self.load(job, now_ms);
    }

    pub fn set_sequence(&mut self, sequence: Arc<AnimationSequence>, now_ms: u64) {
        self.sequence = Some(sequence);
        self.move_to_step(0, now_ms);
    }

    fn load(&mut self, job: AnimationJob, now_ms: u64) {
        self.core.arm(job.delay_ms, job.color, job.one_shot, now_ms);
        self.animation = Some(job.animation);
        self.reversed = job.reversed;
        self.cycles = 0;
    }

    fn move_to_step(&mut self, index: usize, now_ms: u64) {
        let Some(step) = self
            .sequence
            .as_ref()
            .and_then(|sequence| sequence.steps.get(index))
            .cloned()
        else {
            return;
        };
        self.step_index = index;
        self.load(
            AnimationJob {
                animation: step.animation,
                delay_ms: step.delay_ms,
                color: step.color,
                reversed: step.reversed,
                one_shot: step.one_shot,
            },
            now_ms,
        );
    }

    fn finish_step(&mut self, now_ms: u64) {
        let Some(sequence) = &self.sequence else {
            return;
        };
        let steps = sequence.steps.len();
        let last = self.step_index + 1 >= steps;
        if last && sequence.steps[self.step_index].one_shot {
            return;
        }
        self.move_to_step((self.step_index + 1) % steps, now_ms);
    }

    fn repeat_target(&self) -> u16 {
        self.sequence
            .as_ref()
            .and_then(|sequence| sequence.steps.get(self.step_index))
            .map_or(1, |step| step.repeat_count)
    }

    fn increment(&mut self, count: u16, now_ms: u64) {
        let next = self.core.state.saturating_add(1);
        if self.core.one_shot {
            if next >= count - 1 {
                self.core.state = count - 1;
                self.core.done_running = true;
                self.finish_step(now_ms);
            } else {
                self.core.state = next;
            }
        } else if next >= count {
            self.core.state = 0;
            self.cycles = self.cycles.saturating_add(1);
            if self.sequence.is_some() && self.cycles >= self.repeat_target() {
                self.finish_step(now_ms);
            }
        } else {
            self.core.state = next;
        }
    }

    /// Advance one frame if due; returns whether the pixels should be pushed.
    pub fn update(&mut self, pixels: &mut [RGB8], now_ms: u64) -> bool {
        if !self.core.should_advance(now_ms) {
            return false;
        }
        self.core.last_update_ms = now_ms;
        let Some(animation) = self.animation.clone() else {
            return false;
        };

        let count = animation.total_states(pixels.len());
        let state = self.core.state.min(count - 1);
        let state = if self.reversed != self.wired_reversed {
            count - 1 - state
        } else {
            state
        };
        let dirty = animation.render(pixels, self.core.color, state);
        self.increment(count, now_ms);
        dirty
    }

    fn stop(&mut self) {
        self.animation = None;
        self.sequence = None;
        self.core.halt();
    }
}

/// What a matrix zone is showing.
#[derive(Debug, Clone)]
pub enum MatrixJob {
    Idle,
    Bitmap {
        bitmap: Arc<BitmapInstance>,
        frames: Arc<[Frame]>,
        color: Option<RGB8>,
    },
    Text(TextJob),
}

#[derive(Debug, Clone)]
pub struct MatrixZone {
    core: ZoneCore,
    layout: MatrixLayout,
    job: MatrixJob,
}

impl MatrixZone {
    fn new(config: &ZoneConfig, layout: MatrixLayout) -> Self {
        Self {
            core: ZoneCore::new(config),
            layout,
            job: MatrixJob::Idle,
        }
    }

    pub fn core(&self) -> &ZoneCore {
        &self.core
    }

    pub fn layout(&self) -> MatrixLayout {
        self.layout
    }

    pub fn job(&self) -> &MatrixJob {
        &self.job
    }

    /// Show `frames`; static bitmaps render once and hold.
    pub fn set_bitmap(
        &mut self,
        bitmap: Arc<BitmapInstance>,
        frames: Arc<[Frame]>,
        color: Option<RGB8>,
        one_shot: bool,
        now_ms: u64,
    ) {
        let (delay, one_shot) = match bitmap.frame_delay_ms() {
            Some(delay) => (delay, one_shot),
            None => (0, true),
        };
        self.core
            .arm(delay, color.unwrap_or_default(), one_shot, now_ms);
        self.job = MatrixJob::Bitmap {
            bitmap,
            frames,
            color,
        };
    }

    pub fn set_text(
        &mut self,
        text: &str,
        color: RGB8,
        direction: ScrollDirection,
        delay_ms: u16,
        one_shot: bool,
        now_ms: u64,
    ) {
        self.core.arm(delay_ms, color, one_shot, now_ms);
        self.job = MatrixJob::Text(TextJob::new(text, direction));
    }

    fn draw_frame(&self, pixels: &mut [RGB8], frame: &Frame, color: Option<RGB8>) {
        let mut canvas = MatrixCanvas::new(pixels, self.layout);
        canvas.clear_black();
        for y in 0..frame.height.min(self.layout.rows()) {
            for x in 0..frame.width.min(self.layout.cols()) {
                let Some(px) = frame.pixel(x, y) else { continue };
                let px = match color {
                    Some(tint) if px != RGB8::default() => tint,
                    _ => px,
                };
                canvas.set(x, y, px);
            }
        }
    }

    fn step(&mut self, positions: u16) {
        if self.core.state + 1 >= positions {
            if self.core.one_shot {
                self.core.done_running = true;
            } else {
                self.core.state = 0;
            }
        } else {
            self.core.state += 1;
        }
    }

    pub fn update(&mut self, pixels: &mut [RGB8], now_ms: u64) -> bool {
        if !self.core.should_advance(now_ms) {
            return false;
        }
        self.core.last_update_ms = now_ms;

        let positions = match &self.job {
            MatrixJob::Idle => return false,
            MatrixJob::Bitmap { frames, color, .. } => {
                let Some(frame) = frames.get(usize::from(self.core.state)) else {
                    return false;
                };
                self.draw_frame(pixels, frame, *color);
                frames.len().min(usize::from(u16::MAX)) as u16
            }
            MatrixJob::Text(job) => {
                job.render(
                    &mut MatrixCanvas::new(pixels, self.layout),
                    self.core.state,
                    self.core.color,
                );
                job.positions(self.layout.cols())
            }
        };
        self.step(positions);
        true
    }

    fn stop(&mut self) {
        self.job = MatrixJob::Idle;
        self.core.halt();
    }
}

/// A zone of either kind.
#[derive(Debug, Clone)]
pub enum Zone {
    Strip(StripZone),
    Matrix(MatrixZone),
}

impl Zone {
    pub fn from_config(config: &ZoneConfig) -> Self {
        match config.kind {
            ZoneKindConfig::Strip { reversed, .. } => Zone::Strip(StripZone::new(config, reversed)),
            ZoneKindConfig::Matrix {
                rows,
                cols,
                orientation,
            } => Zone::Matrix(MatrixZone::new(
                config,
                MatrixLayout::new(rows, cols, orientation),
            )),
        }
    }

    pub fn kind(&self) -> ZoneKind {
        match self {
            Zone::Strip(_) => ZoneKind::Strip,
            Zone::Matrix(_) => ZoneKind::Matrix,
        }
    }

    pub fn core(&self) -> &ZoneCore {
        match self {
            Zone::Strip(zone) => &zone.core,
            Zone::Matrix(zone) => &zone.core,
        }
    }

    pub fn id(&self) -> u16 {
        self.core().id()
    }

    pub fn len(&self) -> usize {
        self.core().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core().is_empty()
    }

    pub fn done(&self) -> bool {
        self.core().done()
    }

    pub fn update(&mut self, pixels: &mut [RGB8], now_ms: u64) -> bool {
        match self {
            Zone::Strip(zone) => zone.update(pixels, now_ms),
            Zone::Matrix(zone) => zone.update(pixels, now_ms),
        }
    }

    /// Drop the current job; the pixels keep whatever was last written.
    pub fn stop(&mut self) {
        match self {
            Zone::Strip(zone) => zone.stop(),
            Zone::Matrix(zone) => zone.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::StateMode;
    use crate::config::{BitmapConfig, BitmapKindConfig};
    use crate::registry::{RegistryBuilder, SequenceStep};

    const GREEN: RGB8 = RGB8 { r: 0, g: 255, b: 0 };
    const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

    fn strip(len: u16) -> StripZone {
        let config = ZoneConfig {
            id: "zone1".into(),
            brightness: None,
            kind: ZoneKindConfig::Strip {
                length: len,
                reversed: false,
            },
        };
        StripZone::new(&config, false)
    }

    /// Records the state it was asked to render in pixel 0's red channel.
    fn counter(states: u16) -> Arc<AnimationInstance> {
        Arc::new(AnimationInstance::new(
            "Counter",
            StateMode::Constant,
            states,
            10,
            GREEN,
            |px: &mut [RGB8], _: RGB8, state: u16| {
                px[0].r = state as u8;
                true
            },
        ))
    }

    fn job(animation: Arc<AnimationInstance>, delay_ms: u16, one_shot: bool) -> AnimationJob {
        AnimationJob {
            animation,
            delay_ms,
            color: GREEN,
            reversed: false,
            one_shot,
        }
    }

    #[test]
    fn idle_zone_does_nothing() {
        let mut zone = strip(3);
        let mut px = [BLACK; 3];
        assert!(zone.core().done());
        assert!(!zone.update(&mut px, 1_000));
    }

    #[test]
    fn blink_scenario() {
        let registry = RegistryBuilder::with_builtins().build();
        let blink = registry.animation_by_name("Blink").unwrap().clone();
        let mut zone = strip(4);
        let mut px = [BLACK; 4];

        zone.set_animation(job(blink, 1000, false), 0);
        assert!(!zone.update(&mut px, 999));
        assert!(zone.update(&mut px, 1000));
        assert_eq!(px, [GREEN; 4]);
        assert!(zone.update(&mut px, 2000));
        assert_eq!(px, [BLACK; 4]);
        assert!(zone.update(&mut px, 3000));
        assert_eq!(px, [GREEN; 4]);
    }

    #[test]
    fn looping_state_wraps_after_k_advances() {
        let mut zone = strip(1);
        let mut px = [BLACK; 1];
        zone.set_animation(job(counter(4), 10, false), 0);

        let mut now = 0;
        for _ in 0..4 {
            now += 10;
            zone.update(&mut px, now);
        }
        assert_eq!(zone.core().state(), 0);
        assert!(!zone.core().done());
    }

    #[test]
    fn one_shot_is_done_after_k_minus_one_advances() {
        let mut zone = strip(1);
        let mut px = [BLACK; 1];
        zone.set_animation(job(counter(4), 10, true), 0);

        for i in 1..=3u64 {
            assert!(!zone.core().done());
            zone.update(&mut px, i * 10);
        }
        assert!(zone.core().done());
        assert_eq!(zone.core().state(), 3);

        let frozen = px;
        assert!(!zone.update(&mut px, 1_000));
        assert_eq!(px, frozen);
        assert_eq!(zone.core().state(), 3);
    }

    #[test]
    fn reversed_maps_state() {
        let mut zone = strip(1);
        let mut px = [BLACK; 1];
        let mut reversed = job(counter(4), 0, false);
        reversed.reversed = true;
        zone.set_animation(reversed, 0);

        zone.update(&mut px, 0);
        assert_eq!(px[0].r, 3);
        zone.update(&mut px, 0);
        assert_eq!(px[0].r, 2);
    }

    #[test]
    fn fill_as_color_paints_once_and_holds() {
        let registry = RegistryBuilder::with_builtins().build();
        let fill = registry.animation_by_name("Fill").unwrap().clone();
        let mut zone = strip(2);
        let mut px = [BLACK; 2];
        zone.set_animation(job(fill, 0, true), 5);
        assert!(zone.update(&mut px, 5));
        assert_eq!(px, [GREEN; 2]);
        assert!(zone.core().done());
        assert!(!zone.update(&mut px, 10));
    }

    fn sequence(last_one_shot: bool) -> Arc<AnimationSequence> {
        let step = |name: &str, one_shot: bool| SequenceStep {
            animation: Arc::new(AnimationInstance::new(
                name,
                StateMode::Constant,
                2,
                1,
                GREEN,
                |_: &mut [RGB8], _: RGB8, _: u16| true,
            )),
            delay_ms: 1,
            color: GREEN,
            reversed: false,
            repeat_count: 1,
            one_shot,
        };
        Arc::new(AnimationSequence {
            id: 1,
            name: "seq".into(),
            steps: vec![
                step("A", false),
                step("B", false),
                step("C", last_one_shot),
            ],
        })
    }

    #[test]
    fn sequence_cycles_through_steps() {
        let mut zone = strip(1);
        let mut px = [BLACK; 1];
        zone.set_sequence(sequence(false), 0);

        let mut seen = Vec::new();
        let mut now = 0;
        for _ in 0..8 {
            seen.push(zone.step_index());
            now += 1;
            zone.update(&mut px, now);
            now += 1;
            zone.update(&mut px, now);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0, 1]);
        assert!(!zone.core().done());
    }

    #[test]
    fn one_shot_final_step_ends_sequence() {
        let mut zone = strip(1);
        let mut px = [BLACK; 1];
        zone.set_sequence(sequence(true), 0);

        for now in 1..20 {
            zone.update(&mut px, now);
        }
        assert_eq!(zone.step_index(), 2);
        assert!(zone.core().done());
        assert!(!zone.update(&mut px, 100));
    }

    fn matrix(rows: u16, cols: u16) -> MatrixZone {
        let config = ZoneConfig {
            id: "panel".into(),
            brightness: None,
            kind: ZoneKindConfig::Matrix {
                rows,
                cols,
                orientation: 0,
            },
        };
        MatrixZone::new(&config, MatrixLayout::new(rows, cols, 0))
    }

    fn bitmap(kind: BitmapKindConfig, frames: u16) -> Arc<BitmapInstance> {
        Arc::new(BitmapInstance {
            id: 2,
            config: BitmapConfig {
                id: "bmp".into(),
                path: "bmp".into(),
                kind,
            },
            frame_count: frames,
        })
    }

    #[test]
    fn static_bitmap_renders_once_with_tint() {
        let mut zone = matrix(2, 2);
        let mut px = [BLACK; 4];
        let frame = Frame::from_pixels(1, 2, vec![GREEN, BLACK]).unwrap();
        let red = RGB8::new(255, 0, 0);

        zone.set_bitmap(
            bitmap(BitmapKindConfig::Static, 1),
            Arc::from(vec![frame]),
            Some(red),
            false,
            0,
        );
        assert!(zone.update(&mut px, 0));
        assert_eq!(px, [red, BLACK, BLACK, BLACK]);
        assert!(zone.core().done());
    }

    #[test]
    fn animated_one_shot_bitmap_freezes_on_last_frame() {
        let mut zone = matrix(1, 1);
        let mut px = [BLACK; 1];
        let frames: Vec<Frame> = (1..=3u8)
            .map(|v| Frame::from_pixels(1, 1, vec![RGB8::new(v, 0, 0)]).unwrap())
            .collect();
        zone.set_bitmap(
            bitmap(BitmapKindConfig::Animated { frame_delay: 5 }, 3),
            Arc::from(frames),
            None,
            true,
            0,
        );

        for now in [5, 10, 15] {
            assert!(zone.update(&mut px, now));
        }
        assert_eq!(px[0].r, 3);
        assert!(zone.core().done());
    }

    #[test]
    fn one_shot_text_stops_when_off_screen() {
        let mut zone = matrix(7, 8);
        let mut px = vec![BLACK; 56];
        zone.set_text("A", GREEN, ScrollDirection::Left, 0, true, 0);
        let MatrixJob::Text(job) = zone.job().clone() else {
            panic!("expected text job");
        };
        let positions = job.positions(8);

        let mut ever_lit = false;
        for _ in 0..positions {
            assert!(zone.update(&mut px, 0));
            ever_lit |= px.iter().any(|p| *p != BLACK);
        }
        assert!(ever_lit);
        assert!(zone.core().done());
        assert!(px.iter().all(|p| *p == BLACK));
    }

    #[test]
    fn stop_halts_job() {
        let mut zone = Zone::Strip(strip(2));
        if let Zone::Strip(inner) = &mut zone {
            inner.set_animation(job(counter(2), 0, false), 0);
        }
        zone.stop();
        assert!(zone.done());
        let mut px = [BLACK; 2];
        assert!(!zone.update(&mut px, 100));
    }
}
