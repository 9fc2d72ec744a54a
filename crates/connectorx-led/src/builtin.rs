//! Animations every device ships with.

use std::f32::consts::PI;

use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::RGB8;

use crate::animation::{AnimationInstance, StateMode};

pub const DEFAULT_COLOR: RGB8 = RGB8 { r: 0, g: 0, b: 255 };
const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Scale a channel by `scale / 256`, keeping full scale lossless.
pub fn scale8(value: u8, scale: u8) -> u8 {
    ((u16::from(value) * (1 + u16::from(scale))) >> 8) as u8
}

pub fn scale_color(color: RGB8, scale: u8) -> RGB8 {
    RGB8 {
        r: scale8(color.r, scale),
        g: scale8(color.g, scale),
        b: scale8(color.b, scale),
    }
}

fn hue(h: u8) -> RGB8 {
    hsv2rgb(Hsv {
        hue: h,
        sat: 255,
        val: 255,
    })
}

/// 0..=255..=0 over 512 states.
fn triangle(state: u16) -> u8 {
    let state = state % 512;
    if state > 255 {
        (511 - state) as u8
    } else {
        state as u8
    }
}

fn none(_: &mut [RGB8], _: RGB8, _: u16) -> bool {
    false
}

fn fill(pixels: &mut [RGB8], color: RGB8, _: u16) -> bool {
    pixels.fill(color);
    true
}

fn blink(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    match state {
        0 => pixels.fill(color),
        1 => pixels.fill(BLACK),
        _ => return false,
    }
    true
}

fn breathe(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    pixels.fill(scale_color(color, triangle(state)));
    true
}

fn rainbow_roll(pixels: &mut [RGB8], _: RGB8, state: u16) -> bool {
    let count = pixels.len().max(1);
    for (i, px) in pixels.iter_mut().enumerate() {
        let offset = (i * 256 / count) as u8;
        *px = hue((state as u8).wrapping_add(offset));
    }
    true
}

fn sine_roll(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    let phase = 2.0 * PI / 60.0 * f32::from(60 - state.min(60));
    for (i, px) in pixels.iter_mut().enumerate() {
        let wave = (PI / 60.0 * i as f32 + phase).sin() + 1.0;
        *px = scale_color(color, (255.0 * wave / 2.0) as u8);
    }
    true
}

const CHASE_WIDTH: u16 = 5;

fn chase(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    let state = usize::from(state);
    let width = usize::from(CHASE_WIDTH);
    for (i, px) in pixels.iter_mut().enumerate() {
        let slot = i + width;
        *px = if slot >= state && slot < state + width {
            color
        } else {
            BLACK
        };
    }
    true
}

fn fade_in(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    pixels.fill(scale_color(color, state.min(255) as u8));
    true
}

fn fade_out(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    pixels.fill(scale_color(color, 255 - state.min(255) as u8));
    true
}

fn rainbow_cycle(pixels: &mut [RGB8], _: RGB8, state: u16) -> bool {
    pixels.fill(hue(state as u8));
    true
}

fn alternate_breathe(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    let odd_phase = state % 1024 > 511;
    let lit = scale_color(color, triangle(state));
    for (i, px) in pixels.iter_mut().enumerate() {
        *px = if (i % 2 == 1) == odd_phase { lit } else { BLACK };
    }
    true
}

fn growing_breathe(pixels: &mut [RGB8], color: RGB8, state: u16) -> bool {
    let level = state.min(255) as u8;
    let lit = (usize::from(level) * pixels.len() + 128) / 256;
    let (head, tail) = pixels.split_at_mut(lit.min(pixels.len()));
    head.fill(scale_color(color, level));
    tail.fill(BLACK);
    true
}

/// The built-in table, in registration order.
pub fn builtin_animations() -> Vec<AnimationInstance> {
    use StateMode::{Constant, LedCountRelative};

    vec![
        AnimationInstance::new("None", Constant, 1, u16::MAX, BLACK, none),
        AnimationInstance::new("Fill", Constant, 1, 20_000, DEFAULT_COLOR, fill),
        AnimationInstance::new("Blink", Constant, 2, 1_000, DEFAULT_COLOR, blink),
        AnimationInstance::new("Breathe", Constant, 512, 5, DEFAULT_COLOR, breathe),
        AnimationInstance::new("RainbowRoll", Constant, 256, 10, DEFAULT_COLOR, rainbow_roll),
        AnimationInstance::new("SineRoll", Constant, 60, 5, DEFAULT_COLOR, sine_roll),
        AnimationInstance::new("Chase", LedCountRelative, CHASE_WIDTH, 25, DEFAULT_COLOR, chase),
        AnimationInstance::new("FadeIn", Constant, 256, 5, DEFAULT_COLOR, fade_in),
        AnimationInstance::new("FadeOut", Constant, 256, 5, DEFAULT_COLOR, fade_out),
        AnimationInstance::new("RainbowCycle", Constant, 256, 10, DEFAULT_COLOR, rainbow_cycle),
        AnimationInstance::new(
            "AlternateBreathe",
            Constant,
            1024,
            10,
            DEFAULT_COLOR,
            alternate_breathe,
        ),
        AnimationInstance::new("GrowingBreathe", Constant, 256, 10, DEFAULT_COLOR, growing_breathe),
    ]
}
