//! Scrolling text on matrix zones, drawn with `embedded-graphics`.

use std::convert::Infallible;

use connectorx_proto::ScrollDirection;
use embedded_graphics::mono_font::ascii::FONT_5X7;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use smart_leds::RGB8;

use crate::layout::MatrixLayout;

const GLYPH_HEIGHT: i32 = 7;

/// `DrawTarget` over a matrix zone's slice of the channel buffer.
pub struct MatrixCanvas<'a> {
    pixels: &'a mut [RGB8],
    layout: MatrixLayout,
}

impl<'a> MatrixCanvas<'a> {
    pub fn new(pixels: &'a mut [RGB8], layout: MatrixLayout) -> Self {
        Self { pixels, layout }
    }

    pub fn clear_black(&mut self) {
        self.pixels.fill(RGB8::default());
    }

    pub fn set(&mut self, x: u16, y: u16, color: RGB8) {
        if let Some(px) = self
            .layout
            .index(x, y)
            .and_then(|i| self.pixels.get_mut(i))
        {
            *px = color;
        }
    }
}

impl OriginDimensions for MatrixCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(u32::from(self.layout.cols()), u32::from(self.layout.rows()))
    }
}

impl DrawTarget for MatrixCanvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u16::try_from(point.x), u16::try_from(point.y)) {
                self.set(x, y, RGB8::new(color.r(), color.g(), color.b()));
            }
        }
        Ok(())
    }
}

/// A text scroll in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextJob {
    text: String,
    direction: ScrollDirection,
    width: i32,
}

impl TextJob {
    pub fn new(text: impl Into<String>, direction: ScrollDirection) -> Self {
        let text = text.into();
        let width = text_width(&text);
        Self {
            text,
            direction,
            width,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// Scroll positions before the cycle repeats.
    pub fn positions(&self, cols: u16) -> u16 {
        (self.width + i32::from(cols) + 1).clamp(1, i32::from(u16::MAX)) as u16
    }

    /// Left edge of the text at scroll `step`.
    pub fn offset(&self, step: u16, cols: u16) -> i32 {
        match self.direction {
            ScrollDirection::Left => i32::from(cols) - i32::from(step),
            ScrollDirection::Right => i32::from(step) - self.width,
        }
    }

    pub fn render(&self, canvas: &mut MatrixCanvas<'_>, step: u16, color: RGB8) {
        canvas.clear_black();
        let rows = i32::from(canvas.layout.rows());
        let origin = Point::new(
            self.offset(step, canvas.layout.cols()),
            ((rows - GLYPH_HEIGHT) / 2).max(0),
        );
        let style = MonoTextStyle::new(&FONT_5X7, Rgb888::new(color.r, color.g, color.b));
        if let Err(never) = Text::with_baseline(&self.text, origin, style, Baseline::Top).draw(canvas) {
            match never {}
        }
    }
}

/// Pixel width of `text` in the matrix font.
pub fn text_width(text: &str) -> i32 {
    let style = MonoTextStyle::new(&FONT_5X7, Rgb888::WHITE);
    Text::with_baseline(text, Point::zero(), style, Baseline::Top)
        .bounding_box()
        .size
        .width as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };

    fn lit(pixels: &[RGB8]) -> usize {
        pixels.iter().filter(|p| **p != RGB8::default()).count()
    }

    #[test]
    fn width_grows_with_text() {
        assert_eq!(text_width(""), 0);
        assert!(text_width("A") >= 5);
        assert!(text_width("AB") > text_width("A"));
    }

    #[test]
    fn left_scroll_enters_from_the_right() {
        let layout = MatrixLayout::new(8, 8, 0);
        let job = TextJob::new("HI", ScrollDirection::Left);
        let mut pixels = vec![RGB8::default(); layout.len()];

        job.render(&mut MatrixCanvas::new(&mut pixels, layout), 0, RED);
        assert_eq!(lit(&pixels), 0);

        job.render(&mut MatrixCanvas::new(&mut pixels, layout), 8, RED);
        assert!(lit(&pixels) > 0);

        let last = job.positions(8) - 1;
        assert_eq!(job.offset(last, 8), -job.width());
        job.render(&mut MatrixCanvas::new(&mut pixels, layout), last, RED);
        assert_eq!(lit(&pixels), 0);
    }

    #[test]
    fn right_scroll_enters_from_the_left() {
        let job = TextJob::new("HI", ScrollDirection::Right);
        assert_eq!(job.offset(0, 8), -job.width());
        assert_eq!(job.offset(job.positions(8) - 1, 8), 8);
    }

    #[test]
    fn canvas_clips_out_of_range() {
        let layout = MatrixLayout::new(2, 2, 0);
        let mut pixels = vec![RGB8::default(); 4];
        let mut canvas = MatrixCanvas::new(&mut pixels, layout);
        canvas
            .draw_iter([
                Pixel(Point::new(-1, 0), Rgb888::RED),
                Pixel(Point::new(1, 1), Rgb888::RED),
                Pixel(Point::new(5, 0), Rgb888::RED),
            ])
            .unwrap();
        assert_eq!(pixels[3], RED);
        assert_eq!(lit(&pixels), 1);
    }
}
