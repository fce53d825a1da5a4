// Two stacked panels, X_1 on top and Y_1 below, of voltage (uV) against elapsed time (s).
use crate::conversions::to_microvolts;
use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use log::debug;
use std::path::Path;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

const MARGIN_LEFT: u32 = 70;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 25;
const MARGIN_BOTTOM: u32 = 35;

const TICKS: u32 = 5;
const TICK_LENGTH: f32 = 5.0;
const POINT_RADIUS: i32 = 2;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([0, 0, 0]);
const ZERO_LINE: Rgb<u8> = Rgb([190, 190, 190]);
const POINT: Rgb<u8> = Rgb([0, 191, 191]);

/// The y-range for a channel whose running extremes are `min` and `max`. Each bound is pushed
/// away from the data by a factor of two depending on which side of zero it sits, so points
/// never touch the edge. `None` when no rule applies (for example while `min` is still zero).
pub fn axis_limits(min: f64, max: f64) -> Option<(f64, f64)> {
    if 0.0 < min && min < max {
        Some((min / 2.0, max * 2.0))
    } else if min < 0.0 && 0.0 < max {
        Some((min * 2.0, max * 2.0))
    } else if min < max && max < 0.0 {
        Some((min * 2.0, max / 2.0))
    } else {
        None
    }
}

/// Running extremes of a channel, both starting at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningRange {
    pub min: f64,
    pub max: f64,
}

impl RunningRange {
    pub fn update(&mut self, value: f64) {
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Series {
    points: Vec<(f64, f64)>,
    range: RunningRange,
}

impl Series {
    pub fn push(&mut self, elapsed: f64, volts: f64) {
        self.points.push((elapsed, to_microvolts(volts)));
        self.range.update(volts);
    }

    /// Points as (seconds, microvolts).
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn range(&self) -> RunningRange {
        self.range
    }

    pub fn y_limits(&self) -> (f64, f64) {
        axis_limits(to_microvolts(self.range.min), to_microvolts(self.range.max))
            .unwrap_or_else(|| self.fitted_limits())
    }

    fn fitted_limits(&self) -> (f64, f64) {
        let mut values = self.points.iter().map(|&(_, value)| value);
        let Some(first) = values.next() else {
            return (-1.0, 1.0);
        };
        let (low, high) = values.fold((first, first), |(low, high), value| {
            (low.min(value), high.max(value))
        });

        let span = high - low;
        let padding = if span > 0.0 {
            span * 0.05
        } else {
            (high.abs() * 0.1).max(1.0)
        };
        (low - padding, high + padding)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plot {
    x: Series,
    y: Series,
}

impl Plot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, elapsed: f64, x_volts: f64, y_volts: f64) {
        self.x.push(elapsed, x_volts);
        self.y.push(elapsed, y_volts);
    }

    pub fn x(&self) -> &Series {
        &self.x
    }

    pub fn y(&self) -> &Series {
        &self.y
    }

    pub fn render(&self) -> RgbImage {
        let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

        let end = self
            .x
            .points
            .iter()
            .map(|&(elapsed, _)| elapsed)
            .fold(0.0, f64::max);
        let time_limits = (0.0, if end > 0.0 { end } else { 1.0 });

        let panel_height = HEIGHT / 2;
        draw_panel(&mut image, &self.x, 0, panel_height, time_limits);
        draw_panel(&mut image, &self.y, panel_height, panel_height, time_limits);
        image
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(
            "Saving plot of {} points to {}",
            self.x.points.len(),
            path.to_string_lossy()
        );
        self.render()
            .save_with_format(path, ImageFormat::Png)
            .context(format!(
                "Could not save plot image to {}",
                path.to_string_lossy()
            ))
    }
}

fn draw_panel(
    image: &mut RgbImage,
    series: &Series,
    offset: u32,
    height: u32,
    (t_min, t_max): (f64, f64),
) {
    let left = MARGIN_LEFT as f32;
    let right = (WIDTH - MARGIN_RIGHT) as f32;
    let top = (offset + MARGIN_TOP) as f32;
    let bottom = (offset + height - MARGIN_BOTTOM) as f32;

    let (v_min, v_max) = series.y_limits();
    let map = |elapsed: f64, value: f64| -> (f32, f32) {
        let x = left + ((elapsed - t_min) / (t_max - t_min)) as f32 * (right - left);
        let y = bottom - ((value - v_min) / (v_max - v_min)) as f32 * (bottom - top);
        (x, y)
    };

    if v_min < 0.0 && 0.0 < v_max {
        let (_, zero) = map(t_min, 0.0);
        draw_line_segment_mut(image, (left, zero), (right, zero), ZERO_LINE);
    }

    for tick in 0..=TICKS {
        let fraction = tick as f32 / TICKS as f32;
        let x = left + fraction * (right - left);
        let y = bottom - fraction * (bottom - top);
        draw_line_segment_mut(image, (x, bottom), (x, bottom + TICK_LENGTH), FRAME);
        draw_line_segment_mut(image, (left - TICK_LENGTH, y), (left, y), FRAME);
    }

    draw_hollow_rect_mut(
        image,
        Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32),
        FRAME,
    );

    for &(elapsed, value) in &series.points {
        if value < v_min || value > v_max {
            continue;
        }
        let (x, y) = map(elapsed, value);
        draw_filled_circle_mut(image, (x.round() as i32, y.round() as i32), POINT_RADIUS, POINT);
    }
}
