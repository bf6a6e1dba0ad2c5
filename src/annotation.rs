use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::landmarks::{DisplaySize, LandmarkSet, Point, Region, EYE_NOSE_GUIDE, NOSE_LIP_GUIDE};

pub const MARKER_RADIUS: f32 = 5.0;
pub const LINE_WIDTH: u32 = 2;
const MARKER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LINE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Wipe the surface and size it to the display.
    Clear(DisplaySize),
    Marker { center: Point, radius: f32 },
    Polyline { points: Vec<Point>, closed: bool },
}

/// Drawing commands for one frame. Always starts with a clear.
pub fn annotate(faces: &[LandmarkSet], size: DisplaySize) -> Vec<DrawCommand> {
    let mut commands = vec![DrawCommand::Clear(size)];

    for face in faces.iter().filter(|f| !f.is_empty()) {
        commands.extend(face.points().iter().map(|&center| DrawCommand::Marker {
            center,
            radius: MARKER_RADIUS,
        }));

        for region in Region::ALL {
            if let Some(points) = face.region(region) {
                commands.push(DrawCommand::Polyline {
                    points: points.to_vec(),
                    closed: points.len() > 2,
                });
            }
        }

        for guide in [&EYE_NOSE_GUIDE[..], &NOSE_LIP_GUIDE[..]] {
            let points: Option<Vec<Point>> = guide.iter().map(|&i| face.point(i)).collect();
            if let Some(points) = points {
                commands.push(DrawCommand::Polyline {
                    points,
                    closed: false,
                });
            }
        }
    }

    commands
}

/// Transparent surface stacked over the video.
pub trait OverlaySurface {
    /// Rendered size of the host element, if layout fixes one.
    fn size(&self) -> Option<DisplaySize>;

    fn paint(&mut self, commands: &[DrawCommand]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// RGBA overlay painted with imageproc, optionally written out as PNG after each paint.
pub struct RasterOverlay {
    fixed_size: Option<DisplaySize>,
    image: RgbaImage,
    output: Option<PathBuf>,
}

impl RasterOverlay {
    pub fn new(fixed_size: Option<DisplaySize>, output: Option<PathBuf>) -> Self {
        let image = match fixed_size {
            Some(s) => RgbaImage::from_pixel(s.width, s.height, TRANSPARENT),
            None => RgbaImage::new(0, 0),
        };
        Self {
            fixed_size,
            image,
            output,
        }
    }

    #[cfg(test)]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn polyline(&mut self, points: &[Point], closed: bool) {
        let mut segments: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
        if closed {
            if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
                segments.push((last, first));
            }
        }
        for (a, b) in segments {
            for offset in 0..LINE_WIDTH {
                let d = offset as f32;
                draw_line_segment_mut(&mut self.image, (a.x + d, a.y), (b.x + d, b.y), LINE_COLOR);
                draw_line_segment_mut(&mut self.image, (a.x, a.y + d), (b.x, b.y + d), LINE_COLOR);
            }
        }
    }
}

impl OverlaySurface for RasterOverlay {
    fn size(&self) -> Option<DisplaySize> {
        self.fixed_size
    }

    fn paint(&mut self, commands: &[DrawCommand]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for command in commands {
            match command {
                DrawCommand::Clear(size) => {
                    self.image = RgbaImage::from_pixel(size.width, size.height, TRANSPARENT);
                }
                DrawCommand::Marker { center, radius } => {
                    draw_filled_circle_mut(
                        &mut self.image,
                        (center.x.round() as i32, center.y.round() as i32),
                        radius.round() as i32,
                        MARKER_COLOR,
                    );
                }
                DrawCommand::Polyline { points, closed } => self.polyline(points, *closed),
            }
        }

        if let Some(ref path) = self.output {
            if self.image.width() > 0 && self.image.height() > 0 {
                self.image
                    .save(path)
                    .map_err(|e| format!("Writing overlay {}: {e}", path.display()))?;
            }
        }
        Ok(())
    }
}
