// Skeleton overlay rendering

use crate::core::config::PracticeConfig;
use crate::models::pose::{BodyLandmark, Keypoint, PoseError, PoseResult};
use crate::models::session::{Rgb, SkeletonFeedback};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Landmark pairs joined by a line on the overlay
pub const SKELETON_CONNECTIONS: [(BodyLandmark, BodyLandmark); 16] = [
    (BodyLandmark::Nose, BodyLandmark::LeftEar),
    (BodyLandmark::Nose, BodyLandmark::RightEar),
    (BodyLandmark::LeftEar, BodyLandmark::LeftShoulder),
    (BodyLandmark::RightEar, BodyLandmark::RightShoulder),
    (BodyLandmark::LeftShoulder, BodyLandmark::RightShoulder),
    (BodyLandmark::LeftShoulder, BodyLandmark::LeftElbow),
    (BodyLandmark::LeftShoulder, BodyLandmark::LeftHip),
    (BodyLandmark::RightShoulder, BodyLandmark::RightElbow),
    (BodyLandmark::RightShoulder, BodyLandmark::RightHip),
    (BodyLandmark::LeftElbow, BodyLandmark::LeftWrist),
    (BodyLandmark::RightElbow, BodyLandmark::RightWrist),
    (BodyLandmark::LeftHip, BodyLandmark::LeftKnee),
    (BodyLandmark::LeftHip, BodyLandmark::RightHip),
    (BodyLandmark::RightHip, BodyLandmark::RightKnee),
    (BodyLandmark::LeftKnee, BodyLandmark::LeftAnkle),
    (BodyLandmark::RightKnee, BodyLandmark::RightAnkle),
];

/// Drawing surface for the skeleton overlay, in frame pixel coordinates
pub trait SkeletonCanvas: Send {
    fn clear(&mut self);

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb);

    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub point_color: Rgb,
    pub point_radius: f32,
    pub line_width: f32,
}

impl RenderStyle {
    pub fn from_config(config: &PracticeConfig) -> Self {
        Self {
            point_color: config.point_color,
            point_radius: config.point_radius,
            line_width: config.line_width,
        }
    }
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::from_config(&PracticeConfig::default())
    }
}

/// Redraw the whole overlay for one tick
///
/// `keypoints` are the landmarks that passed the confidence filter; segments
/// are drawn only between two of them, in the tick's skeleton color.
pub fn render_skeleton(
    canvas: &mut dyn SkeletonCanvas,
    keypoints: &[(BodyLandmark, Keypoint)],
    feedback: &SkeletonFeedback,
    style: &RenderStyle,
) {
    canvas.clear();

    let lookup = |landmark: BodyLandmark| {
        keypoints
            .iter()
            .find(|(l, _)| *l == landmark)
            .map(|(_, kp)| (kp.x, kp.y))
    };

    for (from, to) in SKELETON_CONNECTIONS {
        if let (Some(a), Some(b)) = (lookup(from), lookup(to)) {
            canvas.draw_segment(a, b, style.line_width, feedback.skeleton_color);
        }
    }

    for (landmark, kp) in keypoints {
        if landmark.is_eye() {
            continue;
        }
        canvas.draw_point(kp.x, kp.y, style.point_radius, style.point_color);
    }
}

// ==============================================================================
// Raster Canvas
// ==============================================================================

/// Transparent RGBA overlay the size of the video frame
pub struct ImageCanvas {
    image: RgbaImage,
}

impl ImageCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save(&self, path: &Path) -> PoseResult<()> {
        self.image
            .save(path)
            .map_err(|e| PoseError::RenderFailed(e.to_string()))
    }

    fn fill_disk(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        let (width, height) = self.image.dimensions();
        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
        let max_y = ((cy + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));
        if width == 0 || height == 0 || cx + radius < 0.0 || cy + radius < 0.0 {
            return;
        }

        let r2 = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.image.put_pixel(x, y, color);
                }
            }
        }
    }
}

impl SkeletonCanvas for ImageCanvas {
    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb) {
        self.fill_disk(x, y, radius, Rgba(color.to_rgba()));
    }

    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb) {
        let length = (to.0 - from.0).hypot(to.1 - from.1);
        let steps = (length * 2.0).ceil().max(1.0) as usize;
        let radius = (width * 0.5).max(0.5);
        let rgba = Rgba(color.to_rgba());

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.fill_disk(x, y, radius, rgba);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Call {
        Clear,
        Point(f32, f32, Rgb),
        Segment((f32, f32), (f32, f32), Rgb),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        calls: Vec<Call>,
    }

    impl SkeletonCanvas for RecordingCanvas {
        fn clear(&mut self) {
            self.calls.push(Call::Clear);
        }

        fn draw_point(&mut self, x: f32, y: f32, _radius: f32, color: Rgb) {
            self.calls.push(Call::Point(x, y, color));
        }

        fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32), _width: f32, color: Rgb) {
            self.calls.push(Call::Segment(from, to, color));
        }
    }

    fn holding() -> SkeletonFeedback {
        SkeletonFeedback {
            holding: true,
            skeleton_color: Rgb::GREEN,
        }
    }

    #[test]
    fn test_clears_before_drawing() {
        let mut canvas = RecordingCanvas::default();
        render_skeleton(&mut canvas, &[], &holding(), &RenderStyle::default());
        assert_eq!(canvas.calls, vec![Call::Clear]);
    }

    #[test]
    fn test_segments_need_both_ends() {
        let mut canvas = RecordingCanvas::default();
        let keypoints = vec![
            (BodyLandmark::LeftShoulder, Keypoint::new(10.0, 10.0, 0.9)),
            (BodyLandmark::LeftElbow, Keypoint::new(10.0, 30.0, 0.9)),
            (BodyLandmark::RightKnee, Keypoint::new(40.0, 60.0, 0.9)),
        ];
        render_skeleton(&mut canvas, &keypoints, &holding(), &RenderStyle::default());

        let segments: Vec<&Call> = canvas
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Segment(..)))
            .collect();
        assert_eq!(
            segments,
            vec![&Call::Segment((10.0, 10.0), (10.0, 30.0), Rgb::GREEN)]
        );

        let points = canvas.calls.iter().filter(|c| matches!(c, Call::Point(..))).count();
        assert_eq!(points, 3);
    }

    #[test]
    fn test_eyes_are_not_drawn() {
        let mut canvas = RecordingCanvas::default();
        let keypoints = vec![
            (BodyLandmark::LeftEye, Keypoint::new(5.0, 5.0, 0.9)),
            (BodyLandmark::Nose, Keypoint::new(6.0, 6.0, 0.9)),
        ];
        let feedback = SkeletonFeedback {
            holding: false,
            skeleton_color: Rgb::WHITE,
        };
        render_skeleton(&mut canvas, &keypoints, &feedback, &RenderStyle::default());

        assert_eq!(
            canvas.calls,
            vec![Call::Clear, Call::Point(6.0, 6.0, Rgb::WHITE)]
        );
    }

    #[test]
    fn test_image_canvas_draws_and_clears() {
        let mut canvas = ImageCanvas::new(64, 48);
        canvas.draw_segment((4.0, 24.0), (60.0, 24.0), 2.0, Rgb::GREEN);
        canvas.draw_point(32.0, 10.0, 3.0, Rgb::WHITE);

        assert_eq!(canvas.image().get_pixel(30, 24), &Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.image().get_pixel(32, 10), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));

        canvas.clear();
        assert!(canvas.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_image_canvas_clips_out_of_bounds() {
        let mut canvas = ImageCanvas::new(10, 10);
        canvas.draw_point(-20.0, -20.0, 4.0, Rgb::WHITE);
        canvas.draw_point(9.5, 9.5, 3.0, Rgb::WHITE);
        canvas.draw_segment((-5.0, 5.0), (50.0, 5.0), 2.0, Rgb::GREEN);

        assert_eq!(canvas.image().get_pixel(9, 9), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.image().get_pixel(0, 5), &Rgba([0, 255, 0, 255]));
    }
}
