//! Crop-region geometry.
//!
//! This module owns the crop rectangle shown over the captured screenshot
//! and the drag state machine that moves and resizes it. It is pure
//! geometry: all inputs are pointer positions in display space, all
//! outputs are rectangles, and out-of-range input saturates instead of
//! erroring.
//!
//! # Coordinate spaces
//!
//! *Display* coordinates are the pixel space of the rendered, aspect-fit
//! image. *Source* (natural) coordinates are the pixel space of the
//! original capture. [`RegionSelector::to_source_rect`] maps between them.

use eframe::egui;

/// Minimum crop-region edge length, in display units.
pub const MIN_REGION_SIZE: f32 = 50.0;

/// Natural (source pixel) and display (aspect-fit rendered) sizes of the
/// image under selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDimensions {
    pub natural_width: f32,
    pub natural_height: f32,
    pub display_width: f32,
    pub display_height: f32,
}

impl ImageDimensions {
    /// Computes the display size for an image rendered aspect-fit inside
    /// `viewport`. The aspect ratio is preserved and the display size never
    /// exceeds the viewport on either axis.
    pub fn aspect_fit(natural_width: f32, natural_height: f32, viewport: egui::Vec2) -> Self {
        let scale = (viewport.x / natural_width).min(viewport.y / natural_height);
        Self {
            natural_width,
            natural_height,
            display_width: natural_width * scale,
            display_height: natural_height * scale,
        }
    }

    pub fn display_size(&self) -> egui::Vec2 {
        egui::vec2(self.display_width, self.display_height)
    }
}

/// The crop rectangle, in display coordinates.
///
/// Maintained invariants: non-negative origin, `x + width` and `y + height`
/// inside the display bounds, and both edges at least [`MIN_REGION_SIZE`]
/// (boundary clamping near the display edge wins over the minimum).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    /// Default placement when an image first loads: 10% / 20% inset,
    /// 80% / 40% of the display size.
    pub fn default_for(dims: &ImageDimensions) -> Self {
        Self {
            x: dims.display_width * 0.1,
            y: dims.display_height * 0.2,
            width: dims.display_width * 0.8,
            height: dims.display_height * 0.4,
        }
    }

    pub fn to_rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(self.x, self.y), egui::vec2(self.width, self.height))
    }

    pub fn contains(&self, p: egui::Pos2) -> bool {
        self.to_rect().contains(p)
    }

    /// Position of a resize handle, or the region center for [`Handle::Move`].
    pub fn handle_pos(&self, handle: Handle) -> egui::Pos2 {
        match handle {
            Handle::Move => self.to_rect().center(),
            Handle::TopLeft => egui::pos2(self.x, self.y),
            Handle::TopRight => egui::pos2(self.x + self.width, self.y),
            Handle::BottomLeft => egui::pos2(self.x, self.y + self.height),
            Handle::BottomRight => egui::pos2(self.x + self.width, self.y + self.height),
        }
    }
}

/// Crop rectangle mapped into source pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The five drag affordances on the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Move,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    /// The four corner handles, in drawing order.
    pub const CORNERS: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];
}

/// Gesture state captured at drag start. Exists only while a drag is active.
#[derive(Debug, Clone, Copy)]
struct DragSession {
    handle: Handle,
    origin_region: CropRegion,
    origin_pointer: egui::Pos2,
}

/// Interactive crop-region state machine.
///
/// One selector tracks one region over one image. At most one drag session
/// is open at a time; a second [`begin_drag`](Self::begin_drag) while a
/// session is active is rejected.
#[derive(Debug)]
pub struct RegionSelector {
    dims: ImageDimensions,
    region: CropRegion,
    session: Option<DragSession>,
}

impl RegionSelector {
    /// Creates a selector with the default region placement for `dims`.
    ///
    /// Call again (or [`reset`](Self::reset)) whenever a new image loads or
    /// the display size is recomputed.
    pub fn new(dims: ImageDimensions) -> Self {
        Self {
            dims,
            region: CropRegion::default_for(&dims),
            session: None,
        }
    }

    /// Replaces the image dimensions and re-derives the default region.
    /// Any open drag session is discarded.
    pub fn reset(&mut self, dims: ImageDimensions) {
        *self = Self::new(dims);
    }

    pub fn dimensions(&self) -> &ImageDimensions {
        &self.dims
    }

    pub fn region(&self) -> CropRegion {
        self.region
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Finds the handle under `pointer`: corner handles within
    /// `handle_radius` take priority, anywhere inside the region is a move.
    pub fn hit_test(&self, pointer: egui::Pos2, handle_radius: f32) -> Option<Handle> {
        for handle in Handle::CORNERS {
            if self.region.handle_pos(handle).distance(pointer) <= handle_radius {
                return Some(handle);
            }
        }
        if self.region.contains(pointer) {
            return Some(Handle::Move);
        }
        None
    }

    /// Opens a drag session for `handle`, capturing the current region and
    /// pointer as the gesture origin.
    ///
    /// Returns `false` (and changes nothing) if a session is already open:
    /// only one drag may manipulate the region at a time.
    pub fn begin_drag(&mut self, handle: Handle, pointer: egui::Pos2) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.session = Some(DragSession {
            handle,
            origin_region: self.region,
            origin_pointer: pointer,
        });
        true
    }

    /// Applies the pointer delta from the session origin to the region.
    ///
    /// Corner handles resize with the dragged edges floored at
    /// [`MIN_REGION_SIZE`]; the move handle translates with both axes
    /// clamped into the display. A final, independent boundary pass caps
    /// width and height so the region never extends past the display —
    /// that pass always wins over handle-driven growth.
    ///
    /// Without an open session the region is returned unchanged.
    pub fn update_drag(&mut self, pointer: egui::Pos2) -> CropRegion {
        let Some(session) = self.session else {
            return self.region;
        };

        let dx = pointer.x - session.origin_pointer.x;
        let dy = pointer.y - session.origin_pointer.y;
        let origin = session.origin_region;
        let mut region = origin;

        match session.handle {
            Handle::Move => {
                region.x = (origin.x + dx).clamp(0.0, self.dims.display_width - origin.width);
                region.y = (origin.y + dy).clamp(0.0, self.dims.display_height - origin.height);
            }
            Handle::TopLeft => {
                region.x = (origin.x + dx).max(0.0);
                region.y = (origin.y + dy).max(0.0);
                region.width = (origin.width - dx).max(MIN_REGION_SIZE);
                region.height = (origin.height - dy).max(MIN_REGION_SIZE);
            }
            Handle::TopRight => {
                region.y = (origin.y + dy).max(0.0);
                region.width = (origin.width + dx).max(MIN_REGION_SIZE);
                region.height = (origin.height - dy).max(MIN_REGION_SIZE);
            }
            Handle::BottomLeft => {
                region.x = (origin.x + dx).max(0.0);
                region.width = (origin.width - dx).max(MIN_REGION_SIZE);
                region.height = (origin.height + dy).max(MIN_REGION_SIZE);
            }
            Handle::BottomRight => {
                region.width = (origin.width + dx).max(MIN_REGION_SIZE);
                region.height = (origin.height + dy).max(MIN_REGION_SIZE);
            }
        }

        // Boundary clamp runs last and wins over handle growth.
        region.width = region.width.min(self.dims.display_width - region.x);
        region.height = region.height.min(self.dims.display_height - region.y);

        self.region = region;
        region
    }

    /// Closes the drag session. The region keeps the value from the last
    /// [`update_drag`](Self::update_drag).
    pub fn end_drag(&mut self) {
        self.session = None;
    }

    /// Maps the current region to source pixel space with nearest-integer
    /// rounding.
    ///
    /// The result is not re-validated against the natural bounds: with
    /// aggressive edge-resizing, rounding can place the far edge one pixel
    /// past the frame. Callers that crop pixels must clamp.
    pub fn to_source_rect(&self) -> SourceRect {
        let scale_x = self.dims.natural_width / self.dims.display_width;
        let scale_y = self.dims.natural_height / self.dims.display_height;
        SourceRect {
            x: (self.region.x * scale_x).round() as u32,
            y: (self.region.y * scale_y).round() as u32,
            width: (self.region.width * scale_x).round() as u32,
            height: (self.region.height * scale_y).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    fn dims(nw: f32, nh: f32, dw: f32, dh: f32) -> ImageDimensions {
        ImageDimensions {
            natural_width: nw,
            natural_height: nh,
            display_width: dw,
            display_height: dh,
        }
    }

    fn assert_invariants(region: &CropRegion, dims: &ImageDimensions) {
        assert!(region.x >= 0.0, "x negative: {region:?}");
        assert!(region.y >= 0.0, "y negative: {region:?}");
        assert!(
            region.x + region.width <= dims.display_width + 1e-3,
            "overflows right edge: {region:?}"
        );
        assert!(
            region.y + region.height <= dims.display_height + 1e-3,
            "overflows bottom edge: {region:?}"
        );
        assert!(region.width >= MIN_REGION_SIZE, "width too small: {region:?}");
        assert!(region.height >= MIN_REGION_SIZE, "height too small: {region:?}");
    }

    #[test]
    fn default_region_uses_proportional_placement() {
        let selector = RegionSelector::new(dims(300.0, 600.0, 300.0, 600.0));
        let region = selector.region();
        assert_eq!(region.x, 30.0);
        assert_eq!(region.y, 120.0);
        assert_eq!(region.width, 240.0);
        assert_eq!(region.height, 240.0);
    }

    #[test]
    fn aspect_fit_preserves_ratio_within_viewport() {
        let d = ImageDimensions::aspect_fit(1920.0, 1080.0, vec2(400.0, 400.0));
        assert!(d.display_width <= 400.0 && d.display_height <= 400.0);
        let natural_ratio = 1920.0 / 1080.0;
        let display_ratio = d.display_width / d.display_height;
        assert!((natural_ratio - display_ratio).abs() < 1e-3);
        // Width-limited for a landscape image in a square viewport.
        assert!((d.display_width - 400.0).abs() < 1e-3);
    }

    #[test]
    fn bottom_right_drag_grows_width_and_shrinks_height() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 100.0,
        };
        assert!(selector.begin_drag(Handle::BottomRight, pos2(110.0, 110.0)));
        let region = selector.update_drag(pos2(130.0, 100.0));
        assert_eq!(region.x, 10.0);
        assert_eq!(region.y, 10.0);
        assert_eq!(region.width, 120.0);
        assert_eq!(region.height, 90.0);
    }

    #[test]
    fn corner_resize_floors_at_minimum_size() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 100.0,
            y: 100.0,
            width: 100.0,
            height: 100.0,
        };
        selector.begin_drag(Handle::BottomRight, pos2(200.0, 200.0));
        // Drag far up-left: both edges would go negative without the floor.
        let region = selector.update_drag(pos2(40.0, 40.0));
        assert_eq!(region.width, MIN_REGION_SIZE);
        assert_eq!(region.height, MIN_REGION_SIZE);
        assert_invariants(&region, selector.dimensions());
    }

    #[test]
    fn move_clamps_to_display_bounds() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 100.0,
        };
        selector.begin_drag(Handle::Move, pos2(50.0, 50.0));
        let region = selector.update_drag(pos2(1000.0, -1000.0));
        assert_eq!(region.x, 300.0);
        assert_eq!(region.y, 0.0);
        assert_eq!(region.width, 100.0);
        assert_eq!(region.height, 100.0);
    }

    #[test]
    fn boundary_clamp_wins_over_handle_growth() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 300.0,
            y: 300.0,
            width: 80.0,
            height: 80.0,
        };
        selector.begin_drag(Handle::BottomRight, pos2(380.0, 380.0));
        let region = selector.update_drag(pos2(600.0, 600.0));
        assert_eq!(region.width, 100.0);
        assert_eq!(region.height, 100.0);
        assert_invariants(&region, selector.dimensions());
    }

    #[test]
    fn top_left_drag_moves_origin_and_resizes_inversely() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
        };
        selector.begin_drag(Handle::TopLeft, pos2(100.0, 100.0));
        let region = selector.update_drag(pos2(120.0, 80.0));
        assert_eq!(region.x, 120.0);
        assert_eq!(region.y, 80.0);
        assert_eq!(region.width, 180.0);
        assert_eq!(region.height, 220.0);
    }

    #[test]
    fn invariants_hold_across_a_drag_sequence() {
        let d = dims(1200.0, 800.0, 600.0, 400.0);
        let mut selector = RegionSelector::new(d);
        let gestures = [
            (Handle::Move, pos2(-50.0, 450.0)),
            (Handle::TopLeft, pos2(520.0, 300.0)),
            (Handle::BottomRight, pos2(900.0, 900.0)),
            (Handle::TopRight, pos2(10.0, 340.0)),
            (Handle::BottomLeft, pos2(530.0, 5.0)),
        ];
        for (handle, end) in gestures {
            // Grab each gesture at the handle itself, as a real pointer does.
            let start = selector.region().handle_pos(handle);
            assert!(selector.begin_drag(handle, start));
            // Walk the pointer in steps, checking after every update.
            for step in 1..=4 {
                let t = step as f32 / 4.0;
                let p = pos2(start.x + (end.x - start.x) * t, start.y + (end.y - start.y) * t);
                let region = selector.update_drag(p);
                assert_invariants(&region, &d);
            }
            selector.end_drag();
        }
    }

    #[test]
    fn second_drag_session_is_rejected() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        assert!(selector.begin_drag(Handle::Move, pos2(100.0, 100.0)));
        assert!(!selector.begin_drag(Handle::TopLeft, pos2(40.0, 80.0)));
        assert!(selector.is_dragging());

        // The open session keeps its original handle and origin.
        let before = selector.region();
        let after = selector.update_drag(pos2(100.0, 100.0));
        assert_eq!(before, after);
    }

    #[test]
    fn update_without_session_returns_region_unchanged() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        let before = selector.region();
        assert_eq!(selector.update_drag(pos2(9999.0, 9999.0)), before);
    }

    #[test]
    fn full_display_region_maps_to_natural_dimensions() {
        let d = dims(1919.0, 1079.0, 640.0, 360.0);
        let mut selector = RegionSelector::new(d);
        selector.region = CropRegion {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 360.0,
        };
        let rect = selector.to_source_rect();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
        assert!((rect.width as i64 - 1919).abs() <= 1);
        assert!((rect.height as i64 - 1079).abs() <= 1);
    }

    #[test]
    fn source_rect_scales_and_rounds() {
        // 2x scale on both axes.
        let d = dims(800.0, 600.0, 400.0, 300.0);
        let mut selector = RegionSelector::new(d);
        selector.region = CropRegion {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        };
        let rect = selector.to_source_rect();
        assert_eq!(
            rect,
            SourceRect {
                x: 20,
                y: 40,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn hit_test_prefers_corner_handles_over_move() {
        let mut selector = RegionSelector::new(dims(400.0, 400.0, 400.0, 400.0));
        selector.region = CropRegion {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
        };
        assert_eq!(selector.hit_test(pos2(102.0, 103.0), 12.0), Some(Handle::TopLeft));
        assert_eq!(selector.hit_test(pos2(298.0, 299.0), 12.0), Some(Handle::BottomRight));
        assert_eq!(selector.hit_test(pos2(200.0, 200.0), 12.0), Some(Handle::Move));
        assert_eq!(selector.hit_test(pos2(10.0, 10.0), 12.0), None);
    }
}
