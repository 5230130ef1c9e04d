use pdf_render_core::dcel::{path_contains_point, rasterize_path_mask, FillRule};
use pdf_render_core::{PathBuilder, PathOptions, Vec2};

fn rect(path: &mut PathBuilder, x0: f64, y0: f64, x1: f64, y1: f64, ccw: bool) {
    path.move_to(Vec2::new(x0, y0));
    if ccw {
        path.line_to(Vec2::new(x1, y0));
        path.line_to(Vec2::new(x1, y1));
        path.line_to(Vec2::new(x0, y1));
    } else {
        path.line_to(Vec2::new(x0, y1));
        path.line_to(Vec2::new(x1, y1));
        path.line_to(Vec2::new(x1, y0));
    }
    path.close_contour();
}

/// Independent winding-number reference: sum the signed angles subtended
/// by each segment around the sample point.
fn angle_sum_winding(contours: &[Vec<Vec2>], x: f64, y: f64) -> i32 {
    let mut total = 0.0f64;
    for points in contours {
        let n = points.len();
        for idx in 0..n {
            let a = points[idx];
            let b = points[(idx + 1) % n];
            let va = Vec2::new(a.x - x, a.y - y);
            let vb = Vec2::new(b.x - x, b.y - y);
            total += va.cross(vb).atan2(va.dot(vb));
        }
    }
    (total / (2.0 * std::f64::consts::PI)).round() as i32
}

#[test]
fn nested_ccw_rectangles_follow_fill_rules() {
    let mut path = PathBuilder::new(PathOptions::default());
    rect(&mut path, 1.0, 1.0, 9.0, 9.0, true);
    rect(&mut path, 3.0, 3.0, 7.0, 7.0, true);

    assert!(path_contains_point(&path, FillRule::Nonzero, 5.0, 5.0));
    assert!(!path_contains_point(&path, FillRule::EvenOdd, 5.0, 5.0));
}

#[test]
fn opposed_winding_rectangles_are_hollow_under_both_rules() {
    let mut path = PathBuilder::new(PathOptions::default());
    rect(&mut path, 1.0, 1.0, 9.0, 9.0, true);
    rect(&mut path, 3.0, 3.0, 7.0, 7.0, false);

    assert!(!path_contains_point(&path, FillRule::Nonzero, 5.0, 5.0));
    assert!(!path_contains_point(&path, FillRule::EvenOdd, 5.0, 5.0));
}

#[test]
fn point_test_agrees_with_angle_sum_reference() {
    // A concave, self-intersection-free polygon.
    let points = vec![
        Vec2::new(1.0, 1.0),
        Vec2::new(9.0, 1.0),
        Vec2::new(9.0, 9.0),
        Vec2::new(5.0, 4.0),
        Vec2::new(1.0, 9.0),
    ];
    let mut path = PathBuilder::new(PathOptions::default());
    path.move_to(points[0]);
    for p in &points[1..] {
        path.line_to(*p);
    }
    path.close_contour();
    let contours = vec![points];

    for py in 0..20 {
        for px in 0..20 {
            let x = px as f64 * 0.5 + 0.13;
            let y = py as f64 * 0.5 + 0.17;
            let reference = angle_sum_winding(&contours, x, y) != 0;
            assert_eq!(
                path_contains_point(&path, FillRule::Nonzero, x, y),
                reference,
                "nonzero disagrees at ({}, {})",
                x,
                y
            );
            // A simple polygon has identical results under both rules.
            assert_eq!(
                path_contains_point(&path, FillRule::EvenOdd, x, y),
                reference,
                "even-odd disagrees at ({}, {})",
                x,
                y
            );
        }
    }
}

#[test]
fn mask_equals_center_containment_for_self_intersecting_path() {
    // A five-point star drawn with crossing edges: the classic case
    // where the two fill rules differ.
    let mut path = PathBuilder::new(PathOptions::default());
    let center = Vec2::new(8.0, 8.0);
    let radius = 7.0;
    let mut star = Vec::new();
    for k in 0..5 {
        let angle = -std::f64::consts::FRAC_PI_2 + k as f64 * 4.0 * std::f64::consts::PI / 5.0;
        star.push(Vec2::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        ));
    }
    path.move_to(star[0]);
    for p in &star[1..] {
        path.line_to(*p);
    }
    path.close_contour();

    for fill_rule in [FillRule::Nonzero, FillRule::EvenOdd] {
        let (mask, bounds) = rasterize_path_mask(&path, fill_rule, 16, 16, 1.0);
        assert!(!bounds.is_empty);

        for py in 0..16u32 {
            for px in 0..16u32 {
                let inside = path_contains_point(
                    &path,
                    fill_rule,
                    px as f64 + 0.5,
                    py as f64 + 0.5,
                );
                assert_eq!(
                    mask[py as usize * 16 + px as usize] != 0,
                    inside,
                    "pixel ({}, {}) under {:?}",
                    px,
                    py,
                    fill_rule
                );
            }
        }
    }

    // The star's center is inside under nonzero but outside under
    // even-odd.
    assert!(path_contains_point(&path, FillRule::Nonzero, 8.0, 8.0));
    assert!(!path_contains_point(&path, FillRule::EvenOdd, 8.0, 8.0));
}

#[test]
fn mask_bounds_are_tight() {
    let mut path = PathBuilder::new(PathOptions::default());
    rect(&mut path, 4.0, 6.0, 10.0, 11.0, true);

    let (mask, bounds) = rasterize_path_mask(&path, FillRule::Nonzero, 16, 16, 1.0);
    assert!(!bounds.is_empty);

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for py in 0..16u32 {
        for px in 0..16u32 {
            if mask[py as usize * 16 + px as usize] != 0 {
                min_x = min_x.min(px);
                min_y = min_y.min(py);
                max_x = max_x.max(px);
                max_y = max_y.max(py);
            }
        }
    }
    assert_eq!((bounds.min_x, bounds.min_y), (min_x, min_y));
    assert_eq!((bounds.max_x, bounds.max_y), (max_x, max_y));
}

#[test]
fn scaled_rasterization_addresses_device_pixels() {
    let mut path = PathBuilder::new(PathOptions::default());
    rect(&mut path, 1.0, 1.0, 3.0, 3.0, true);

    // At 4x scale the 2x2 user-space square covers 8x8 device pixels.
    let (mask, bounds) = rasterize_path_mask(&path, FillRule::Nonzero, 16, 16, 4.0);
    assert!(!bounds.is_empty);
    let covered = mask.iter().filter(|&&v| v != 0).count();
    assert_eq!(covered, 64);
    assert_eq!((bounds.min_x, bounds.min_y), (4, 4));
    assert_eq!((bounds.max_x, bounds.max_y), (11, 11));
}

#[test]
fn empty_paths_produce_empty_masks() {
    let path = PathBuilder::new(PathOptions::default());
    let (mask, bounds) = rasterize_path_mask(&path, FillRule::Nonzero, 8, 8, 1.0);
    assert!(bounds.is_empty);
    assert!(mask.iter().all(|&v| v == 0));
}
