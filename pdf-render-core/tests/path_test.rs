use pdf_render_core::{PathBuilder, PathOptions, Segment, Vec2};

fn quad_point(start: Vec2, control: Vec2, end: Vec2, t: f64) -> Vec2 {
    let u = 1.0 - t;
    Vec2::new(
        u * u * start.x + 2.0 * u * t * control.x + t * t * end.x,
        u * u * start.y + 2.0 * u * t * control.y + t * t * end.y,
    )
}

fn cubic_point(start: Vec2, ca: Vec2, cb: Vec2, end: Vec2, t: f64) -> Vec2 {
    let u = 1.0 - t;
    Vec2::new(
        u * u * u * start.x
            + 3.0 * u * u * t * ca.x
            + 3.0 * u * t * t * cb.x
            + t * t * t * end.x,
        u * u * u * start.y
            + 3.0 * u * u * t * ca.y
            + 3.0 * u * t * t * cb.y
            + t * t * t * end.y,
    )
}

fn min_dist_sq_to_polyline(p: Vec2, points: &[Vec2]) -> f64 {
    let mut best = f64::INFINITY;
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let ab = b.sub(a);
        let len_sq = ab.len_sq();
        let t = if len_sq <= 1e-18 {
            0.0
        } else {
            (p.sub(a).dot(ab) / len_sq).clamp(0.0, 1.0)
        };
        best = best.min(p.sub(a.lerp(b, t)).len_sq());
    }
    best
}

fn polyline_of(path: &PathBuilder) -> Vec<Vec2> {
    let contours = path.flattened_contours();
    assert_eq!(contours.len(), 1);
    contours.into_iter().next().unwrap()
}

#[test]
fn flattened_quad_stays_within_tolerance() {
    let tolerance = 0.005;
    let mut options = PathOptions::flattened();
    options.quad_flatness = tolerance;
    options.quad_max_depth = 24;

    let start = Vec2::new(0.0, 0.0);
    let control = Vec2::new(0.5, 1.0);
    let end = Vec2::new(1.0, 0.0);

    let mut path = PathBuilder::new(options);
    path.move_to(start);
    path.quad_bezier_to(control, end);
    let polyline = polyline_of(&path);
    assert!(polyline.len() > 2);

    let limit = (tolerance + 1e-6) * (tolerance + 1e-6);
    for sample_idx in 0..=10000 {
        let t = sample_idx as f64 / 10000.0;
        let sample = quad_point(start, control, end, t);
        let dist_sq = min_dist_sq_to_polyline(sample, &polyline);
        assert!(
            dist_sq <= limit,
            "t = {}: distance^2 {} exceeds {}",
            t,
            dist_sq,
            limit
        );
    }
}

#[test]
fn flattened_cubic_stays_within_tolerance() {
    let tolerance = 0.01;
    let mut options = PathOptions::flattened();
    options.cubic_flatness = tolerance;
    options.cubic_max_depth = 24;

    let start = Vec2::new(0.0, 0.0);
    let ca = Vec2::new(0.2, 2.0);
    let cb = Vec2::new(0.8, -2.0);
    let end = Vec2::new(1.0, 0.0);

    let mut path = PathBuilder::new(options);
    path.move_to(start);
    path.cubic_bezier_to(ca, cb, end);
    let polyline = polyline_of(&path);

    let limit = (tolerance + 1e-6) * (tolerance + 1e-6);
    for sample_idx in 0..=10000 {
        let t = sample_idx as f64 / 10000.0;
        let sample = cubic_point(start, ca, cb, end, t);
        assert!(min_dist_sq_to_polyline(sample, &polyline) <= limit);
    }
}

#[test]
fn endpoints_are_exact() {
    let mut path = PathBuilder::new(PathOptions::flattened());
    path.move_to(Vec2::new(3.0, 4.0));
    path.quad_bezier_to(Vec2::new(10.0, 20.0), Vec2::new(5.0, 6.0));
    let polyline = polyline_of(&path);
    assert_eq!(polyline[0], Vec2::new(3.0, 4.0));
    assert_eq!(*polyline.last().unwrap(), Vec2::new(5.0, 6.0));
}

#[test]
fn depth_cap_bounds_segment_count() {
    let mut options = PathOptions::flattened();
    options.quad_flatness = 1e-12;
    options.quad_max_depth = 4;

    let mut path = PathBuilder::new(options);
    path.move_to(Vec2::new(0.0, 0.0));
    path.quad_bezier_to(Vec2::new(0.5, 1000.0), Vec2::new(1.0, 0.0));
    // At most 2^4 chords.
    assert!(path.contours()[0].segments.len() - 1 <= 16);
    for segment in &path.contours()[0].segments[1..] {
        assert!(matches!(segment, Segment::Line(_)));
    }
}
