use crate::segment::model::{BrushShape, Pos, StrokePixel, Tool, ADJACENT_4, ADJACENT_8};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Brushes are clamped to this size. The room never accepts anything close.
pub const MAX_BRUSH_SIZE: u32 = 1 << 10;

/// Tolerance, in pixels, applied around the swept rectangle. Large enough that
/// the floored midpoint of a one-pixel stroke always lands inside.
const SWEEP_SLACK: f64 = 0.75;

type Stencil = Arc<[(i32, i32)]>;

static STENCILS: Lazy<Mutex<HashMap<(BrushShape, u32), Stencil>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Radius of the circular brush. Zero-sized brushes still cover one pixel.
pub fn brush_radius(size: u32) -> i32 {
    (size.min(MAX_BRUSH_SIZE).div_ceil(2) as i32).max(1)
}

fn half_width(shape: BrushShape, size: u32) -> i32 {
    match shape {
        BrushShape::Circle => brush_radius(size) - 1,
        BrushShape::Square => (size.clamp(1, MAX_BRUSH_SIZE) as i32 - 1) / 2,
    }
}

/// Offsets covered by one brush stamp, cached per shape and size.
pub fn stencil(shape: BrushShape, size: u32) -> Stencil {
    let size = size.min(MAX_BRUSH_SIZE);
    if let Ok(mut cache) = STENCILS.lock() {
        return Arc::clone(
            cache
                .entry((shape, size))
                .or_insert_with(|| build_stencil(shape, size)),
        );
    }
    build_stencil(shape, size)
}

fn build_stencil(shape: BrushShape, size: u32) -> Stencil {
    match shape {
        BrushShape::Circle => {
            let r = brush_radius(size);
            let mut offsets = Vec::new();
            for y in -r..r {
                for x in -r..r {
                    if x * x + y * y < r * r {
                        offsets.push((x, y));
                    }
                }
            }
            offsets.into()
        }
        BrushShape::Square => {
            let side = size.clamp(1, MAX_BRUSH_SIZE) as i32;
            let lo = -(side / 2);
            let mut offsets = Vec::with_capacity((side * side) as usize);
            for y in lo..lo + side {
                for x in lo..lo + side {
                    offsets.push((x, y));
                }
            }
            offsets.into()
        }
    }
}

/// Pixels touched by a stroke from `from` to `to`, row-major, clipped to the
/// `width` x `height` canvas. Covers a stamp at both ends plus the rectangle
/// swept between them.
pub fn rasterize(
    tool: Tool,
    from: Pos,
    to: Pos,
    size: u32,
    width: u32,
    height: u32,
) -> Vec<StrokePixel> {
    let canvas = Canvas { width, height };
    let mut pixels = BTreeSet::new();

    let stamp = stencil(tool.shape, size);
    for center in [from, to] {
        for &(dx, dy) in stamp.iter() {
            let pos = center.offset(dx, dy);
            if canvas.contains(pos) {
                pixels.insert(pos);
            }
        }
    }

    if from != to {
        sweep(&mut pixels, from, to, half_width(tool.shape, size), canvas);
    }

    pixels
        .iter()
        .map(|&pos| StrokePixel {
            pos,
            boundary: canvas.on_edge(pos)
                || ADJACENT_4
                    .iter()
                    .any(|&(dx, dy)| !pixels.contains(&pos.offset(dx, dy))),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Canvas {
    width: u32,
    height: u32,
}

impl Canvas {
    fn contains(self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn on_edge(self, pos: Pos) -> bool {
        pos.x == 0
            || pos.y == 0
            || pos.x as u32 == self.width.saturating_sub(1)
            || pos.y as u32 == self.height.saturating_sub(1)
    }
}

/// Rasterizes the outline of the rectangle around `from -> to`, then fills
/// its inside with a BFS seeded at the midpoint.
fn sweep(pixels: &mut BTreeSet<Pos>, from: Pos, to: Pos, half_width: i32, canvas: Canvas) {
    let (fx, fy) = (from.x as f64, from.y as f64);
    let (dx, dy) = (span(from.x, to.x), span(from.y, to.y));
    let length = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = (dx / length, dy / length);
    let (nx, ny) = (-uy, ux);
    let hw = half_width as f64;

    let corner = |p: Pos, side: f64| {
        Pos::new(
            (p.x as f64 + nx * hw * side).round() as i32,
            (p.y as f64 + ny * hw * side).round() as i32,
        )
    };
    let corners = [
        corner(from, 1.0),
        corner(to, 1.0),
        corner(to, -1.0),
        corner(from, -1.0),
    ];
    for i in 0..corners.len() {
        dda(corners[i], corners[(i + 1) % corners.len()], canvas, |pos| {
            if canvas.contains(pos) {
                pixels.insert(pos);
            }
        });
    }

    let inside = |pos: Pos| {
        let (px, py) = (pos.x as f64 - fx, pos.y as f64 - fy);
        let along = px * ux + py * uy;
        let across = px * nx + py * ny;
        along >= -SWEEP_SLACK && along <= length + SWEEP_SLACK && across.abs() <= hw + SWEEP_SLACK
    };

    let midpoint = Pos::new(
        (from.x as i64 + to.x as i64).div_euclid(2) as i32,
        (from.y as i64 + to.y as i64).div_euclid(2) as i32,
    );
    let seed = if canvas.contains(midpoint) && inside(midpoint) {
        Some(midpoint)
    } else {
        // Midpoint is off-canvas; start from the first centreline pixel that is not.
        let mut found = None;
        dda(from, to, canvas, |pos| {
            if found.is_none() && canvas.contains(pos) && inside(pos) {
                found = Some(pos);
            }
        });
        found
    };
    let Some(seed) = seed else {
        return;
    };

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(seed);
    queue.push_back(seed);
    while let Some(pos) = queue.pop_front() {
        pixels.insert(pos);
        for (ox, oy) in ADJACENT_8 {
            let next = pos.offset(ox, oy);
            if canvas.contains(next) && inside(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
}

/// DDA line walk from `a` to `b`, restricted to the stretch that can touch
/// the canvas so far-away endpoints cost nothing.
fn dda(a: Pos, b: Pos, canvas: Canvas, mut visit: impl FnMut(Pos)) {
    let (dx, dy) = (span(a.x, b.x), span(a.y, b.y));
    let steps = dx.abs().max(dy.abs());
    if steps == 0.0 {
        visit(a);
        return;
    }
    let Some((t0, t1)) = clip_param(a, dx, dy, canvas) else {
        return;
    };
    let first = (t0 * steps).floor() as i64;
    let last = (t1 * steps).ceil() as i64;
    for i in first..=last {
        let t = i as f64 / steps;
        visit(Pos::new(
            (a.x as f64 + dx * t).round() as i32,
            (a.y as f64 + dy * t).round() as i32,
        ));
    }
}

/// `to - from` without overflowing `i32`.
fn span(from: i32, to: i32) -> f64 {
    (to as i64 - from as i64) as f64
}

/// Liang-Barsky clip of `a + t * (dx, dy)` against the canvas grown by one
/// pixel. Returns the visible parameter range within `[0, 1]`.
fn clip_param(a: Pos, dx: f64, dy: f64, canvas: Canvas) -> Option<(f64, f64)> {
    let (x0, y0) = (a.x as f64, a.y as f64);
    let (w, h) = (canvas.width as f64, canvas.height as f64);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, x0 + 1.0), (dx, w - x0), (-dy, y0 + 1.0), (dy, h - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((t0, t1))
}
