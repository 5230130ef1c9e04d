//! Doubly-connected edge list: planar overlay, face assignment, monotone
//! partitioning, and scanline rasterization of flattened paths.
//!
//! Vertices, half-edges and faces live in parallel arrays and refer to
//! each other by index. The twin/next/prev cycle invariants
//! (`e.twin.twin == e`, `e.next.prev == e`, `e.twin.origin ==
//! e.next.origin`) are established by `add_edge`, `intersect_edges` and
//! `connect_vertices` and hold everywhere else.

use log::{debug, trace};

use crate::geom::Vec2;
use crate::path::{PathBuilder, Segment};

pub type VertexId = usize;
pub type EdgeId = usize;
pub type FaceId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    Nonzero,
    EvenOdd,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub incident_edge: Option<EdgeId>,
    pub merge: bool,
    pub split: bool,
}

#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub origin: VertexId,
    pub twin: EdgeId,
    pub next: EdgeId,
    pub prev: EdgeId,
    pub face: Option<FaceId>,
    pub rendered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Face {
    pub anchor_edge: Option<EdgeId>,
}

/// Pixel bounds of the most recent rasterization, for tight downstream
/// clipping.
#[derive(Debug, Clone, Copy)]
pub struct MaskBounds {
    pub is_empty: bool,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl MaskBounds {
    fn empty() -> Self {
        MaskBounds {
            is_empty: true,
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
        }
    }

    fn mark(&mut self, x: u32, y: u32) {
        if self.is_empty {
            *self = MaskBounds {
                is_empty: false,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

pub struct Dcel {
    pub vertices: Vec<Vertex>,
    pub half_edges: Vec<HalfEdge>,
    pub faces: Vec<Face>,
    /// Vertex ids ordered by (y, x); vertices added mid-sweep insert into
    /// position.
    events: Vec<VertexId>,
    pub outer_face: FaceId,
}

#[derive(Clone, Copy)]
struct ActiveEdge {
    edge: EdgeId,
    helper: Option<VertexId>,
}

impl Default for Dcel {
    fn default() -> Self {
        Self::new()
    }
}

impl Dcel {
    pub fn new() -> Self {
        Dcel {
            vertices: Vec::new(),
            half_edges: Vec::new(),
            faces: vec![Face::default()],
            events: Vec::new(),
            outer_face: 0,
        }
    }

    fn vertex_pos(&self, v: VertexId) -> Vec2 {
        Vec2::new(self.vertices[v].x, self.vertices[v].y)
    }

    fn edge_target(&self, e: EdgeId) -> VertexId {
        self.half_edges[self.half_edges[e].twin].origin
    }

    pub fn add_vertex(&mut self, x: f64, y: f64) -> VertexId {
        let id = self.vertices.len();
        self.vertices.push(Vertex {
            x,
            y,
            incident_edge: None,
            merge: false,
            split: false,
        });

        let pos = self
            .events
            .partition_point(|&other| {
                let o = &self.vertices[other];
                if o.y == y {
                    o.x < x
                } else {
                    o.y < y
                }
            });
        self.events.insert(pos, id);
        id
    }

    /// Create a twin pair between `a` and `b`. The pair starts as its own
    /// two-edge cycle, which already satisfies the DCEL invariants.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> EdgeId {
        let ea = self.half_edges.len();
        let eb = ea + 1;
        self.half_edges.push(HalfEdge {
            origin: a,
            twin: eb,
            next: eb,
            prev: eb,
            face: None,
            rendered: false,
        });
        self.half_edges.push(HalfEdge {
            origin: b,
            twin: ea,
            next: ea,
            prev: ea,
            face: None,
            rendered: false,
        });

        self.vertices[a].incident_edge = Some(ea);
        self.vertices[b].incident_edge = Some(eb);
        ea
    }

    /// The next outgoing edge around the origin of `e`.
    pub fn next_incident_edge(&self, e: EdgeId) -> EdgeId {
        self.half_edges[self.half_edges[e].twin].next
    }

    /// Split `e` (and its twin) at `vertex`, which must lie on the edge.
    /// Returns the new half-edge running from `vertex` to the old target.
    fn split_edge_at_point(&mut self, e: EdgeId, vertex: VertexId) -> EdgeId {
        let twin = self.half_edges[e].twin;
        let old_target = self.half_edges[twin].origin;

        let new_edge = self.add_edge(vertex, old_target);
        let new_twin = self.half_edges[new_edge].twin;
        self.half_edges[twin].origin = vertex;

        let e_next = self.half_edges[e].next;
        let twin_prev = self.half_edges[twin].prev;

        self.half_edges[new_edge].next = e_next;
        self.half_edges[e_next].prev = new_edge;
        self.half_edges[twin_prev].next = new_twin;
        self.half_edges[new_twin].prev = twin_prev;

        self.half_edges[e].next = new_edge;
        self.half_edges[new_edge].prev = e;
        self.half_edges[new_twin].next = twin;
        self.half_edges[twin].prev = new_twin;

        new_edge
    }

    fn outgoing_angle(&self, e: EdgeId, vertex: VertexId) -> f64 {
        let target = self.vertex_pos(self.edge_target(e));
        let v = self.vertex_pos(vertex);
        (target.y - v.y).atan2(target.x - v.x)
    }

    /// Wire the outgoing edges of a vertex into angular order: for each
    /// consecutive pair (A, B) by angle, `A.twin.next = B` and
    /// `B.prev = A.twin`.
    fn rewire_incident_angles(&mut self, edges: &mut Vec<(f64, EdgeId)>) {
        edges.sort_by(|a, b| a.0.total_cmp(&b.0));
        for idx_a in 0..edges.len() {
            let idx_b = (idx_a + 1) % edges.len();
            let a = edges[idx_a].1;
            let b = edges[idx_b].1;
            let a_twin = self.half_edges[a].twin;
            self.half_edges[a_twin].next = b;
            self.half_edges[b].prev = a_twin;
        }
    }

    /// Split both edges at their interior intersection point and restore
    /// the angular order of the four half-edges around the new vertex.
    pub fn intersect_edges(&mut self, a: EdgeId, b: EdgeId, x: f64, y: f64) -> VertexId {
        debug!("intersection at {:.1},{:.1}", x, y);

        let vertex = self.add_vertex(x, y);
        let a_prime = self.split_edge_at_point(a, vertex);
        let b_prime = self.split_edge_at_point(b, vertex);
        self.vertices[vertex].incident_edge = Some(a_prime);

        let a_twin = self.half_edges[a].twin;
        let b_twin = self.half_edges[b].twin;
        let mut incident: Vec<(f64, EdgeId)> = [a_prime, b_prime, a_twin, b_twin]
            .into_iter()
            .map(|e| (self.outgoing_angle(e, vertex), e))
            .collect();
        self.rewire_incident_angles(&mut incident);

        vertex
    }

    /// Add a diagonal between two vertices already in the structure,
    /// splicing it into the angular order at both endpoints and splitting
    /// the face it crosses into two.
    pub fn connect_vertices(&mut self, a: VertexId, b: VertexId) {
        let a_incident = self.vertices[a].incident_edge.expect("vertex has no edges");
        let b_incident = self.vertices[b].incident_edge.expect("vertex has no edges");

        let edge = self.add_edge(a, b);
        let edge_twin = self.half_edges[edge].twin;

        let mut incident: Vec<(f64, EdgeId)> = vec![(self.outgoing_angle(edge, a), edge)];
        let mut current = a_incident;
        loop {
            incident.push((self.outgoing_angle(current, a), current));
            current = self.next_incident_edge(current);
            if current == a_incident {
                break;
            }
        }
        self.rewire_incident_angles(&mut incident);

        incident.clear();
        incident.push((self.outgoing_angle(edge_twin, b), edge_twin));
        let mut current = b_incident;
        loop {
            incident.push((self.outgoing_angle(current, b), current));
            current = self.next_incident_edge(current);
            if current == b_incident {
                break;
            }
        }
        self.rewire_incident_angles(&mut incident);

        // The diagonal inherits the face it was drawn inside; the twin
        // cycle becomes a new face.
        self.half_edges[edge].face = self.half_edges[self.half_edges[edge].next].face;

        let new_face = self.faces.len();
        self.faces.push(Face {
            anchor_edge: Some(edge_twin),
        });
        let mut current = edge_twin;
        loop {
            self.half_edges[current].face = Some(new_face);
            current = self.half_edges[current].next;
            if current == edge_twin {
                break;
            }
        }
    }

    // ── Sweep support ─────────────────────────────────────────────────────────

    /// x-coordinate where `e` crosses the sweep line.
    fn edge_intersect_x(&self, e: EdgeId, sweep_y: f64) -> f64 {
        let a = self.vertex_pos(self.half_edges[e].origin);
        let b = self.vertex_pos(self.edge_target(e));

        let dy = b.y - a.y;
        if dy.abs() < 1e-12 {
            return a.x.min(b.x);
        }
        let t = (sweep_y - a.y) / dy;
        a.x + t * (b.x - a.x)
    }

    /// Order active edges by x at the sweep line, breaking ties by
    /// evaluating slightly below it.
    fn active_edge_less(&self, lhs: EdgeId, rhs: EdgeId, sweep_y: f64) -> bool {
        let ax = self.edge_intersect_x(lhs, sweep_y);
        let bx = self.edge_intersect_x(rhs, sweep_y);
        if (ax - bx).abs() > 1e-5 {
            return ax < bx;
        }
        let ax = self.edge_intersect_x(lhs, sweep_y + 1e-5);
        let bx = self.edge_intersect_x(rhs, sweep_y + 1e-5);
        ax < bx
    }

    fn insert_active_sorted(
        &self,
        active: &mut Vec<ActiveEdge>,
        entry: ActiveEdge,
        sweep_y: f64,
    ) -> usize {
        let pos = active
            .iter()
            .position(|other| self.active_edge_less(entry.edge, other.edge, sweep_y))
            .unwrap_or(active.len());
        active.insert(pos, entry);
        pos
    }

    fn edges_share_vertex(&self, a: EdgeId, b: EdgeId) -> bool {
        let eps = 1e-9;
        let a_from = self.vertex_pos(self.half_edges[a].origin);
        let a_to = self.vertex_pos(self.edge_target(a));
        let b_from = self.vertex_pos(self.half_edges[b].origin);
        let b_to = self.vertex_pos(self.edge_target(b));

        a_from.approx_eq(b_from, eps)
            || a_from.approx_eq(b_to, eps)
            || a_to.approx_eq(b_from, eps)
            || a_to.approx_eq(b_to, eps)
    }

    /// Segment intersection restricted to proper interior crossings.
    /// Endpoint touches are already vertices; splitting them again would
    /// explode edge counts on shared or touching contours.
    fn compute_intersection_point(&self, a: EdgeId, b: EdgeId) -> Option<(f64, f64)> {
        let a1 = self.vertex_pos(self.half_edges[a].origin);
        let a2 = self.vertex_pos(self.edge_target(a));
        let b1 = self.vertex_pos(self.half_edges[b].origin);
        let b2 = self.vertex_pos(self.edge_target(b));

        let denom = (b2.y - b1.y) * (a2.x - a1.x) - (b2.x - b1.x) * (a2.y - a1.y);
        if denom.abs() < 1e-9 {
            return None;
        }

        let ua = ((b2.x - b1.x) * (a1.y - b1.y) - (b2.y - b1.y) * (a1.x - b1.x)) / denom;
        let ub = ((a2.x - a1.x) * (a1.y - b1.y) - (a2.y - a1.y) * (a1.x - b1.x)) / denom;

        let eps = 1e-9;
        if ua <= eps || ua >= 1.0 - eps || ub <= eps || ub >= 1.0 - eps {
            return None;
        }

        Some((a1.x + ua * (a2.x - a1.x), a1.y + ua * (a2.y - a1.y)))
    }

    fn outgoing_edges(&self, vertex: VertexId) -> Vec<EdgeId> {
        let Some(first) = self.vertices[vertex].incident_edge else {
            return Vec::new();
        };
        let mut edges = vec![first];
        let mut current = self.next_incident_edge(first);
        while current != first {
            edges.push(current);
            current = self.next_incident_edge(current);
        }
        edges
    }

    // ── Overlay ───────────────────────────────────────────────────────────────

    /// Sweep all vertices in (y, x) order, maintaining the active edge set
    /// and splitting any pair of neighbors that properly cross. New
    /// intersection vertices enter the event queue mid-sweep.
    pub fn overlay(&mut self) {
        let mut active: Vec<ActiveEdge> = Vec::new();

        let mut event_idx = 0;
        while event_idx < self.events.len() {
            let event_vertex = self.events[event_idx];
            let sweep_y = self.vertices[event_vertex].y;

            for incident in self.outgoing_edges(event_vertex) {
                let twin = self.half_edges[incident].twin;
                if let Some(pos) = active.iter().position(|a| a.edge == twin) {
                    // Removal exposes the two edges flanking the removed
                    // entry to each other.
                    let prev = if pos > 0 { Some(active[pos - 1].edge) } else { None };
                    let next = if pos + 1 < active.len() {
                        Some(active[pos + 1].edge)
                    } else {
                        None
                    };
                    if let (Some(prev), Some(next)) = (prev, next) {
                        if !self.edges_share_vertex(prev, next) {
                            if let Some((x, y)) = self.compute_intersection_point(prev, next) {
                                self.intersect_edges(prev, next, x, y);
                            }
                        }
                    }
                    trace!("removing active edge {}", twin);
                    active.remove(pos);
                } else {
                    let pos = self.insert_active_sorted(
                        &mut active,
                        ActiveEdge {
                            edge: incident,
                            helper: None,
                        },
                        sweep_y,
                    );
                    trace!("inserting active edge {}", incident);

                    if pos > 0 {
                        let prev = active[pos - 1].edge;
                        if !self.edges_share_vertex(incident, prev) {
                            if let Some((x, y)) = self.compute_intersection_point(prev, incident) {
                                self.intersect_edges(incident, prev, x, y);
                            }
                        }
                    }
                    if pos + 1 < active.len() {
                        let next = active[pos + 1].edge;
                        if !self.edges_share_vertex(incident, next) {
                            if let Some((x, y)) = self.compute_intersection_point(next, incident) {
                                self.intersect_edges(incident, next, x, y);
                            }
                        }
                    }
                }
            }

            event_idx += 1;
        }
    }

    // ── Face assignment ───────────────────────────────────────────────────────

    fn cycle_edges(&self, start: EdgeId) -> Vec<EdgeId> {
        let mut edges = vec![start];
        let mut current = self.half_edges[start].next;
        while current != start {
            edges.push(current);
            current = self.half_edges[current].next;
        }
        edges
    }

    /// Shoelace area of the cycle through `start`; the sign gives the
    /// cycle orientation.
    pub fn signed_cycle_area(&self, start: EdgeId) -> f64 {
        let mut area = 0.0;
        let mut prev = self.vertex_pos(self.half_edges[self.half_edges[start].prev].origin);
        for e in self.cycle_edges(start) {
            let p = self.vertex_pos(self.half_edges[e].origin);
            area += prev.x * p.y - prev.y * p.x;
            prev = p;
        }
        area / 2.0
    }

    /// Second sweep: the left half-edge of the leftmost active edge faces
    /// the outer face; every other left half-edge inherits from the face
    /// to its left. Unclaimed right cycles get fresh faces.
    pub fn assign_faces(&mut self) {
        let mut active: Vec<ActiveEdge> = Vec::new();

        let mut event_idx = 0;
        while event_idx < self.events.len() {
            let event_vertex = self.events[event_idx];
            let sweep_y = self.vertices[event_vertex].y;

            for incident in self.outgoing_edges(event_vertex) {
                let twin = self.half_edges[incident].twin;
                if let Some(pos) = active.iter().position(|a| a.edge == twin) {
                    active.remove(pos);
                } else {
                    self.insert_active_sorted(
                        &mut active,
                        ActiveEdge {
                            edge: incident,
                            helper: None,
                        },
                        sweep_y,
                    );
                }
            }

            for idx in 0..active.len() {
                let left = active[idx].edge;
                let right = self.half_edges[left].twin;

                if self.half_edges[left].face.is_none() {
                    let face = if idx == 0 {
                        self.outer_face
                    } else {
                        self.half_edges[active[idx - 1].edge]
                            .face
                            .expect("left neighbor has no face")
                    };
                    for e in self.cycle_edges(left) {
                        self.half_edges[e].face = Some(face);
                    }
                    trace!("assigned face {} (area {})", face, self.signed_cycle_area(left));
                }

                if self.half_edges[right].face.is_none() {
                    let face = self.faces.len();
                    self.faces.push(Face {
                        anchor_edge: Some(right),
                    });
                    for e in self.cycle_edges(right) {
                        self.half_edges[e].face = Some(face);
                    }
                    trace!("created face {} (area {})", face, self.signed_cycle_area(right));
                }
            }

            event_idx += 1;
        }
    }

    // ── Monotone partition ────────────────────────────────────────────────────

    /// Classify vertices as merge/split/regular: merge when every
    /// neighbor precedes it in the sweep, split when every neighbor
    /// follows, and neither when its widest angular gap opens onto the
    /// outer face.
    fn assign_vertex_types(&mut self) {
        for vertex_id in 0..self.vertices.len() {
            let edges = self.outgoing_edges(vertex_id);
            if edges.is_empty() {
                continue;
            }

            let v = self.vertex_pos(vertex_id);
            let mut merge = true;
            let mut split = true;
            let mut max_gap_edge: Option<EdgeId> = None;
            let mut max_gap = 0.0;
            let mut prev_angle = 0.0;
            let mut first_angle = 0.0;

            for (idx, &edge) in edges.iter().enumerate() {
                let target = self.vertex_pos(self.edge_target(edge));
                let angle = (target.y - v.y).atan2(target.x - v.x);

                if idx != 0 {
                    let mut gap = angle - prev_angle;
                    if gap < 0.0 {
                        gap += 2.0 * std::f64::consts::PI;
                    }
                    if gap > max_gap {
                        max_gap_edge = Some(edge);
                        max_gap = gap;
                    }
                } else {
                    first_angle = angle;
                }
                prev_angle = angle;

                if target.y < v.y {
                    split = false;
                } else {
                    merge = false;
                }
            }

            let mut gap = first_angle - prev_angle;
            if gap < 0.0 {
                gap += 2.0 * std::f64::consts::PI;
            }
            if gap > max_gap {
                max_gap_edge = Some(edges[0]);
            }

            if let Some(gap_edge) = max_gap_edge {
                if self.half_edges[gap_edge].face == Some(self.outer_face) {
                    split = false;
                    merge = false;
                }
            }

            self.vertices[vertex_id].merge = merge;
            self.vertices[vertex_id].split = split;
        }
    }

    /// Third sweep: connect merge helpers and split vertices with
    /// diagonals so every face is y-monotone.
    pub fn partition(&mut self) {
        self.assign_vertex_types();

        let mut active: Vec<ActiveEdge> = Vec::new();

        let mut event_idx = 0;
        while event_idx < self.events.len() {
            let event_vertex = self.events[event_idx];
            let event_pos = self.vertex_pos(event_vertex);
            let sweep_y = event_pos.y;

            let mut merge_helper: Option<VertexId> = None;
            for incident in self.outgoing_edges(event_vertex) {
                let twin = self.half_edges[incident].twin;
                if let Some(pos) = active.iter().position(|a| a.edge == twin) {
                    let removed = active.remove(pos);
                    if let Some(helper) = removed.helper {
                        if self.vertices[helper].merge {
                            merge_helper = Some(helper);
                        }
                    }
                } else {
                    self.insert_active_sorted(
                        &mut active,
                        ActiveEdge {
                            edge: incident,
                            helper: Some(event_vertex),
                        },
                        sweep_y,
                    );
                }
            }

            if let Some(helper) = merge_helper {
                self.connect_vertices(event_vertex, helper);
            }

            // The closest active edge strictly to the left of the event.
            let mut project_x = -1.0;
            let mut project_idx: Option<usize> = None;
            for (idx, entry) in active.iter().enumerate() {
                let intersect_x = self.edge_intersect_x(entry.edge, sweep_y);
                if self.half_edges[entry.edge].origin != event_vertex
                    && intersect_x > project_x
                    && intersect_x < event_pos.x
                {
                    project_x = intersect_x;
                    project_idx = Some(idx);
                }
            }

            if let Some(idx) = project_idx {
                let helper = active[idx].helper.expect("active edge without helper");
                if self.vertices[helper].merge || self.vertices[event_vertex].split {
                    self.connect_vertices(event_vertex, helper);
                }
                active[idx].helper = Some(event_vertex);
            }

            event_idx += 1;
        }
    }
}

// ── Point-in-path ─────────────────────────────────────────────────────────────

fn sample_on_segment(a: Vec2, b: Vec2, sample: Vec2) -> bool {
    let eps = 1e-5;
    let ab = b.sub(a);
    let ap = sample.sub(a);
    let ab_len_sq = ab.len_sq();
    if ab_len_sq <= 1e-18 {
        return ap.len_sq() <= eps * eps;
    }

    let cross = ap.cross(ab);
    if cross * cross > eps * eps * ab_len_sq {
        return false;
    }

    let dot = ap.dot(ab);
    (-eps..=ab_len_sq + eps).contains(&dot)
}

/// Update winding/parity for one segment under the y-half-open ray rule:
/// a segment counts when exactly one endpoint is at or below the sample
/// row, and its crossing lies strictly to the right.
fn update_crossing(
    a: Vec2,
    b: Vec2,
    sample: Vec2,
    winding: &mut i32,
    parity: &mut i32,
    on_boundary: &mut bool,
) {
    if *on_boundary {
        return;
    }
    if sample_on_segment(a, b, sample) {
        *on_boundary = true;
        return;
    }

    let crosses_up = a.y <= sample.y && b.y > sample.y;
    let crosses_down = a.y > sample.y && b.y <= sample.y;
    if !crosses_up && !crosses_down {
        return;
    }

    let y_delta = b.y - a.y;
    if y_delta.abs() < 1e-18 {
        return;
    }

    let t = (sample.y - a.y) / y_delta;
    let x_intersection = a.x + t * (b.x - a.x);
    if x_intersection <= sample.x {
        return;
    }

    *parity ^= 1;
    *winding += if crosses_up { 1 } else { -1 };
}

/// Ray-cast point containment over a flattened path. Points on a segment
/// count as inside under both fill rules.
pub fn path_contains_point(path: &PathBuilder, fill_rule: FillRule, x: f64, y: f64) -> bool {
    let sample = Vec2::new(x, y);
    let mut winding = 0;
    let mut parity = 0;
    let mut on_boundary = false;

    'contours: for contour in path.contours() {
        if contour.segments.len() < 2 {
            continue;
        }

        let Segment::Start(start) = contour.segments[0] else {
            panic!("path contour must start with a Start segment");
        };
        let mut start = start;
        let mut current = start;
        let mut has_line = false;

        for segment in &contour.segments[1..] {
            match *segment {
                Segment::Start(p) => {
                    start = p;
                    current = p;
                    has_line = false;
                }
                Segment::Line(p) => {
                    update_crossing(current, p, sample, &mut winding, &mut parity, &mut on_boundary);
                    current = p;
                    has_line = true;
                }
                Segment::Quad { .. } | Segment::Cubic { .. } => {
                    panic!("point test requires flattened path segments");
                }
            }
            if on_boundary {
                break 'contours;
            }
        }

        if has_line && !current.approx_eq(start, 1e-9) {
            update_crossing(current, start, sample, &mut winding, &mut parity, &mut on_boundary);
        }
        if on_boundary {
            break;
        }
    }

    on_boundary
        || match fill_rule {
            FillRule::EvenOdd => parity != 0,
            FillRule::Nonzero => winding != 0,
        }
}

// ── Rasterization ─────────────────────────────────────────────────────────────

/// Dedupe a contour's polyline: drop the closing duplicate and any
/// consecutive repeats.
fn collect_contour_points(contour_points: &[Vec2]) -> Vec<Vec2> {
    let mut points: Vec<Vec2> = contour_points.to_vec();

    while points.len() > 1 && points[points.len() - 1].approx_eq(points[0], 1e-9) {
        points.pop();
    }
    if points.len() <= 1 {
        return points;
    }

    let mut deduped: Vec<Vec2> = Vec::with_capacity(points.len());
    deduped.push(points[0]);
    for &p in &points[1..] {
        if !p.approx_eq(*deduped.last().unwrap(), 1e-9) {
            deduped.push(p);
        }
    }
    while deduped.len() > 1 && deduped[deduped.len() - 1].approx_eq(deduped[0], 1e-9) {
        deduped.pop();
    }
    deduped
}

/// Build the edge structure from a flattened path's contours.
fn build_from_path(dcel: &mut Dcel, path: &PathBuilder) -> bool {
    let mut has_edges = false;

    for polyline in path.flattened_contours() {
        let points = collect_contour_points(&polyline);
        if points.len() < 3 {
            continue;
        }

        let first_vertex = dcel.add_vertex(points[0].x, points[0].y);
        let mut prev_vertex = first_vertex;
        let mut first_edge: Option<EdgeId> = None;
        let mut prev_edge: Option<EdgeId> = None;

        for p in &points[1..] {
            let next_vertex = dcel.add_vertex(p.x, p.y);
            let edge = dcel.add_edge(prev_vertex, next_vertex);

            if let Some(prev) = prev_edge {
                let prev_twin = dcel.half_edges[prev].twin;
                let edge_twin = dcel.half_edges[edge].twin;
                dcel.half_edges[prev].next = edge;
                dcel.half_edges[edge].prev = prev;
                dcel.half_edges[prev_twin].prev = edge_twin;
                dcel.half_edges[edge_twin].next = prev_twin;
            } else {
                first_edge = Some(edge);
            }

            prev_vertex = next_vertex;
            prev_edge = Some(edge);
        }

        let first_edge = first_edge.expect("contour with at least two points");
        let prev_edge = prev_edge.expect("contour with at least two points");

        let closing = dcel.add_edge(prev_vertex, first_vertex);
        let closing_twin = dcel.half_edges[closing].twin;
        let first_twin = dcel.half_edges[first_edge].twin;
        let prev_twin = dcel.half_edges[prev_edge].twin;

        dcel.half_edges[first_edge].prev = closing;
        dcel.half_edges[prev_edge].next = closing;
        dcel.half_edges[closing].next = first_edge;
        dcel.half_edges[closing].prev = prev_edge;

        dcel.half_edges[first_twin].next = closing_twin;
        dcel.half_edges[prev_twin].prev = closing_twin;
        dcel.half_edges[closing_twin].next = prev_twin;
        dcel.half_edges[closing_twin].prev = first_twin;

        has_edges = true;
    }

    has_edges
}

fn cycle_bounds(dcel: &Dcel, start: EdgeId) -> (f64, f64, f64, f64) {
    let first = dcel.vertex_pos(dcel.half_edges[start].origin);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for e in dcel.cycle_edges(start) {
        let p = dcel.vertex_pos(dcel.half_edges[e].origin);
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x, max_y)
}

fn cycle_x_intersections(dcel: &Dcel, start: EdgeId, sample_y: f64) -> Vec<f64> {
    let mut intersections = Vec::new();
    for e in dcel.cycle_edges(start) {
        let a = dcel.vertex_pos(dcel.half_edges[e].origin);
        let b = dcel.vertex_pos(dcel.edge_target(e));

        let crosses = (a.y <= sample_y && b.y > sample_y) || (a.y > sample_y && b.y <= sample_y);
        if crosses {
            let y_delta = b.y - a.y;
            if y_delta.abs() > 1e-18 {
                let t = (sample_y - a.y) / y_delta;
                intersections.push(a.x + t * (b.x - a.x));
            }
        }
    }
    intersections
}

/// Device-pixel bounds of the whole path, padded by one pixel.
fn path_raster_bounds(
    path: &PathBuilder,
    width: u32,
    height: u32,
    scale: f64,
) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for polyline in path.flattened_contours() {
        for p in polyline {
            bounds = Some(match bounds {
                None => (p.x, p.y, p.x, p.y),
                Some((min_x, min_y, max_x, max_y)) => (
                    min_x.min(p.x),
                    min_y.min(p.y),
                    max_x.max(p.x),
                    max_y.max(p.y),
                ),
            });
        }
    }
    let (min_x, min_y, max_x, max_y) = bounds?;
    if width == 0 || height == 0 {
        return None;
    }

    let start_x = ((min_x * scale).floor() as i64 - 1).max(0);
    let start_y = ((min_y * scale).floor() as i64 - 1).max(0);
    let end_x = ((max_x * scale).ceil() as i64).min(width as i64 - 1);
    let end_y = ((max_y * scale).ceil() as i64).min(height as i64 - 1);
    if start_x > end_x || start_y > end_y {
        return None;
    }
    Some((start_x as u32, start_y as u32, end_x as u32, end_y as u32))
}

#[allow(clippy::too_many_arguments)]
fn rasterize_cycle(
    dcel: &Dcel,
    start: EdgeId,
    path: &PathBuilder,
    fill_rule: FillRule,
    width: u32,
    height: u32,
    scale: f64,
    mask: &mut [u8],
    accum: &mut MaskBounds,
) {
    let cycle = dcel.cycle_edges(start);
    if cycle.len() < 3 {
        return;
    }

    let (_, min_y, _, max_y) = cycle_bounds(dcel, start);
    let start_y = ((min_y * scale).floor() as i64 - 1).max(0);
    let end_y = ((max_y * scale).ceil() as i64).min(height as i64 - 1);
    if start_y > end_y {
        return;
    }

    let eps = 1e-9;
    for py in start_y..=end_y {
        let sample_y = (py as f64 + 0.5) / scale;
        let mut intersections = cycle_x_intersections(dcel, start, sample_y);
        if intersections.len() < 2 {
            continue;
        }
        intersections.sort_by(|a, b| a.total_cmp(b));

        for pair in intersections.chunks_exact(2) {
            let (x0, x1) = (pair[0].min(pair[1]), pair[0].max(pair[1]));

            let span_start = (((x0 - eps) * scale - 0.5).ceil() as i64).max(0);
            let span_end = (((x1 + eps) * scale - 0.5).floor() as i64).min(width as i64 - 1);
            for px in span_start..=span_end {
                let mask_idx = py as usize * width as usize + px as usize;
                if mask[mask_idx] != 0 {
                    continue;
                }
                // The cycle may be a sub-face of the whole path; the fill
                // rule belongs to the path, so the authoritative test runs
                // against it.
                let sample_x = (px as f64 + 0.5) / scale;
                if !path_contains_point(path, fill_rule, sample_x, sample_y) {
                    continue;
                }
                mask[mask_idx] = 1;
                accum.mark(px as u32, py as u32);
            }
        }
    }

    // Boundary samples can be missed by span filling on tangential rows;
    // test pixel centers in a one-pixel band around each cycle edge.
    for e in cycle {
        let a = dcel.vertex_pos(dcel.half_edges[e].origin);
        let b = dcel.vertex_pos(dcel.edge_target(e));

        let edge_start_x = ((a.x.min(b.x) * scale).floor() as i64 - 1).max(0);
        let edge_end_x = ((a.x.max(b.x) * scale).ceil() as i64 + 1).min(width as i64 - 1);
        let edge_start_y = ((a.y.min(b.y) * scale).floor() as i64 - 1).max(0);
        let edge_end_y = ((a.y.max(b.y) * scale).ceil() as i64 + 1).min(height as i64 - 1);

        for py in edge_start_y..=edge_end_y {
            let sample_y = (py as f64 + 0.5) / scale;
            for px in edge_start_x..=edge_end_x {
                let mask_idx = py as usize * width as usize + px as usize;
                if mask[mask_idx] != 0 {
                    continue;
                }
                let sample = Vec2::new((px as f64 + 0.5) / scale, sample_y);
                if !sample_on_segment(a, b, sample) {
                    continue;
                }
                if !path_contains_point(path, fill_rule, sample.x, sample.y) {
                    continue;
                }
                mask[mask_idx] = 1;
                accum.mark(px as u32, py as u32);
            }
        }
    }
}

/// Rasterize `path` into a width*height byte mask (1 = covered) and
/// report the covered pixel bounds.
///
/// The path is overlaid, partitioned, and its half-edge cycles filled by
/// scanline spans; pixel centers are verified with the authoritative
/// point-in-path test, and a final pass over the path's bounding box
/// closes any residual gaps.
pub fn rasterize_path_mask(
    path: &PathBuilder,
    fill_rule: FillRule,
    width: u32,
    height: u32,
    scale: f64,
) -> (Vec<u8>, MaskBounds) {
    assert!(scale > 1e-6, "coordinate scale too small");

    let mut mask = vec![0u8; width as usize * height as usize];
    let mut bounds = MaskBounds::empty();

    if width == 0 || height == 0 {
        return (mask, bounds);
    }

    let mut dcel = Dcel::new();
    if !build_from_path(&mut dcel, path) {
        return (mask, bounds);
    }

    dcel.overlay();
    dcel.assign_faces();
    dcel.partition();

    for e in 0..dcel.half_edges.len() {
        dcel.half_edges[e].rendered = false;
    }

    for e in 0..dcel.half_edges.len() {
        if dcel.half_edges[e].rendered {
            continue;
        }
        rasterize_cycle(
            &dcel, e, path, fill_rule, width, height, scale, &mut mask, &mut bounds,
        );
        for cycle_edge in dcel.cycle_edges(e) {
            dcel.half_edges[cycle_edge].rendered = true;
        }
    }

    // Residual pass: any pixel of the path's bounding box whose center is
    // inside but was missed by span fills.
    if let Some((min_x, min_y, max_x, max_y)) = path_raster_bounds(path, width, height, scale) {
        for py in min_y..=max_y {
            let sample_y = (py as f64 + 0.5) / scale;
            for px in min_x..=max_x {
                let mask_idx = py as usize * width as usize + px as usize;
                if mask[mask_idx] != 0 {
                    continue;
                }
                let sample_x = (px as f64 + 0.5) / scale;
                if path_contains_point(path, fill_rule, sample_x, sample_y) {
                    mask[mask_idx] = 1;
                    bounds.mark(px, py);
                }
            }
        }
    }

    (mask, bounds)
}
