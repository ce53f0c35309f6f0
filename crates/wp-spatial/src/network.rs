//! Road segments and the routable road graph.
//!
//! # Segments vs. graph
//!
//! [`RoadSegment`] is the authored record: polyline geometry plus optional
//! topology (source/target vertex, per-direction cost).  It is what the
//! import produces and what topology repair mutates.
//!
//! [`RoadGraph`] is built from repaired segments and never mutated.  Vertex
//! ids are mapped to dense [`NodeIdx`] values **in ascending `VertexId`
//! order**, so comparing node indices is the same as comparing vertex ids.
//!
//! # Data layout
//!
//! Outgoing arcs use **Compressed Sparse Row (CSR)** format.  Given a
//! `NodeIdx n`, its outgoing arcs occupy
//!
//! ```text
//! arc_*[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! Each segment contributes up to two arcs: forward (geometry order) and
//! reverse.  A direction whose cost is infinite contributes nothing.

use rustc_hash::FxHashMap;

use wp_core::{ArcId, EdgeId, GeoPoint, NodeIdx, VertexId, polyline_length_m};

// ── OneWay ────────────────────────────────────────────────────────────────────

/// Permitted travel direction relative to the segment's geometry order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OneWay {
    #[default]
    Both,
    /// Travel only from the first coordinate to the last.
    Forward,
    /// Travel only from the last coordinate to the first.
    Backward,
}

impl OneWay {
    /// Parse OSM shapefile codes (`B`, `F`, `T`) and the common OSM tag
    /// values (`yes`, `no`, `-1`).  Empty or unknown values mean both ways.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "f" | "yes" | "true" | "1" => Self::Forward,
            "t" | "-1" | "reverse" => Self::Backward,
            _ => Self::Both,
        }
    }

    /// OSM shapefile code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Both => "B",
            Self::Forward => "F",
            Self::Backward => "T",
        }
    }
}

// ── RoadSegment ───────────────────────────────────────────────────────────────

/// One road segment as imported.  `None` topology fields mean "unset".
#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    pub id:           EdgeId,
    /// Ordered polyline, at least two coordinates for a usable segment.
    pub geometry:     Vec<GeoPoint>,
    /// Cost of travelling in geometry order, metres.
    pub cost:         Option<f64>,
    /// Cost of travelling against geometry order, metres.
    pub reverse_cost: Option<f64>,
    pub source:       Option<VertexId>,
    pub target:       Option<VertexId>,
    pub oneway:       OneWay,
    pub name:         Option<String>,
    /// OSM road class (`primary`, `track`, …).
    pub fclass:       Option<String>,
    /// Set by topology repair when an endpoint could not be linked.
    pub excluded:     bool,
}

impl RoadSegment {
    /// An unlinked, uncosted, two-way segment.
    pub fn new(id: EdgeId, geometry: Vec<GeoPoint>) -> Self {
        Self {
            id,
            geometry,
            cost: None,
            reverse_cost: None,
            source: None,
            target: None,
            oneway: OneWay::Both,
            name: None,
            fclass: None,
            excluded: false,
        }
    }

    /// Builder-style helper: set both endpoints.
    pub fn linked(mut self, source: VertexId, target: VertexId) -> Self {
        self.source = Some(source);
        self.target = Some(target);
        self
    }

    /// Builder-style helper: set both costs.
    pub fn costed(mut self, cost: f64, reverse_cost: f64) -> Self {
        self.cost = Some(cost);
        self.reverse_cost = Some(reverse_cost);
        self
    }

    pub fn with_oneway(mut self, oneway: OneWay) -> Self {
        self.oneway = oneway;
        self
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    #[inline]
    pub fn is_costed(&self) -> bool {
        self.cost.is_some() && self.reverse_cost.is_some()
    }

    /// `true` when the router may use this segment.
    pub fn is_routable(&self) -> bool {
        !self.excluded && self.is_linked() && self.geometry.len() >= 2
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.geometry.first().copied()
    }

    pub fn end(&self) -> Option<GeoPoint> {
        self.geometry.last().copied()
    }

    /// Geodesic length of the polyline in metres.
    pub fn length_m(&self) -> f64 {
        polyline_length_m(&self.geometry)
    }

    /// Costs derived from geometry when none are recorded: the polyline
    /// length in every permitted direction, infinity in a forbidden one.
    pub fn default_costs(&self) -> (f64, f64) {
        let len = self.length_m();
        match self.oneway {
            OneWay::Both => (len, len),
            OneWay::Forward => (len, f64::INFINITY),
            OneWay::Backward => (f64::INFINITY, len),
        }
    }

    /// Recorded costs, falling back per direction to [`default_costs`].
    ///
    /// [`default_costs`]: Self::default_costs
    pub fn effective_costs(&self) -> (f64, f64) {
        if let (Some(f), Some(r)) = (self.cost, self.reverse_cost) {
            return (f, r);
        }
        let (df, dr) = self.default_costs();
        (self.cost.unwrap_or(df), self.reverse_cost.unwrap_or(dr))
    }
}

// ── Vertex ────────────────────────────────────────────────────────────────────

/// A graph vertex materialised from segment endpoints.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub id:       VertexId,
    pub position: GeoPoint,
}

/// Materialise the vertex set referenced by `segments`, ascending by id.
///
/// A vertex takes its position from the lowest-id segment that references
/// it: the first coordinate for a `source`, the last for a `target` (source
/// first on the same segment).  Input order does not matter.  Excluded
/// segments and segments without geometry do not contribute.
pub fn collect_vertices<'a>(segments: impl IntoIterator<Item = &'a RoadSegment>) -> Vec<Vertex> {
    let mut seen: FxHashMap<VertexId, (EdgeId, GeoPoint)> = FxHashMap::default();
    let mut offer = |v: VertexId, edge: EdgeId, p: GeoPoint| {
        seen.entry(v)
            .and_modify(|slot| {
                if edge < slot.0 {
                    *slot = (edge, p);
                }
            })
            .or_insert((edge, p));
    };
    for seg in segments.into_iter().filter(|s| !s.excluded) {
        if let (Some(v), Some(p)) = (seg.source, seg.start()) {
            offer(v, seg.id, p);
        }
        if let (Some(v), Some(p)) = (seg.target, seg.end()) {
            offer(v, seg.id, p);
        }
    }
    let mut vertices: Vec<Vertex> = seen
        .into_iter()
        .map(|(id, (_, position))| Vertex { id, position })
        .collect();
    vertices.sort_unstable_by_key(|v| v.id);
    vertices
}

// ── RoadGraph ─────────────────────────────────────────────────────────────────

/// Directed road graph in CSR format.
///
/// All array fields are `pub` for direct indexed access on hot paths.  Build
/// with [`RoadGraph::from_segments`].
pub struct RoadGraph {
    // ── Node data (indexed by NodeIdx) ────────────────────────────────────
    /// External id of each node, strictly ascending.
    pub vertex_ids: Vec<VertexId>,
    pub vertex_pos: Vec<GeoPoint>,

    // ── CSR arc adjacency ─────────────────────────────────────────────────
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Arc data (indexed by ArcId) ───────────────────────────────────────
    pub arc_from:     Vec<NodeIdx>,
    pub arc_to:       Vec<NodeIdx>,
    /// Finite, non-negative traversal cost in metres.
    pub arc_cost:     Vec<f64>,
    /// Position of the owning segment in `edge_ids` / `edge_geometry`.
    pub arc_segment:  Vec<u32>,
    /// `true` when the arc runs against the segment's geometry order.
    pub arc_reversed: Vec<bool>,

    // ── Segment data ──────────────────────────────────────────────────────
    pub edge_ids:      Vec<EdgeId>,
    pub edge_geometry: Vec<Vec<GeoPoint>>,

    node_of: FxHashMap<VertexId, NodeIdx>,
}

struct RawArc {
    from:     NodeIdx,
    to:       NodeIdx,
    cost:     f64,
    segment:  u32,
    reversed: bool,
}

#[inline]
fn usable_cost(c: f64) -> bool {
    c.is_finite() && c >= 0.0
}

impl RoadGraph {
    /// A graph with no vertices or arcs.  Every routing request against it
    /// fails with `VertexNotFound`.
    pub fn empty() -> Self {
        Self::from_segments(&[])
    }

    /// Build the graph from (ideally repaired) segments.
    ///
    /// Segments that are excluded, unlinked, or have fewer than two
    /// coordinates are skipped.  Missing costs fall back to
    /// [`RoadSegment::effective_costs`]; negative or non-finite costs remove
    /// that direction.
    ///
    /// Time complexity: O(E log E) for the arc sort.
    pub fn from_segments(segments: &[RoadSegment]) -> Self {
        let routable: Vec<&RoadSegment> = segments.iter().filter(|s| s.is_routable()).collect();
        let skipped = segments.len() - routable.len();
        if skipped > 0 {
            log::debug!("road graph: skipped {skipped} non-routable segments");
        }

        // Nodes in ascending VertexId order.
        let vertices = collect_vertices(routable.iter().copied());
        let node_count = vertices.len();
        let mut node_of: FxHashMap<VertexId, NodeIdx> =
            FxHashMap::with_capacity_and_hasher(node_count, Default::default());
        for (i, v) in vertices.iter().enumerate() {
            node_of.insert(v.id, NodeIdx(i as u32));
        }

        let mut raw: Vec<RawArc> = Vec::with_capacity(routable.len() * 2);
        let mut edge_ids = Vec::with_capacity(routable.len());
        let mut edge_geometry = Vec::with_capacity(routable.len());
        for seg in &routable {
            let (Some(s), Some(t)) = (seg.source, seg.target) else { continue };
            let (from, to) = (node_of[&s], node_of[&t]);
            let slot = edge_ids.len() as u32;
            let (fwd, rev) = seg.effective_costs();

            let mut used = false;
            if usable_cost(fwd) {
                raw.push(RawArc { from, to, cost: fwd, segment: slot, reversed: false });
                used = true;
            }
            if usable_cost(rev) {
                raw.push(RawArc { from: to, to: from, cost: rev, segment: slot, reversed: true });
                used = true;
            }
            if used {
                edge_ids.push(seg.id);
                edge_geometry.push(seg.geometry.clone());
            }
        }

        // Sort by source node for CSR construction; stable so parallel arcs
        // keep segment order.
        raw.sort_by_key(|a| a.from.0);

        let mut node_out_start = vec![0u32; node_count + 1];
        for a in &raw {
            node_out_start[a.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, raw.len());

        let graph = RoadGraph {
            vertex_ids:   vertices.iter().map(|v| v.id).collect(),
            vertex_pos:   vertices.iter().map(|v| v.position).collect(),
            node_out_start,
            arc_from:     raw.iter().map(|a| a.from).collect(),
            arc_to:       raw.iter().map(|a| a.to).collect(),
            arc_cost:     raw.iter().map(|a| a.cost).collect(),
            arc_segment:  raw.iter().map(|a| a.segment).collect(),
            arc_reversed: raw.iter().map(|a| a.reversed).collect(),
            edge_ids,
            edge_geometry,
            node_of,
        };
        log::debug!(
            "road graph: {} vertices, {} arcs from {} segments",
            graph.node_count(),
            graph.arc_count(),
            graph.edge_ids.len()
        );
        graph
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.vertex_ids.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arc_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_ids.is_empty()
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    #[inline]
    pub fn node_of(&self, vertex: VertexId) -> Option<NodeIdx> {
        self.node_of.get(&vertex).copied()
    }

    #[inline]
    pub fn vertex_id(&self, node: NodeIdx) -> VertexId {
        self.vertex_ids[node.index()]
    }

    /// All vertices, ascending by id.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.vertex_ids
            .iter()
            .zip(&self.vertex_pos)
            .map(|(&id, &position)| Vertex { id, position })
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    /// `ArcId`s of all outgoing arcs from `node`.  A contiguous index range.
    #[inline]
    pub fn out_arcs(&self, node: NodeIdx) -> impl Iterator<Item = ArcId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| ArcId(i as u32))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeIdx) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    /// The road segment an arc was built from.
    #[inline]
    pub fn arc_edge(&self, arc: ArcId) -> EdgeId {
        self.edge_ids[self.arc_segment[arc.index()] as usize]
    }

    /// Coordinates along `arc` in travel order.
    pub fn arc_geometry(&self, arc: ArcId) -> impl Iterator<Item = GeoPoint> + '_ {
        let geom = &self.edge_geometry[self.arc_segment[arc.index()] as usize];
        let reversed = self.arc_reversed[arc.index()];
        (0..geom.len()).map(move |i| if reversed { geom[geom.len() - 1 - i] } else { geom[i] })
    }
}
