// Barnes-Hut quadtree backed by a node arena. One tree lives for exactly one
// step: build, aggregate, query, drop.

use smallvec::SmallVec;

use crate::shared::{Bounds, Float, Particle, Vector};

pub type NodeId = usize;

pub const ROOT: NodeId = 0;

/// Mass and position of a body as stored in a leaf.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMass<F: Float> {
    pub mass: F,
    pub position: Vector<F>,
}

#[derive(Clone, Debug)]
pub struct Node<F: Float> {
    pub bounds: Bounds<F>,
    pub depth: usize,
    pub mass: F,
    pub center_of_mass: Vector<F>,
    // one entry except in cells that hit the depth cap
    pub occupants: SmallVec<[PointMass<F>; 1]>,
    pub children: [Option<NodeId>; 4],
}

impl<F: Float> Node<F> {
    fn new(bounds: Bounds<F>, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            mass: F::zero(),
            center_of_mass: Vector::zeros(),
            occupants: SmallVec::new(),
            children: [None; 4],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

/// Constants needed by a force query.
#[derive(Clone, Copy, Debug)]
pub struct ForceParams<F: Float> {
    pub theta: F,
    pub gravity_constant: F,
    pub timestep: F,
    pub softening: F,
}

/// A tree under construction. Aggregates are not valid yet, so it cannot be
/// queried; call [`QuadTree::aggregate`] once every body is inserted.
#[derive(Clone, Debug)]
pub struct QuadTree<F: Float> {
    nodes: Vec<Node<F>>,
    max_depth: usize,
    inserted: usize,
    dropped: usize,
}

impl<F: Float> QuadTree<F> {
    pub fn new(bounds: Bounds<F>, max_depth: usize) -> Self {
        Self::with_capacity(bounds, max_depth, 1)
    }

    pub fn with_capacity(bounds: Bounds<F>, max_depth: usize, bodies: usize) -> Self {
        // the arena still grows past this when bodies cluster
        let estimate = bodies.saturating_mul(2).max(1);
        let mut nodes = Vec::with_capacity(estimate);
        nodes.push(Node::new(bounds, 0));
        Self {
            nodes,
            max_depth,
            inserted: 0,
            dropped: 0,
        }
    }

    /// Builds a tree holding every particle that lies inside `bounds`.
    pub fn build<'a, P, It>(bounds: Bounds<F>, max_depth: usize, particles: It) -> Self
    where
        P: Particle<F> + 'a,
        It: IntoIterator<Item = &'a P>,
        It::IntoIter: ExactSizeIterator,
    {
        let particles = particles.into_iter();
        let mut tree = Self::with_capacity(bounds, max_depth, particles.len());
        for p in particles {
            tree.insert(p);
        }
        tree
    }

    /// Inserts one particle. Returns `false` when it lies outside the root
    /// bounds and was dropped.
    pub fn insert<P: Particle<F>>(&mut self, particle: &P) -> bool {
        let point = PointMass {
            mass: particle.get_mass(),
            position: *particle.position(),
        };
        let accepted = self.insert_at(ROOT, point);
        if accepted {
            self.inserted += 1;
        } else {
            self.dropped += 1;
            log::trace!("dropped body at {:?}: outside tree bounds", point.position);
        }
        accepted
    }

    fn insert_at(&mut self, id: NodeId, point: PointMass<F>) -> bool {
        if !self.nodes[id].bounds.contains(&point.position) {
            return false;
        }

        if self.nodes[id].is_leaf() {
            let node = &self.nodes[id];
            if node.occupants.is_empty()
                || node.depth >= self.max_depth
                || !node.bounds.can_split()
            {
                self.nodes[id].occupants.push(point);
                return true;
            }

            self.subdivide(id);
            let dislodged = std::mem::take(&mut self.nodes[id].occupants);
            for existing in dislodged {
                self.insert_into_children(id, existing);
            }
        }

        self.insert_into_children(id, point)
    }

    // Every child is tried; the half-open bounds make at most one accept.
    fn insert_into_children(&mut self, id: NodeId, point: PointMass<F>) -> bool {
        let children = self.nodes[id].children;
        let mut accepted = false;
        for child in children.into_iter().flatten() {
            accepted |= self.insert_at(child, point);
        }
        accepted
    }

    fn subdivide(&mut self, id: NodeId) {
        let bounds = self.nodes[id].bounds;
        let depth = self.nodes[id].depth + 1;
        for quadrant in 0..4 {
            let child = self.nodes.len();
            self.nodes.push(Node::new(bounds.create_quadrant(quadrant), depth));
            self.nodes[id].children[quadrant] = Some(child);
        }
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Computes mass and center of mass of every node, children first.
    pub fn aggregate(mut self) -> MassTree<F> {
        // Children are always pushed after their parent, so walking the arena
        // backwards visits every child before its parent.
        for id in (0..self.nodes.len()).rev() {
            let node = &self.nodes[id];
            let (mass, center_of_mass) = if node.is_leaf() {
                weighted_center(node.occupants.iter().map(|o| (o.mass, o.position)))
            } else {
                weighted_center(
                    node.children
                        .into_iter()
                        .flatten()
                        .map(|c| (self.nodes[c].mass, self.nodes[c].center_of_mass)),
                )
            };

            let node = &mut self.nodes[id];
            node.mass = mass;
            node.center_of_mass = center_of_mass;
        }

        MassTree {
            nodes: self.nodes,
            inserted: self.inserted,
            dropped: self.dropped,
        }
    }
}

// A single massive part passes its position through unchanged: `p * m / m`
// is not always `p`, and the self-interaction guard compares exactly.
fn weighted_center<F: Float>(parts: impl Iterator<Item = (F, Vector<F>)>) -> (F, Vector<F>) {
    let mut mass = F::zero();
    let mut weighted: Vector<F> = Vector::zeros();
    let mut only = None;
    let mut count = 0usize;
    for (m, position) in parts.filter(|(m, _)| *m > F::zero()) {
        mass = mass + m;
        weighted += position * m;
        only = Some(position);
        count += 1;
    }
    match (count, only) {
        (0, _) | (_, None) => (F::zero(), Vector::zeros()),
        (1, Some(position)) => (mass, position),
        _ => (mass, weighted / mass),
    }
}

/// A fully aggregated tree, read-only and safe to query from many threads.
#[derive(Clone, Debug)]
pub struct MassTree<F: Float> {
    nodes: Vec<Node<F>>,
    inserted: usize,
    dropped: usize,
}

impl<F: Float> MassTree<F> {
    pub fn root(&self) -> &Node<F> {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> &Node<F> {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node<F>] {
        &self.nodes
    }

    pub fn total_mass(&self) -> F {
        self.root().mass
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Leaf whose bounds contain `position`, if the position is inside the tree.
    pub fn leaf_containing(&self, position: &Vector<F>) -> Option<NodeId> {
        let mut id = ROOT;
        if !self.nodes[id].bounds.contains(position) {
            return None;
        }
        loop {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return Some(id);
            }
            id = node
                .children
                .into_iter()
                .flatten()
                .find(|&c| self.nodes[c].bounds.contains(position))?;
        }
    }

    /// Applies the approximate gravitational pull of the whole tree to the
    /// particle's velocity and returns the number of nodes visited.
    ///
    /// Velocity is kicked at every accepted node rather than accumulated into
    /// an acceleration first; position is left untouched.
    pub fn compute_force<P: Particle<F>>(&self, particle: &mut P, params: &ForceParams<F>) -> usize {
        let mut visited = 0;
        self.visit(ROOT, particle, params, &mut visited);
        visited
    }

    fn visit<P: Particle<F>>(
        &self,
        id: NodeId,
        particle: &mut P,
        params: &ForceParams<F>,
        visited: &mut usize,
    ) {
        *visited += 1;
        let node = &self.nodes[id];
        if node.mass == F::zero() || *particle.position() == node.center_of_mass {
            return;
        }

        let direction = node.center_of_mass - *particle.position();
        let softening2 = params.softening * params.softening;
        let distance = num_traits::Float::sqrt(direction.norm_squared() + softening2);
        let ratio = node.bounds.width() / distance;

        if node.is_leaf() || ratio < params.theta {
            if node.occupants.len() > 1 {
                for occupant in &node.occupants {
                    if occupant.position == *particle.position() {
                        continue;
                    }
                    let direction = occupant.position - *particle.position();
                    let distance = num_traits::Float::sqrt(direction.norm_squared() + softening2);
                    kick(particle, occupant.mass, direction, distance, params);
                }
            } else {
                kick(particle, node.mass, direction, distance, params);
            }
        } else {
            for child in node.children.into_iter().flatten() {
                self.visit(child, particle, params, visited);
            }
        }
    }
}

fn kick<F: Float, P: Particle<F>>(
    particle: &mut P,
    mass: F,
    direction: Vector<F>,
    distance: F,
    params: &ForceParams<F>,
) {
    let own_mass = particle.get_mass();
    let force = params.gravity_constant * mass * own_mass
        / (distance * distance + params.softening * params.softening);
    let acceleration = direction / distance * (force / own_mass);
    *particle.velocity_mut() += acceleration * params.timestep;
}
