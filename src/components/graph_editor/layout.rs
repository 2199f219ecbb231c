use std::f64::consts::PI;

use log::debug;

use super::positions::PositionCache;
use super::types::{GraphSnapshot, Node, Placement, Point};
use crate::config::LayoutConfig;

/// d3's linear congruential generator, used only to break exact overlaps.
#[derive(Clone, Debug)]
struct Lcg(u32);

impl Lcg {
	fn next(&mut self) -> f64 {
		self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
		self.0 as f64 / 4_294_967_296.0
	}

	fn jiggle(&mut self) -> f64 {
		(self.next() - 0.5) * 1e-6
	}
}

#[derive(Clone, Copy, Debug)]
struct Link {
	source: usize,
	target: usize,
	strength: f64,
	bias: f64,
}

/// Spot on a sunflower spiral around `center`, for nodes that have never
/// been placed.
pub fn initial_placement(i: usize, center: Point) -> Point {
	let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
	let radius = 10.0 * (0.5 + i as f64).sqrt();
	Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Force-directed layout stepped one tick at a time by the host.
///
/// Each tick applies a spring along every edge, many-body repulsion,
/// centering and collision, then integrates velocities. Pinned nodes are
/// held at their pin.
#[derive(Clone, Debug)]
pub struct Layout {
	config: LayoutConfig,
	center: Point,
	links: Vec<Link>,
	velocities: Vec<Point>,
	alpha: f64,
	alpha_decay: f64,
	suspended: bool,
	halted: bool,
	jiggle: Lcg,
}

impl Layout {
	pub fn new(config: LayoutConfig, center: Point) -> Self {
		let alpha_decay = config.full_alpha_decay();
		Self {
			config,
			center,
			links: Vec::new(),
			velocities: Vec::new(),
			alpha: 1.0,
			alpha_decay,
			suspended: false,
			halted: false,
			jiggle: Lcg(1),
		}
	}

	pub fn center(&self) -> Point {
		self.center
	}

	pub fn set_center(&mut self, center: Point) {
		self.center = center;
	}

	#[cfg(test)]
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	#[cfg(test)]
	pub fn alpha_decay(&self) -> f64 {
		self.alpha_decay
	}

	/// Rebuilds the simulation against the current node and edge sets.
	///
	/// Nodes with a cached position are moved back to it. When any node was
	/// restored the simulation starts cool so the picture settles instead of
	/// rearranging.
	pub fn rebuild(&mut self, graph: &mut GraphSnapshot, cache: &PositionCache) {
		let mut restored = 0usize;
		for node in &mut graph.nodes {
			if let Some(at) = cache.get(&node.id) {
				node.placement = match node.placement {
					Placement::Pinned(pin) => Placement::Pinned(pin),
					Placement::Simulated(_) => Placement::Simulated(at),
				};
				restored += 1;
			}
		}

		let mut degree = vec![0usize; graph.nodes.len()];
		let pairs = graph.edge_indices();
		for &(s, t) in &pairs {
			degree[s] += 1;
			degree[t] += 1;
		}
		self.links = pairs
			.into_iter()
			.map(|(source, target)| {
				let (ds, dt) = (degree[source] as f64, degree[target] as f64);
				Link {
					source,
					target,
					strength: 1.0 / ds.min(dt),
					bias: ds / (ds + dt),
				}
			})
			.collect();
		self.velocities = vec![Point::default(); graph.nodes.len()];

		if restored > 0 {
			self.alpha = self.config.settle_alpha;
			self.alpha_decay = self.config.settle_alpha_decay;
		} else {
			self.alpha = 1.0;
			self.alpha_decay = self.config.full_alpha_decay();
		}
		self.halted = false;
		debug!(
			"layout rebuilt: {} nodes, {} links, {} restored, alpha {}",
			graph.nodes.len(),
			self.links.len(),
			restored,
			self.alpha
		);
	}

	/// True while ticks would move nodes.
	pub fn is_running(&self) -> bool {
		!self.halted && !self.suspended && self.alpha >= self.config.alpha_min
	}

	pub fn is_suspended(&self) -> bool {
		self.suspended
	}

	/// Freezes stepping while a pointer button is held.
	pub fn suspend(&mut self) {
		self.suspended = true;
	}

	/// Resumes after a pointer release at low energy.
	pub fn resume(&mut self) {
		self.suspended = false;
		self.alpha = self.config.settle_alpha;
	}

	/// Stops for good; only a rebuild restarts it.
	pub fn stop(&mut self) {
		self.halted = true;
	}

	/// Advances one tick. Returns false when nothing moved, either because
	/// the layout is idle or because `nodes` no longer matches the last
	/// rebuild.
	pub fn step(&mut self, nodes: &mut [Node]) -> bool {
		if !self.is_running() || self.velocities.len() != nodes.len() {
			return false;
		}

		self.alpha += (0.0 - self.alpha) * self.alpha_decay;
		let mut pos: Vec<Point> = nodes.iter().map(Node::position).collect();

		self.apply_links(&pos);
		self.apply_charge(&pos);
		self.apply_center(&mut pos);
		self.apply_collision(&pos);

		let keep = 1.0 - self.config.velocity_decay;
		for ((node, p), v) in nodes.iter_mut().zip(pos).zip(self.velocities.iter_mut()) {
			match node.placement {
				Placement::Pinned(_) => *v = Point::default(),
				Placement::Simulated(_) => {
					v.x *= keep;
					v.y *= keep;
					node.placement = Placement::Simulated(Point::new(p.x + v.x, p.y + v.y));
				}
			}
		}
		true
	}

	fn apply_links(&mut self, pos: &[Point]) {
		let (alpha, distance) = (self.alpha, self.config.link_distance);
		for link in &self.links {
			let (s, t) = (link.source, link.target);
			if s == t {
				continue;
			}
			let (vs, vt) = (self.velocities[s], self.velocities[t]);
			let mut x = pos[t].x + vt.x - pos[s].x - vs.x;
			let mut y = pos[t].y + vt.y - pos[s].y - vs.y;
			if x == 0.0 {
				x = self.jiggle.jiggle();
			}
			if y == 0.0 {
				y = self.jiggle.jiggle();
			}
			let l = (x * x + y * y).sqrt();
			let k = (l - distance) / l * alpha * link.strength;
			let (x, y) = (x * k, y * k);
			self.velocities[t].x -= x * link.bias;
			self.velocities[t].y -= y * link.bias;
			self.velocities[s].x += x * (1.0 - link.bias);
			self.velocities[s].y += y * (1.0 - link.bias);
		}
	}

	fn apply_charge(&mut self, pos: &[Point]) {
		let strength = self.config.charge_strength * self.alpha;
		for i in 0..pos.len() {
			for j in 0..pos.len() {
				if i == j {
					continue;
				}
				let mut x = pos[j].x - pos[i].x;
				let mut y = pos[j].y - pos[i].y;
				if x == 0.0 {
					x = self.jiggle.jiggle();
				}
				if y == 0.0 {
					y = self.jiggle.jiggle();
				}
				let mut l = x * x + y * y;
				if l < 1.0 {
					l = l.sqrt();
				}
				let w = strength / l;
				self.velocities[i].x += x * w;
				self.velocities[i].y += y * w;
			}
		}
	}

	fn apply_center(&self, pos: &mut [Point]) {
		if pos.is_empty() {
			return;
		}
		let n = pos.len() as f64;
		let (sx, sy) = pos
			.iter()
			.fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
		let (dx, dy) = (sx / n - self.center.x, sy / n - self.center.y);
		for p in pos.iter_mut() {
			p.x -= dx;
			p.y -= dy;
		}
	}

	fn apply_collision(&mut self, pos: &[Point]) {
		let r = self.config.collision_radius;
		let reach = r + r;
		for i in 0..pos.len() {
			let xi = pos[i].x + self.velocities[i].x;
			let yi = pos[i].y + self.velocities[i].y;
			for j in (i + 1)..pos.len() {
				let mut x = xi - pos[j].x - self.velocities[j].x;
				let mut y = yi - pos[j].y - self.velocities[j].y;
				let mut l = x * x + y * y;
				if l >= reach * reach {
					continue;
				}
				if x == 0.0 {
					x = self.jiggle.jiggle();
					l += x * x;
				}
				if y == 0.0 {
					y = self.jiggle.jiggle();
					l += y * y;
				}
				let l = l.sqrt();
				let k = (reach - l) / l;
				let (x, y) = (x * k, y * k);
				// equal radii split the push evenly
				self.velocities[i].x += x * 0.5;
				self.velocities[i].y += y * 0.5;
				self.velocities[j].x -= x * 0.5;
				self.velocities[j].y -= y * 0.5;
			}
		}
	}
}
