//! Static world graph: planets, regions and transport points
//!
//! Built once at process start and read-only thereafter. Region identity is
//! `(planet, region, level)`; the level disambiguates same-named multi-floor
//! areas (0 = ground, positive floors above, negative below).

use crate::match_image::Rect;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct Planet {
    pub id: String,
    pub name: String,
}

/// Stable addressing key for map assets. Must not change across versions,
/// or cached assets stop resolving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegionKey {
    pub planet_id: String,
    pub region_id: String,
    pub level: i32,
}

impl std::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.planet_id, floor_id(&self.region_id, self.level))
    }
}

fn floor_id(region_id: &str, level: i32) -> String {
    match level {
        0 => region_id.to_string(),
        l if l > 0 => format!("{region_id}-l{l}"),
        l => format!("{region_id}-b{}", l.abs()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub planet_id: String,
    pub level: i32,
}

impl Region {
    pub fn key(&self) -> RegionKey {
        RegionKey {
            planet_id: self.planet_id.clone(),
            region_id: self.id.clone(),
            level: self.level,
        }
    }

    /// Region id with floor suffix, e.g. `srcd-l2` or `xzq-b1`.
    pub fn floor_id(&self) -> String {
        floor_id(&self.id, self.level)
    }

    /// Full asset id including the planet, used to address map files.
    pub fn asset_id(&self) -> String {
        format!("{}-{}", self.planet_id, self.floor_id())
    }

    pub fn is_another_floor(&self) -> bool {
        self.level != 0
    }
}

/// A fixed teleport/interaction anchor inside one region, matched on the
/// large map by a named template.
#[derive(Debug, Clone, Serialize)]
pub struct TransportPoint {
    pub id: String,
    pub name: String,
    pub region: RegionKey,
    pub template_id: String,
    /// Pixel coordinate on the region's large map.
    pub lm_pos: (u32, u32),
}

/// Read-only directed world structure: nodes are regions, edges are floor
/// transitions and transport links. Never mutated after construction.
#[derive(Debug, Default)]
pub struct WorldGraph {
    planets: Vec<Planet>,
    regions: Vec<Region>,
    points: Vec<TransportPoint>,
}

impl WorldGraph {
    pub fn builder() -> WorldGraphBuilder {
        WorldGraphBuilder::default()
    }

    pub fn planet(&self, id: &str) -> Option<&Planet> {
        self.planets.iter().find(|p| p.id == id)
    }

    pub fn planet_by_name(&self, name: &str) -> Option<&Planet> {
        self.planets.iter().find(|p| p.name == name)
    }

    pub fn region(&self, key: &RegionKey) -> Option<&Region> {
        self.regions.iter().find(|r| &r.key() == key)
    }

    pub fn region_by_name(&self, planet_id: &str, name: &str, level: i32) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.planet_id == planet_id && r.name == name && r.level == level)
    }

    pub fn regions_of(&self, planet_id: &str) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.planet_id == planet_id)
    }

    /// The same region on a different floor, if it exists.
    pub fn region_with_floor(&self, region: &Region, level: i32) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.planet_id == region.planet_id && r.id == region.id && r.level == level)
    }

    pub fn points_of(&self, key: &RegionKey) -> Vec<&TransportPoint> {
        self.points.iter().filter(|p| &p.region == key).collect()
    }

    pub fn point(&self, key: &RegionKey, point_id: &str) -> Option<&TransportPoint> {
        self.points
            .iter()
            .find(|p| &p.region == key && p.id == point_id)
    }

    /// Transport points of a region grouped by template id, restricted to a
    /// large-map rectangle when one is given.
    pub fn points_by_template_in_rect(
        &self,
        key: &RegionKey,
        rect: Option<&Rect>,
    ) -> HashMap<String, Vec<&TransportPoint>> {
        let mut grouped: HashMap<String, Vec<&TransportPoint>> = HashMap::new();
        for point in self.points_of(key) {
            let inside = rect.is_none_or(|r| r.contains(point.lm_pos.0, point.lm_pos.1));
            if inside {
                grouped
                    .entry(point.template_id.clone())
                    .or_default()
                    .push(point);
            }
        }
        grouped
    }
}

#[derive(Debug, Default)]
pub struct WorldGraphBuilder {
    graph: WorldGraph,
}

impl WorldGraphBuilder {
    pub fn planet(mut self, id: &str, name: &str) -> Self {
        self.graph.planets.push(Planet {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn region(mut self, planet_id: &str, id: &str, name: &str, level: i32) -> Self {
        self.graph.regions.push(Region {
            id: id.to_string(),
            name: name.to_string(),
            planet_id: planet_id.to_string(),
            level,
        });
        self
    }

    pub fn transport_point(
        mut self,
        region: RegionKey,
        id: &str,
        name: &str,
        template_id: &str,
        lm_pos: (u32, u32),
    ) -> Self {
        self.graph.points.push(TransportPoint {
            id: id.to_string(),
            name: name.to_string(),
            region,
            template_id: template_id.to_string(),
            lm_pos,
        });
        self
    }

    pub fn build(self) -> WorldGraph {
        self.graph
    }
}
