//! GeoJSON geodata index.
//!
//! Recursively scans a geodata directory for `*.geojson` files and indexes
//! features by their identifying property: `zone_id`/`area_id` polygons
//! (patrol areas), `route_id` linestrings (shipping lanes), `base_id`
//! points (stations), and `landmass` polygons (the terrain mask).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use geo::{LineString, MultiPolygon, Point, Polygon};
use geojson::{FeatureCollection, GeoJson};
use tracing::{info, warn};

/// Indexed geodata for a scenario directory.
#[derive(Default)]
pub struct GeodataIndex {
    zones: HashMap<String, MultiPolygon<f64>>,
    routes: HashMap<String, LineString<f64>>,
    bases: HashMap<String, (f64, f64)>,
    land: Vec<Polygon<f64>>,
}

impl GeodataIndex {
    /// Load every GeoJSON file under `dir`. Unreadable or malformed files
    /// are logged and skipped; a missing directory yields an empty index.
    pub fn load(dir: &Path) -> Self {
        let mut index = Self::default();
        let mut files = Vec::new();
        collect_geojson_files(dir, &mut files);

        for path in files {
            match std::fs::read_to_string(&path) {
                Ok(raw) => match raw.parse::<GeoJson>() {
                    Ok(geojson) => index.ingest(geojson),
                    Err(e) => warn!("Failed to parse {}: {e}", path.display()),
                },
                Err(e) => warn!("Failed to read {}: {e}", path.display()),
            }
        }

        info!(
            "Loaded geodata: {} zones, {} routes, {} bases, {} land polygons",
            index.zones.len(),
            index.routes.len(),
            index.bases.len(),
            index.land.len()
        );
        index
    }

    fn ingest(&mut self, geojson: GeoJson) {
        let features = match geojson {
            GeoJson::FeatureCollection(FeatureCollection { features, .. }) => features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => return,
        };

        for feature in features {
            let Some(geometry) = feature.geometry.as_ref() else {
                continue;
            };
            let props = feature.properties.as_ref();

            let get_str = |key: &str| -> Option<String> {
                props
                    .and_then(|p| p.get(key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };
            let zone_id = get_str("zone_id").or_else(|| get_str("area_id"));
            let route_id = get_str("route_id");
            let base_id = get_str("base_id");
            let is_land = props
                .and_then(|p| p.get("landmass"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if is_land {
                if let Ok(polygon) = Polygon::try_from(geometry.clone()) {
                    self.land.push(polygon);
                } else if let Ok(mp) = MultiPolygon::try_from(geometry.clone()) {
                    self.land.extend(mp.0);
                }
                continue;
            }

            if let Some(id) = zone_id {
                if let Ok(polygon) = Polygon::try_from(geometry.clone()) {
                    self.zones.insert(id, MultiPolygon(vec![polygon]));
                } else if let Ok(mp) = MultiPolygon::try_from(geometry.clone()) {
                    self.zones.insert(id, mp);
                }
            } else if let Some(id) = route_id {
                if let Ok(line) = LineString::try_from(geometry.clone()) {
                    self.routes.insert(id, line);
                }
            } else if let Some(id) = base_id {
                if let Ok(point) = Point::try_from(geometry.clone()) {
                    self.bases.insert(id, (point.y(), point.x()));
                }
            }
        }
    }

    /// First polygon of a named zone (patrol areas use a single ring).
    pub fn zone_polygon(&self, id: &str) -> Option<&Polygon<f64>> {
        self.zones.get(id).and_then(|mp| mp.0.first())
    }

    pub fn zone(&self, id: &str) -> Option<&MultiPolygon<f64>> {
        self.zones.get(id)
    }

    pub fn route(&self, id: &str) -> Option<&LineString<f64>> {
        self.routes.get(id)
    }

    pub fn base(&self, id: &str) -> Option<(f64, f64)> {
        self.bases.get(id).copied()
    }

    pub fn zone_ids(&self) -> Vec<&str> {
        self.zones.keys().map(String::as_str).collect()
    }

    pub fn has_zone(&self, id: &str) -> bool {
        self.zones.contains_key(id)
    }

    pub fn has_route(&self, id: &str) -> bool {
        self.routes.contains_key(id)
    }

    /// Land polygons for the terrain mask.
    pub fn land_mask(&self) -> MultiPolygon<f64> {
        MultiPolygon(self.land.clone())
    }
}

fn collect_geojson_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_geojson_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "geojson") {
            out.push(path);
        }
    }
}
