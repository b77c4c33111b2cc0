//! In-memory catalog built from GeoJSON `FeatureCollection` documents.
//!
//! Each document becomes one reference map. The catalog is immutable once
//! built, so lookups from concurrent workers need no locking.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::{AttributeSummary, Catalog, CatalogError, Extent, ReferenceSummary};
use crate::config::ReferenceMapConfig;

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug)]
struct Feature {
    properties: Map<String, Value>,
    extent: Option<Extent>,
}

impl Feature {
    fn text(&self, attribute: &str) -> Option<String> {
        self.properties.get(attribute).map(property_text)
    }
}

#[derive(Debug)]
struct ReferenceMap {
    key_attribute: String,
    /// Attribute names in first-seen order with the JSON type of their first non-null value
    attributes: Vec<(String, String)>,
    geometry_type: Option<String>,
    features: Vec<Feature>,
}

impl ReferenceMap {
    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    fn find(&self, reference: &str, attribute: &str, key: &str) -> Result<&Feature, CatalogError> {
        let not_found = || CatalogError::KeyNotFound {
            reference: reference.to_string(),
            attribute: attribute.to_string(),
            key: key.to_string(),
        };
        if key.is_empty() {
            return Err(not_found());
        }
        self.features
            .iter()
            .find(|f| f.text(attribute).as_deref() == Some(key))
            .ok_or_else(not_found)
    }
}

/// Catalog of GeoJSON reference maps keyed by name
#[derive(Debug, Default)]
pub struct GeoJsonCatalog {
    maps: BTreeMap<String, ReferenceMap>,
}

impl GeoJsonCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every reference map listed in the configuration
    pub fn from_config(maps: &[ReferenceMapConfig]) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for map in maps {
            catalog.load_file(&map.name, &map.key_attribute, &map.path)?;
        }
        Ok(catalog)
    }

    pub fn load_file(
        &mut self,
        name: &str,
        key_attribute: &str,
        path: &Path,
    ) -> Result<(), CatalogError> {
        let document = std::fs::read_to_string(path).map_err(|e| CatalogError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.insert_document(name, key_attribute, &document)
    }

    /// Parse `document` and register it as reference map `name`.
    ///
    /// `key_attribute` is the map's advertised raster key property; at least
    /// one feature must carry it.
    pub fn insert_document(
        &mut self,
        name: &str,
        key_attribute: &str,
        document: &str,
    ) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidDocument {
            name: name.to_string(),
            reason,
        };

        let collection: FeatureCollection =
            serde_json::from_str(document).map_err(|e| invalid(e.to_string()))?;
        if collection.kind != "FeatureCollection" {
            return Err(invalid(format!("unexpected type '{}'", collection.kind)));
        }

        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut geometry_type = None;
        let mut features = Vec::with_capacity(collection.features.len());

        for raw in collection.features {
            let properties = raw.properties.unwrap_or_default();
            for (key, value) in &properties {
                match attributes.iter_mut().find(|(n, _)| n == key) {
                    Some((_, kind)) if kind == "null" => *kind = json_kind(value).to_string(),
                    Some(_) => {}
                    None => attributes.push((key.clone(), json_kind(value).to_string())),
                }
            }

            let extent = raw.geometry.as_ref().and_then(|geometry| {
                if geometry_type.is_none() {
                    geometry_type = geometry
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                geometry_extent(geometry)
            });

            features.push(Feature { properties, extent });
        }

        if !attributes.iter().any(|(n, _)| n == key_attribute) {
            return Err(invalid(format!(
                "no feature carries key attribute '{}'",
                key_attribute
            )));
        }

        debug!(
            reference = name,
            features = features.len(),
            attributes = attributes.len(),
            "Loaded reference map"
        );

        self.maps.insert(
            name.to_string(),
            ReferenceMap {
                key_attribute: key_attribute.to_string(),
                attributes,
                geometry_type,
                features,
            },
        );
        Ok(())
    }

    fn map(&self, id: &str) -> Result<&ReferenceMap, CatalogError> {
        self.maps
            .get(id)
            .ok_or_else(|| CatalogError::UnknownReference(id.to_string()))
    }
}

impl Catalog for GeoJsonCatalog {
    fn reference_exists(&self, id: &str) -> Result<bool, CatalogError> {
        Ok(self.maps.contains_key(id))
    }

    fn reference_attribute_exists(&self, id: &str, attr_key: &str) -> Result<bool, CatalogError> {
        Ok(self
            .maps
            .get(id)
            .is_some_and(|map| map.has_attribute(attr_key)))
    }

    fn lookup_attribute_values(
        &self,
        id: &str,
        attr_key: &str,
        raster_key: &str,
        attr_names: &[String],
    ) -> Result<Vec<String>, CatalogError> {
        let map = self.map(id)?;
        let feature = map.find(id, attr_key, raster_key)?;
        attr_names
            .iter()
            .map(|name| {
                feature
                    .text(name)
                    .ok_or_else(|| CatalogError::UnknownAttribute {
                        reference: id.to_string(),
                        attribute: name.clone(),
                    })
            })
            .collect()
    }

    fn lookup_extent(
        &self,
        id: &str,
        attr_key: &str,
        raster_key: &str,
    ) -> Result<Extent, CatalogError> {
        let feature = self.map(id)?.find(id, attr_key, raster_key)?;
        feature.extent.ok_or_else(|| CatalogError::MissingGeometry {
            reference: id.to_string(),
            key: raster_key.to_string(),
        })
    }

    fn list_references(&self) -> Result<Vec<ReferenceSummary>, CatalogError> {
        Ok(self
            .maps
            .iter()
            .map(|(name, map)| ReferenceSummary {
                name: name.clone(),
                key_attribute: map.key_attribute.clone(),
                feature_count: map.features.len(),
                geometry_type: map.geometry_type.clone(),
            })
            .collect())
    }

    fn reference_attributes(&self, id: &str) -> Result<Vec<AttributeSummary>, CatalogError> {
        Ok(self
            .map(id)?
            .attributes
            .iter()
            .map(|(name, kind)| AttributeSummary {
                name: name.clone(),
                kind: kind.clone(),
            })
            .collect())
    }
}

/// Render a property value the way it is used in keys and directory names
fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bounding box over every position in a GeoJSON geometry of any type
fn geometry_extent(geometry: &Value) -> Option<Extent> {
    let mut extent = None;
    if let Some(coordinates) = geometry.get("coordinates") {
        collect_positions(coordinates, &mut extent);
    }
    if let Some(Value::Array(members)) = geometry.get("geometries") {
        for member in members {
            if let Some(member_extent) = geometry_extent(member) {
                merge(&mut extent, member_extent.min_x, member_extent.min_y);
                merge(&mut extent, member_extent.max_x, member_extent.max_y);
            }
        }
    }
    extent
}

fn collect_positions(value: &Value, extent: &mut Option<Extent>) {
    let Value::Array(items) = value else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => merge(extent, x, y),
        _ => {
            for item in items {
                collect_positions(item, extent);
            }
        }
    }
}

fn merge(extent: &mut Option<Extent>, x: f64, y: f64) {
    match extent {
        Some(e) => e.include(x, y),
        None => *extent = Some(Extent::new(x, y, x, y)),
    }
}
