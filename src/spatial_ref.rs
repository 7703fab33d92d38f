//! Spatial reference derivation from convention metadata.
//!
//! Decoding a spatial reference from CF grid-mapping metadata is delegated to a [`SpatialRefDecoder`].
//! [`CfGridMappingDecoder`] is a minimal decoder that understands explicit WKT definitions and geographic
//! grid mappings. [`grid_mapping_attributes`] encodes a definition the way it decodes.

use serde_json::{Map, Value};

/// The metadata of an array handed to a [`SpatialRefDecoder`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpatialRefMetadata {
    /// The array name.
    pub name: String,
    /// The names of the array dimensions.
    pub dimension_names: Vec<String>,
    /// All attributes of the array.
    pub attributes: Map<String, Value>,
    /// All attributes of the grid-mapping variable named by the `grid_mapping` attribute, if present.
    pub grid_mapping: Option<Map<String, Value>>,
}

/// A decoded spatial reference system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSpatialRef {
    /// The reference system definition, e.g. WKT or an authority code.
    pub definition: String,
    /// The mapping of data axes (x, y) to reference system axes, 1-based.
    ///
    /// `[2, 1]` means the first reference system axis is the data y axis.
    pub axis_mapping: [usize; 2],
}

/// Decodes a spatial reference from convention metadata.
pub trait SpatialRefDecoder: Send + Sync + std::fmt::Debug {
    /// Decode the spatial reference of an array, [`None`] if the metadata does not describe one.
    fn decode(&self, metadata: &SpatialRefMetadata) -> Option<DecodedSpatialRef>;
}

/// The spatial reference of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpatialReference {
    definition: String,
    data_axis_to_srs_axis_mapping: Vec<usize>,
}

impl SpatialReference {
    /// Create a new spatial reference.
    #[must_use]
    pub fn new(definition: String, data_axis_to_srs_axis_mapping: Vec<usize>) -> Self {
        Self {
            definition,
            data_axis_to_srs_axis_mapping,
        }
    }

    /// The reference system definition.
    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// The 1-based array dimension indices of the reference system axes, in reference system axis order.
    #[must_use]
    pub fn data_axis_to_srs_axis_mapping(&self) -> &[usize] {
        &self.data_axis_to_srs_axis_mapping
    }
}

/// A spatial reference decoder for CF grid mappings.
///
/// A grid mapping with a `crs_wkt` or `spatial_ref` attribute decodes to that definition. A
/// `latitude_longitude` grid mapping without either decodes to `EPSG:4326`, whose authority axis order is
/// latitude then longitude.
#[derive(Copy, Clone, Debug, Default)]
pub struct CfGridMappingDecoder;

impl SpatialRefDecoder for CfGridMappingDecoder {
    fn decode(&self, metadata: &SpatialRefMetadata) -> Option<DecodedSpatialRef> {
        let grid_mapping = metadata.grid_mapping.as_ref()?;
        let text = |key: &str| grid_mapping.get(key).and_then(Value::as_str);
        let geographic = text("grid_mapping_name") == Some("latitude_longitude");
        let definition = text("crs_wkt")
            .or_else(|| text("spatial_ref"))
            .map(str::to_string)
            .or_else(|| geographic.then(|| GEOGRAPHIC_AUTHORITY_CODE.to_string()))?;
        let geographic = geographic || is_geographic(&definition);
        Some(DecodedSpatialRef {
            definition,
            axis_mapping: if geographic { [2, 1] } else { [1, 2] },
        })
    }
}

const GEOGRAPHIC_AUTHORITY_CODE: &str = "EPSG:4326";

fn is_geographic(definition: &str) -> bool {
    definition.starts_with("GEOGCS") || definition.starts_with("GEOGCRS")
}

/// The attributes of a CF grid-mapping variable describing `definition`.
///
/// `EPSG:4326` is written as a bare `latitude_longitude` grid mapping. Any other definition is written to
/// both `crs_wkt` and `spatial_ref`, and a geographic WKT definition is also marked `latitude_longitude`.
#[must_use]
pub fn grid_mapping_attributes(definition: &str) -> Vec<(&'static str, String)> {
    let latitude_longitude = ("grid_mapping_name", "latitude_longitude".to_string());
    if definition == GEOGRAPHIC_AUTHORITY_CODE {
        return vec![latitude_longitude];
    }
    let mut attributes = Vec::with_capacity(3);
    if is_geographic(definition) {
        attributes.push(latitude_longitude);
    }
    attributes.push(("crs_wkt", definition.to_string()));
    attributes.push(("spatial_ref", definition.to_string()));
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(grid_mapping: Value) -> SpatialRefMetadata {
        SpatialRefMetadata {
            name: "temp".to_string(),
            dimension_names: vec!["y".to_string(), "x".to_string()],
            attributes: Map::new(),
            grid_mapping: grid_mapping.as_object().cloned(),
        }
    }

    #[test]
    fn cf_decoder_geographic() {
        let decoded = CfGridMappingDecoder
            .decode(&metadata(json!({"grid_mapping_name": "latitude_longitude"})))
            .unwrap();
        assert_eq!(decoded.definition, "EPSG:4326");
        assert_eq!(decoded.axis_mapping, [2, 1]);
    }

    #[test]
    fn cf_decoder_projected_wkt() {
        let decoded = CfGridMappingDecoder
            .decode(&metadata(json!({
                "grid_mapping_name": "transverse_mercator",
                "crs_wkt": "PROJCRS[\"UTM 33N\"]"
            })))
            .unwrap();
        assert_eq!(decoded.definition, "PROJCRS[\"UTM 33N\"]");
        assert_eq!(decoded.axis_mapping, [1, 2]);
    }

    #[test]
    fn cf_decoder_unknown() {
        assert!(CfGridMappingDecoder
            .decode(&metadata(json!({"grid_mapping_name": "polar_stereographic"})))
            .is_none());
        assert!(CfGridMappingDecoder
            .decode(&SpatialRefMetadata::default())
            .is_none());
    }

    #[test]
    fn grid_mapping_attributes_decode_back() {
        for (definition, axis_mapping) in [
            ("EPSG:4326", [2, 1]),
            ("GEOGCS[\"WGS 84\"]", [2, 1]),
            ("PROJCRS[\"UTM 33N\"]", [1, 2]),
        ] {
            let attributes: Map<String, Value> = grid_mapping_attributes(definition)
                .into_iter()
                .map(|(name, value)| (name.to_string(), Value::String(value)))
                .collect();
            let decoded = CfGridMappingDecoder.decode(&metadata(Value::Object(attributes))).unwrap();
            assert_eq!(decoded.definition, definition);
            assert_eq!(decoded.axis_mapping, axis_mapping);
        }
        assert_eq!(grid_mapping_attributes("EPSG:4326").len(), 1);
    }
}
