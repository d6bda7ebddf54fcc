//! Link color: categorical value-to-color lookup, or quantitative
//! palette interpolation over a normalised measure.
//!
//! Grounded on
//! `examples/original_source/src/floweaver/compiler/execute.py`
//! (`_apply_color`/`_interpolate_color`/`_hex_to_rgb`) for the evaluation
//! contract, and `examples/original_source/floweaver/color_scales.py`
//! (`CategoricalScale`/`QuantitativeScale`) for palette-cycling semantics.
//! `color_scales.py` resolves named palettes through `palettable`, which has
//! no Rust equivalent; a small fixed set of the same palettes' hex values is
//! reproduced here instead of pulling in an unrelated crate for a handful of
//! constant color lists.

use crate::error::{CompileError, CompileResult};
use crate::partition_router::EdgeKey;
use crate::spec::{CategoricalColorSpec, CategoricalMarker, DisplaySpec, ColorSpec, QuantitativeColorSpec, QuantitativeMarker};
use std::collections::BTreeMap;

pub const DEFAULT_CATEGORICAL_PALETTE: &str = "Pastel1_8";
pub const DEFAULT_SEQUENTIAL_PALETTE: &str = "Reds_9";
pub const DEFAULT_CATEGORICAL_COLOR: &str = "#cccccc";

/// `colorbrewer` qualitative palettes, reproduced as their published hex
/// values (a handful, not the full set `palettable` ships).
fn qualitative_palette(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "Pastel1_8" => Some(&[
            "#fbb4ae", "#b3cde3", "#ccebc5", "#decbe4", "#fed9a6", "#ffffcc", "#e5d8bd", "#fddaec",
        ]),
        "Set1_9" => Some(&[
            "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf",
            "#999999",
        ]),
        "Dark2_8" => Some(&[
            "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
        ]),
        _ => None,
    }
}

/// `colorbrewer` sequential palettes, 9-step reproductions.
fn sequential_palette(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "Reds_9" => Some(&[
            "#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d", "#a50f15",
            "#67000d",
        ]),
        "Blues_9" => Some(&[
            "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
            "#08306b",
        ]),
        "Greens_9" => Some(&[
            "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45", "#006d2c",
            "#00441b",
        ]),
        _ => None,
    }
}

fn resolve_palette(name: &str, lookup: fn(&str) -> Option<&'static [&'static str]>) -> CompileResult<Vec<String>> {
    lookup(name)
        .map(|colors| colors.iter().map(|s| s.to_string()).collect())
        .ok_or_else(|| CompileError::InvalidColorSpec(format!("no palette named \"{name}\"")))
}

/// Build a categorical color spec: explicit `mapping` entries win, any
/// attribute value not covered is assigned the next color of `palette_name`
/// (default [`DEFAULT_CATEGORICAL_PALETTE`]) in the order its values are
/// first seen across `edge_specs`, cycling once the palette is exhausted.
/// The resulting lookup is complete after this call returns — no further
/// palette state is carried into execution (§4.8's "no side effects during
/// execution" contract).
pub fn build_categorical_color_spec(
    attribute: &str,
    palette_name: Option<&str>,
    mapping: Option<&BTreeMap<String, String>>,
    default: Option<&str>,
    edge_specs: &[crate::spec::EdgeSpec],
) -> CompileResult<CategoricalColorSpec> {
    let palette = resolve_palette(
        palette_name.unwrap_or(DEFAULT_CATEGORICAL_PALETTE),
        qualitative_palette,
    )?;
    let mut lookup: BTreeMap<String, String> = mapping.cloned().unwrap_or_default();

    let mut next = 0usize;
    for edge in edge_specs {
        let value = edge_attribute_value(edge, attribute);
        if !lookup.contains_key(&value) {
            lookup.insert(value, palette[next % palette.len()].clone());
            next += 1;
        }
    }

    Ok(CategoricalColorSpec {
        kind: CategoricalMarker::Categorical,
        attribute: attribute.to_string(),
        lookup,
        default: default.unwrap_or(DEFAULT_CATEGORICAL_COLOR).to_string(),
    })
}

fn edge_attribute_value(edge: &crate::spec::EdgeSpec, attribute: &str) -> String {
    match attribute {
        "type" => edge.material.clone(),
        "source" => edge.source.clone().unwrap_or_default(),
        "target" => edge.target.clone().unwrap_or_default(),
        "time" => edge.time.clone(),
        _ => String::new(),
    }
}

/// Build a quantitative color spec. `domain` is fixed at compile time (the
/// spec is a pure frozen value, §9): the caller supplies it explicitly,
/// since no flow data is available yet to auto-range it the way
/// `color_scales.py`'s `QuantitativeScale.set_domain_from` does against a
/// loaded dataset.
pub fn build_quantitative_color_spec(
    attribute: &str,
    palette_name: Option<&str>,
    domain: (f64, f64),
    intensity: Option<&str>,
) -> CompileResult<QuantitativeColorSpec> {
    let palette = resolve_palette(
        palette_name.unwrap_or(DEFAULT_SEQUENTIAL_PALETTE),
        sequential_palette,
    )?;
    Ok(QuantitativeColorSpec {
        kind: QuantitativeMarker::Quantitative,
        attribute: attribute.to_string(),
        palette,
        domain,
        intensity: intensity.map(str::to_string),
    })
}

fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    (r, g, b)
}

/// Linearly interpolate a color from `palette` at position `t ∈ [0, 1]`.
fn interpolate_color(palette: &[String], t: f64) -> String {
    if palette.is_empty() {
        return DEFAULT_CATEGORICAL_COLOR.to_string();
    }
    let idx = t * (palette.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (lo + 1).min(palette.len() - 1);
    if lo == hi {
        return palette[lo].clone();
    }
    let frac = idx - lo as f64;
    let (r_lo, g_lo, b_lo) = hex_to_rgb(&palette[lo]);
    let (r_hi, g_hi, b_hi) = hex_to_rgb(&palette[hi]);
    let r = r_lo as f64 + frac * (r_hi as f64 - r_lo as f64);
    let g = g_lo as f64 + frac * (g_hi as f64 - g_lo as f64);
    let b = b_lo as f64 + frac * (b_hi as f64 - b_lo as f64);
    format!("#{:02x}{:02x}{:02x}", r as u8, g as u8, b as u8)
}

/// Compute one link's color from its edge, its aggregated measure data, and
/// the display spec's color configuration.
pub fn apply_color(edge: &crate::spec::EdgeSpec, data: &BTreeMap<String, f64>, display: &DisplaySpec) -> String {
    match &display.link_color {
        ColorSpec::Categorical(spec) => {
            let value = match spec.attribute.as_str() {
                "type" | "source" | "target" | "time" => edge_attribute_value(edge, &spec.attribute),
                attr => data.get(attr).map(|v| v.to_string()).unwrap_or_default(),
            };
            spec.lookup.get(&value).cloned().unwrap_or_else(|| spec.default.clone())
        }
        ColorSpec::Quantitative(spec) => {
            let mut value = *data.get(&spec.attribute).unwrap_or(&0.0);
            if let Some(intensity_attr) = &spec.intensity {
                let intensity_value = *data.get(intensity_attr).unwrap_or(&1.0);
                if intensity_value != 0.0 {
                    value /= intensity_value;
                }
            }
            let (min, max) = spec.domain;
            let normed = if max != min { (value - min) / (max - min) } else { 0.5 };
            let normed = normed.clamp(0.0, 1.0);
            interpolate_color(&spec.palette, normed)
        }
    }
}

/// Dedupe candidate edges for tests/internal consumers that only need the
/// set of distinct [`EdgeKey`]s, not the full spec.
#[cfg(test)]
fn distinct_edge_keys(edges: &[EdgeKey]) -> std::collections::BTreeSet<EdgeKey> {
    edges.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EdgeSpec;

    fn edge(material: &str) -> EdgeSpec {
        EdgeSpec {
            source: Some("a".to_string()),
            target: Some("b".to_string()),
            material: material.to_string(),
            time: "_".to_string(),
            bundle_ids: vec!["b1".to_string()],
        }
    }

    #[test]
    fn categorical_cycles_through_palette_in_first_seen_order() {
        let edges = vec![edge("steel"), edge("iron"), edge("steel")];
        let spec = build_categorical_color_spec("type", None, None, None, &edges).unwrap();
        assert_eq!(spec.lookup.len(), 2);
        assert_ne!(spec.lookup["steel"], spec.lookup["iron"]);
    }

    #[test]
    fn categorical_explicit_mapping_wins() {
        let edges = vec![edge("steel")];
        let mapping = BTreeMap::from([("steel".to_string(), "#123456".to_string())]);
        let spec = build_categorical_color_spec("type", None, Some(&mapping), None, &edges).unwrap();
        assert_eq!(spec.lookup["steel"], "#123456");
    }

    #[test]
    fn unknown_palette_errors() {
        let err = build_categorical_color_spec("type", Some("NoSuchPalette"), None, None, &[]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidColorSpec(_)));
    }

    #[test]
    fn quantitative_interpolates_between_endpoints() {
        let spec = build_quantitative_color_spec("value", Some("Reds_9"), (0.0, 10.0), None).unwrap();
        let display = DisplaySpec {
            link_width: "value".to_string(),
            link_color: ColorSpec::Quantitative(spec.clone()),
        };
        let e = edge("steel");
        let low = apply_color(&e, &BTreeMap::from([("value".to_string(), 0.0)]), &display);
        let high = apply_color(&e, &BTreeMap::from([("value".to_string(), 10.0)]), &display);
        assert_eq!(low, spec.palette[0]);
        assert_eq!(high, spec.palette[spec.palette.len() - 1]);
    }

    #[test]
    fn quantitative_divides_by_intensity() {
        let spec = build_quantitative_color_spec("value", None, (0.0, 1.0), Some("count")).unwrap();
        let display = DisplaySpec {
            link_width: "value".to_string(),
            link_color: ColorSpec::Quantitative(spec),
        };
        let e = edge("steel");
        let data = BTreeMap::from([("value".to_string(), 4.0), ("count".to_string(), 2.0)]);
        // 4 / 2 = 2.0, above domain max 1.0 -> clamped to 1.0 -> last palette color.
        let color = apply_color(&e, &data, &display);
        if let ColorSpec::Quantitative(q) = &display.link_color {
            assert_eq!(color, q.palette[q.palette.len() - 1]);
        }
    }

    #[test]
    fn distinct_edge_keys_dedupes() {
        let key = EdgeKey {
            source: Some("a".to_string()),
            target: Some("b".to_string()),
            material: "m".to_string(),
            time: "_".to_string(),
        };
        let keys = distinct_edge_keys(&[key.clone(), key.clone()]);
        assert_eq!(keys.len(), 1);
    }
}
