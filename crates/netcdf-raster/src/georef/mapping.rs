//! Grid-mapping projection table shared by inference and emission.
//!
//! Each entry pairs a CF `grid_mapping_name` with the WKT method(s) it
//! corresponds to and the ordered attribute-to-parameter list. Standard
//! parallels and the geostationary sweep axis do not map one to one, so
//! each entry names the rule that handles them.

use projection::srs::{methods, params};
use projection::{Ellipsoid, GeogCs, SpatialRef};

use crate::store::AttrValue;

pub const GRID_MAPPING_NAME: &str = "grid_mapping_name";
pub const LATITUDE_LONGITUDE: &str = "latitude_longitude";

pub const EARTH_RADIUS: &str = "earth_radius";
pub const SEMI_MAJOR_AXIS: &str = "semi_major_axis";
pub const SEMI_MINOR_AXIS: &str = "semi_minor_axis";
pub const INVERSE_FLATTENING: &str = "inverse_flattening";
pub const LONGITUDE_OF_PRIME_MERIDIAN: &str = "longitude_of_prime_meridian";

const STANDARD_PARALLEL: &str = "standard_parallel";
const STANDARD_PARALLEL_1: &str = "standard_parallel_1";
const STANDARD_PARALLEL_2: &str = "standard_parallel_2";
const LATITUDE_OF_PROJECTION_ORIGIN: &str = "latitude_of_projection_origin";
const SCALE_FACTOR_AT_PROJECTION_ORIGIN: &str = "scale_factor_at_projection_origin";
const SWEEP_ANGLE_AXIS: &str = "sweep_angle_axis";
const SWEEP_X: &str = "+sweep=x";

/// One attribute of a grid-mapping variable and its CRS parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamMapping {
    pub attr: &'static str,
    pub param: &'static str,
    pub default: f64,
}

const fn p(attr: &'static str, param: &'static str, default: f64) -> ParamMapping {
    ParamMapping {
        attr,
        param,
        default,
    }
}

const FALSE_EASTING: ParamMapping = p("false_easting", params::FALSE_EASTING, 0.0);
const FALSE_NORTHING: ParamMapping = p("false_northing", params::FALSE_NORTHING, 0.0);

/// Handling of attributes that do not map one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRule {
    None,
    /// One parallel selects the 1SP method, two the 2SP method
    Conic,
    /// Always two parallels; a single value is repeated
    ParallelPair,
    /// Standard parallel selects the 2SP method, else the scale factor applies
    Mercator,
    /// Standard parallel is the latitude of true scale, else origin and scale
    Polar,
    /// Single standard parallel
    SingleParallel,
    /// Sweep axis carried in the CRS extension
    Sweep,
}

/// A CF projection and its CRS counterpart.
#[derive(Debug)]
pub struct ProjectionKind {
    pub cf_name: &'static str,
    /// WKT methods, the default first
    pub methods: &'static [&'static str],
    pub params: &'static [ParamMapping],
    pub rule: SpecialRule,
}

impl ProjectionKind {
    fn default_method(&self) -> &'static str {
        self.methods[0]
    }
}

pub static PROJECTIONS: &[ProjectionKind] = &[
    ProjectionKind {
        cf_name: "albers_conical_equal_area",
        methods: &[methods::ALBERS_CONIC_EQUAL_AREA],
        params: &[
            p("longitude_of_central_meridian", params::LONGITUDE_OF_CENTER, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_CENTER, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::ParallelPair,
    },
    ProjectionKind {
        cf_name: "azimuthal_equidistant",
        methods: &[methods::AZIMUTHAL_EQUIDISTANT],
        params: &[
            p("longitude_of_projection_origin", params::LONGITUDE_OF_CENTER, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_CENTER, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::None,
    },
    ProjectionKind {
        cf_name: "lambert_azimuthal_equal_area",
        methods: &[methods::LAMBERT_AZIMUTHAL_EQUAL_AREA],
        params: &[
            p("longitude_of_projection_origin", params::LONGITUDE_OF_CENTER, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_CENTER, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::None,
    },
    ProjectionKind {
        cf_name: "lambert_conformal_conic",
        methods: &[
            methods::LAMBERT_CONFORMAL_CONIC_2SP,
            methods::LAMBERT_CONFORMAL_CONIC_1SP,
        ],
        params: &[
            p("longitude_of_central_meridian", params::CENTRAL_MERIDIAN, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_ORIGIN, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::Conic,
    },
    ProjectionKind {
        cf_name: "lambert_cylindrical_equal_area",
        methods: &[methods::CYLINDRICAL_EQUAL_AREA],
        params: &[
            p("longitude_of_central_meridian", params::CENTRAL_MERIDIAN, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::SingleParallel,
    },
    ProjectionKind {
        cf_name: "mercator",
        methods: &[methods::MERCATOR_1SP, methods::MERCATOR_2SP],
        params: &[
            p("longitude_of_projection_origin", params::CENTRAL_MERIDIAN, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::Mercator,
    },
    ProjectionKind {
        cf_name: "orthographic",
        methods: &[methods::ORTHOGRAPHIC],
        params: &[
            p("longitude_of_projection_origin", params::CENTRAL_MERIDIAN, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_ORIGIN, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::None,
    },
    ProjectionKind {
        cf_name: "polar_stereographic",
        methods: &[methods::POLAR_STEREOGRAPHIC],
        params: &[
            p("straight_vertical_longitude_from_pole", params::CENTRAL_MERIDIAN, 0.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::Polar,
    },
    ProjectionKind {
        cf_name: "stereographic",
        methods: &[methods::STEREOGRAPHIC],
        params: &[
            p("longitude_of_projection_origin", params::CENTRAL_MERIDIAN, 0.0),
            p(LATITUDE_OF_PROJECTION_ORIGIN, params::LATITUDE_OF_ORIGIN, 0.0),
            p(SCALE_FACTOR_AT_PROJECTION_ORIGIN, params::SCALE_FACTOR, 1.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::None,
    },
    ProjectionKind {
        cf_name: "transverse_mercator",
        methods: &[methods::TRANSVERSE_MERCATOR],
        params: &[
            p("latitude_of_projection_origin", params::LATITUDE_OF_ORIGIN, 0.0),
            p("longitude_of_central_meridian", params::CENTRAL_MERIDIAN, 0.0),
            p("scale_factor_at_central_meridian", params::SCALE_FACTOR, 1.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::None,
    },
    ProjectionKind {
        cf_name: "geostationary",
        methods: &[methods::GEOSTATIONARY_SATELLITE],
        params: &[
            p("longitude_of_projection_origin", params::CENTRAL_MERIDIAN, 0.0),
            p("perspective_point_height", params::SATELLITE_HEIGHT, 35_785_831.0),
            FALSE_EASTING,
            FALSE_NORTHING,
        ],
        rule: SpecialRule::Sweep,
    },
];

pub fn lookup_cf(name: &str) -> Option<&'static ProjectionKind> {
    PROJECTIONS
        .iter()
        .find(|k| k.cf_name.eq_ignore_ascii_case(name.trim()))
}

pub fn lookup_method(method: &str) -> Option<&'static ProjectionKind> {
    PROJECTIONS
        .iter()
        .find(|k| k.methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
}

/// Whether `srs` is fully expressible with grid-mapping attributes.
pub fn is_convention_projection(srs: &SpatialRef) -> bool {
    srs.method().map_or(true, |m| lookup_method(m).is_some())
}

// =============================================================================
// Inference
// =============================================================================

/// Attribute lookup on a grid-mapping variable.
pub trait AttrSource {
    fn attr(&self, name: &str) -> Option<AttrValue>;

    fn number(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(|v| v.first_f64())
    }

    fn numbers(&self, name: &str) -> Option<Vec<f64>> {
        self.attr(name).and_then(|v| v.to_f64_vec())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.attr(name).and_then(|v| v.as_text().map(str::to_string))
    }
}

impl<F: Fn(&str) -> Option<AttrValue>> AttrSource for F {
    fn attr(&self, name: &str) -> Option<AttrValue> {
        self(name)
    }
}

/// Geographic base from datum attributes, if any are present.
pub fn geog_from_attrs(src: &dyn AttrSource) -> Option<GeogCs> {
    let prime_meridian = src.number(LONGITUDE_OF_PRIME_MERIDIAN);
    let ellipsoid = if let Some(r) = src.number(EARTH_RADIUS) {
        Some(Ellipsoid::sphere(r))
    } else if let Some(a) = src.number(SEMI_MAJOR_AXIS) {
        match (src.number(INVERSE_FLATTENING), src.number(SEMI_MINOR_AXIS)) {
            (Some(rf), _) => Some(Ellipsoid::new("unnamed", a, rf)),
            (None, Some(b)) => Some(Ellipsoid::from_axes("unnamed", a, b)),
            (None, None) => Some(Ellipsoid::sphere(a)),
        }
    } else {
        None
    };

    match (ellipsoid, prime_meridian) {
        (None, None) => None,
        (ellipsoid, pm) => Some(GeogCs::new(
            "unnamed",
            "unnamed",
            ellipsoid.unwrap_or_else(Ellipsoid::wgs84),
            pm.unwrap_or(0.0),
        )),
    }
}

/// Up to two standard parallels, from the multi-value attribute or the
/// individually named ones.
fn standard_parallels(src: &dyn AttrSource) -> Vec<f64> {
    if let Some(values) = src.numbers(STANDARD_PARALLEL) {
        if !values.is_empty() {
            return values.into_iter().take(2).collect();
        }
    }
    [STANDARD_PARALLEL_1, STANDARD_PARALLEL_2]
        .iter()
        .filter_map(|name| src.number(name))
        .collect()
}

/// Build the CRS of `kind` from grid-mapping attributes.
pub fn build_srs(kind: &ProjectionKind, src: &dyn AttrSource, geog: GeogCs) -> SpatialRef {
    let mut method = kind.default_method();
    let mut parameters: Vec<(String, f64)> = kind
        .params
        .iter()
        .map(|m| (m.param.to_string(), src.number(m.attr).unwrap_or(m.default)))
        .collect();
    let parallels = standard_parallels(src);
    let scale = src.number(SCALE_FACTOR_AT_PROJECTION_ORIGIN);
    let ps = &mut parameters;

    match kind.rule {
        SpecialRule::None | SpecialRule::Sweep => {}
        SpecialRule::Conic => match parallels.as_slice() {
            [sp1, sp2] => {
                set_param(ps, params::STANDARD_PARALLEL_1, *sp1);
                set_param(ps, params::STANDARD_PARALLEL_2, *sp2);
            }
            [sp] => {
                method = methods::LAMBERT_CONFORMAL_CONIC_1SP;
                set_param(ps, params::LATITUDE_OF_ORIGIN, *sp);
                set_param(ps, params::SCALE_FACTOR, scale.unwrap_or(1.0));
            }
            _ => {
                method = methods::LAMBERT_CONFORMAL_CONIC_1SP;
                set_param(ps, params::SCALE_FACTOR, scale.unwrap_or(1.0));
            }
        },
        SpecialRule::ParallelPair => {
            let sp1 = parallels.first().copied().unwrap_or(0.0);
            let sp2 = parallels.get(1).copied().unwrap_or(sp1);
            set_param(ps, params::STANDARD_PARALLEL_1, sp1);
            set_param(ps, params::STANDARD_PARALLEL_2, sp2);
        }
        SpecialRule::SingleParallel => {
            let sp = parallels.first().copied().unwrap_or(0.0);
            set_param(ps, params::STANDARD_PARALLEL_1, sp);
        }
        SpecialRule::Mercator => match parallels.first() {
            Some(sp) => {
                method = methods::MERCATOR_2SP;
                set_param(ps, params::STANDARD_PARALLEL_1, *sp);
            }
            None => set_param(ps, params::SCALE_FACTOR, scale.unwrap_or(1.0)),
        },
        SpecialRule::Polar => match parallels.first() {
            Some(sp) => {
                set_param(ps, params::LATITUDE_OF_ORIGIN, *sp);
                set_param(ps, params::SCALE_FACTOR, 1.0);
            }
            None => {
                let origin = src.number(LATITUDE_OF_PROJECTION_ORIGIN).unwrap_or(90.0);
                set_param(ps, params::LATITUDE_OF_ORIGIN, origin);
                set_param(ps, params::SCALE_FACTOR, scale.unwrap_or(1.0));
            }
        },
    }

    let mut srs = SpatialRef::projected(geog, method, parameters);
    if kind.rule == SpecialRule::Sweep
        && src
            .text(SWEEP_ANGLE_AXIS)
            .is_some_and(|axis| axis.trim().eq_ignore_ascii_case("x"))
    {
        srs.set_extension(SWEEP_X);
    }
    srs
}

// =============================================================================
// Emission
// =============================================================================

/// Datum attributes of `geog`.
pub fn datum_attrs(geog: &GeogCs) -> Vec<(String, AttrValue)> {
    let e = &geog.ellipsoid;
    let mut out = Vec::new();
    if e.is_sphere() {
        out.push((EARTH_RADIUS.to_string(), AttrValue::double(e.semi_major)));
    } else {
        out.push((SEMI_MAJOR_AXIS.to_string(), AttrValue::double(e.semi_major)));
        out.push((
            INVERSE_FLATTENING.to_string(),
            AttrValue::double(e.inv_flattening),
        ));
    }
    out.push((
        LONGITUDE_OF_PRIME_MERIDIAN.to_string(),
        AttrValue::double(geog.prime_meridian),
    ));
    out
}

/// Full attribute list of the grid-mapping variable for `srs`, and the
/// `grid_mapping_name` written.
pub fn grid_mapping_attrs(srs: &SpatialRef) -> (String, Vec<(String, AttrValue)>) {
    let Some(method) = srs.method() else {
        let mut out = vec![(
            GRID_MAPPING_NAME.to_string(),
            AttrValue::text(LATITUDE_LONGITUDE),
        )];
        out.extend(datum_attrs(srs.geog_cs()));
        return (LATITUDE_LONGITUDE.to_string(), out);
    };

    let Some(kind) = lookup_method(method) else {
        return generic_attrs(srs, method);
    };

    let mut out = vec![(GRID_MAPPING_NAME.to_string(), AttrValue::text(kind.cf_name))];
    let param = |name: &str| srs.parameter(name);
    let lat_origin = param(params::LATITUDE_OF_ORIGIN);
    let scale = param(params::SCALE_FACTOR);

    match kind.rule {
        SpecialRule::None | SpecialRule::Sweep => {}
        SpecialRule::Conic => {
            if method.eq_ignore_ascii_case(methods::LAMBERT_CONFORMAL_CONIC_2SP) {
                let sp1 = param(params::STANDARD_PARALLEL_1).unwrap_or(0.0);
                let sp2 = param(params::STANDARD_PARALLEL_2).unwrap_or(sp1);
                out.push((STANDARD_PARALLEL.to_string(), doubles(&[sp1, sp2])));
            } else {
                let sp = lat_origin.unwrap_or(0.0);
                out.push((STANDARD_PARALLEL.to_string(), doubles(&[sp])));
                out.push((
                    SCALE_FACTOR_AT_PROJECTION_ORIGIN.to_string(),
                    AttrValue::double(scale.unwrap_or(1.0)),
                ));
            }
        }
        SpecialRule::ParallelPair => {
            let sp1 = param(params::STANDARD_PARALLEL_1).unwrap_or(0.0);
            let sp2 = param(params::STANDARD_PARALLEL_2).unwrap_or(sp1);
            out.push((STANDARD_PARALLEL.to_string(), doubles(&[sp1, sp2])));
        }
        SpecialRule::SingleParallel => {
            let sp = param(params::STANDARD_PARALLEL_1).unwrap_or(0.0);
            out.push((STANDARD_PARALLEL.to_string(), AttrValue::double(sp)));
        }
        SpecialRule::Mercator => {
            if method.eq_ignore_ascii_case(methods::MERCATOR_2SP) {
                let sp = param(params::STANDARD_PARALLEL_1).unwrap_or(0.0);
                out.push((STANDARD_PARALLEL.to_string(), AttrValue::double(sp)));
            } else {
                out.push((
                    SCALE_FACTOR_AT_PROJECTION_ORIGIN.to_string(),
                    AttrValue::double(scale.unwrap_or(1.0)),
                ));
            }
        }
        SpecialRule::Polar => {
            let lat = lat_origin.unwrap_or(90.0);
            let k = scale.unwrap_or(1.0);
            if lat.abs() < 90.0 && k == 1.0 {
                out.push((STANDARD_PARALLEL.to_string(), AttrValue::double(lat)));
                out.push((
                    LATITUDE_OF_PROJECTION_ORIGIN.to_string(),
                    AttrValue::double(90.0_f64.copysign(lat)),
                ));
            } else {
                out.push((
                    LATITUDE_OF_PROJECTION_ORIGIN.to_string(),
                    AttrValue::double(lat),
                ));
                out.push((
                    SCALE_FACTOR_AT_PROJECTION_ORIGIN.to_string(),
                    AttrValue::double(k),
                ));
            }
        }
    }

    for m in kind.params {
        out.push((
            m.attr.to_string(),
            AttrValue::double(param(m.param).unwrap_or(m.default)),
        ));
    }

    if kind.rule == SpecialRule::Sweep {
        let axis = if srs
            .extension()
            .is_some_and(|e| e.split_whitespace().any(|t| t == SWEEP_X))
        {
            "x"
        } else {
            "y"
        };
        out.push((SWEEP_ANGLE_AXIS.to_string(), AttrValue::text(axis)));
    }

    out.extend(datum_attrs(srs.geog_cs()));
    (kind.cf_name.to_string(), out)
}

/// Best-effort attributes for a method absent from the table.
fn generic_attrs(srs: &SpatialRef, method: &str) -> (String, Vec<(String, AttrValue)>) {
    let name = method.to_ascii_lowercase();
    let mut out = vec![(GRID_MAPPING_NAME.to_string(), AttrValue::text(name.as_str()))];
    if let Some(p) = srs.projected_cs() {
        out.extend(
            p.parameters
                .iter()
                .map(|(n, v)| (n.clone(), AttrValue::double(*v))),
        );
    }
    out.extend(datum_attrs(srs.geog_cs()));
    (name, out)
}

fn doubles(values: &[f64]) -> AttrValue {
    AttrValue::doubles(values.to_vec())
}

fn set_param(parameters: &mut Vec<(String, f64)>, name: &str, value: f64) {
    match parameters.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = value,
        None => parameters.push((name.to_string(), value)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn source(pairs: Vec<(String, AttrValue)>) -> impl Fn(&str) -> Option<AttrValue> {
        let map: HashMap<String, AttrValue> = pairs.into_iter().collect();
        move |name: &str| map.get(name).cloned()
    }

    fn roundtrip(srs: &SpatialRef) -> SpatialRef {
        let (cf_name, attrs) = grid_mapping_attrs(srs);
        let src = source(attrs);
        let kind = lookup_cf(&cf_name).unwrap();
        let geog = geog_from_attrs(&src).unwrap();
        build_srs(kind, &src, geog)
    }

    #[test]
    fn test_lcc_two_parallels() {
        let src = source(vec![
            ("standard_parallel".into(), doubles(&[33.0, 45.0])),
            ("longitude_of_central_meridian".into(), AttrValue::double(-97.0)),
            ("latitude_of_projection_origin".into(), AttrValue::double(40.0)),
        ]);
        let srs = build_srs(lookup_cf("lambert_conformal_conic").unwrap(), &src, GeogCs::wgs84());
        assert_eq!(srs.method(), Some(methods::LAMBERT_CONFORMAL_CONIC_2SP));
        assert_eq!(srs.parameter(params::STANDARD_PARALLEL_2), Some(45.0));
        assert_eq!(srs.parameter(params::CENTRAL_MERIDIAN), Some(-97.0));
        assert_eq!(srs.parameter(params::FALSE_EASTING), Some(0.0));
    }

    #[test]
    fn test_lcc_single_parallel_fallback_attrs() {
        let src = source(vec![("standard_parallel_1".into(), AttrValue::double(25.0))]);
        let srs = build_srs(lookup_cf("lambert_conformal_conic").unwrap(), &src, GeogCs::wgs84());
        assert_eq!(srs.method(), Some(methods::LAMBERT_CONFORMAL_CONIC_1SP));
        assert_eq!(srs.parameter(params::LATITUDE_OF_ORIGIN), Some(25.0));
        assert_eq!(srs.parameter(params::SCALE_FACTOR), Some(1.0));
    }

    #[test]
    fn test_mercator_variants() {
        let kind = lookup_cf("mercator").unwrap();
        let src = source(vec![("standard_parallel".into(), AttrValue::double(20.0))]);
        assert_eq!(
            build_srs(kind, &src, GeogCs::wgs84()).method(),
            Some(methods::MERCATOR_2SP)
        );
        let src = source(vec![]);
        assert_eq!(
            build_srs(kind, &src, GeogCs::wgs84()).method(),
            Some(methods::MERCATOR_1SP)
        );
    }

    #[test]
    fn test_geostationary_sweep() {
        let src = source(vec![
            ("perspective_point_height".into(), AttrValue::double(35_786_023.0)),
            ("longitude_of_projection_origin".into(), AttrValue::double(-75.0)),
            ("sweep_angle_axis".into(), AttrValue::text("x")),
        ]);
        let srs = build_srs(lookup_cf("geostationary").unwrap(), &src, GeogCs::wgs84());
        assert_eq!(srs.extension(), Some("+sweep=x"));
        assert_eq!(srs.parameter(params::SATELLITE_HEIGHT), Some(35_786_023.0));
    }

    #[test]
    fn test_datum_from_attrs() {
        assert!(geog_from_attrs(&source(vec![])).is_none());
        let geog = geog_from_attrs(&source(vec![(
            EARTH_RADIUS.into(),
            AttrValue::double(6_371_229.0),
        )]))
        .unwrap();
        assert!(geog.ellipsoid.is_sphere());
        assert!(geog.is_datum_known());
    }

    #[test]
    fn test_table_roundtrip() {
        let cases = vec![
            SpatialRef::projected(
                GeogCs::wgs84(),
                methods::LAMBERT_CONFORMAL_CONIC_2SP,
                vec![
                    (params::LATITUDE_OF_ORIGIN.into(), 25.0),
                    (params::CENTRAL_MERIDIAN.into(), -95.0),
                    (params::STANDARD_PARALLEL_1.into(), 25.0),
                    (params::STANDARD_PARALLEL_2.into(), 35.0),
                    (params::FALSE_EASTING.into(), 0.0),
                    (params::FALSE_NORTHING.into(), 0.0),
                ],
            ),
            SpatialRef::projected(
                GeogCs::wgs84(),
                methods::TRANSVERSE_MERCATOR,
                vec![
                    (params::LATITUDE_OF_ORIGIN.into(), 0.0),
                    (params::CENTRAL_MERIDIAN.into(), 9.0),
                    (params::SCALE_FACTOR.into(), 0.9996),
                    (params::FALSE_EASTING.into(), 500_000.0),
                    (params::FALSE_NORTHING.into(), 0.0),
                ],
            ),
            SpatialRef::projected(
                GeogCs::wgs84(),
                methods::POLAR_STEREOGRAPHIC,
                vec![
                    (params::CENTRAL_MERIDIAN.into(), -45.0),
                    (params::LATITUDE_OF_ORIGIN.into(), 70.0),
                    (params::SCALE_FACTOR.into(), 1.0),
                    (params::FALSE_EASTING.into(), 0.0),
                    (params::FALSE_NORTHING.into(), 0.0),
                ],
            ),
        ];
        for srs in cases {
            assert!(roundtrip(&srs).is_same(&srs), "{:?}", srs.method());
        }
    }

    #[test]
    fn test_generic_fallback() {
        let srs = SpatialRef::projected(
            GeogCs::wgs84(),
            "Sinusoidal",
            vec![("central_meridian".into(), 10.0)],
        );
        assert!(!is_convention_projection(&srs));
        let (name, attrs) = grid_mapping_attrs(&srs);
        assert_eq!(name, "sinusoidal");
        assert!(attrs.iter().any(|(n, _)| n == "central_meridian"));
    }
}
