//! Recognition of longitude and latitude variables.

use crate::attributes::text_attr;
use crate::store::{ArrayStore, AttrOwner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Longitude,
    Latitude,
}

impl Axis {
    fn standard_name(self) -> &'static str {
        match self {
            Axis::Longitude => "longitude",
            Axis::Latitude => "latitude",
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Axis::Longitude => &["lon", "longitude"],
            Axis::Latitude => &["lat", "latitude"],
        }
    }

    fn units(self) -> &'static [&'static str] {
        match self {
            Axis::Longitude => &[
                "degrees_east",
                "degree_east",
                "degrees_e",
                "degree_e",
                "degreese",
                "degreee",
            ],
            Axis::Latitude => &[
                "degrees_north",
                "degree_north",
                "degrees_n",
                "degree_n",
                "degreesn",
                "degreen",
            ],
        }
    }

    fn cf_axis(self) -> &'static str {
        match self {
            Axis::Longitude => "x",
            Axis::Latitude => "y",
        }
    }
}

/// Whether a dimension or variable name alone suggests `axis`.
pub fn name_matches(name: &str, axis: Axis) -> bool {
    axis.names().contains(&name.to_ascii_lowercase().as_str())
}

/// Whether variable `var` holds values along `axis`.
pub fn is_axis_variable(store: &dyn ArrayStore, var: usize, axis: Axis) -> bool {
    let attr = |name: &str| {
        text_attr(store, AttrOwner::Var(var), name).map(|s| s.trim().to_ascii_lowercase())
    };

    if attr("standard_name").as_deref() == Some(axis.standard_name()) {
        return true;
    }

    let units = attr("units");
    if let Some(u) = units.as_deref() {
        if axis.units().contains(&u) {
            return true;
        }
    }
    let degrees = units.as_deref().map(|u| u.starts_with("degree"));

    let named = store
        .variable(var)
        .map(|info| name_matches(&info.name, axis))
        .unwrap_or(false)
        || attr("long_name").is_some_and(|l| axis.names().contains(&l.as_str()));
    if named && degrees.unwrap_or(true) {
        return true;
    }

    attr("axis").as_deref() == Some(axis.cf_axis()) && degrees == Some(true)
}

pub fn is_longitude(store: &dyn ArrayStore, var: usize) -> bool {
    is_axis_variable(store, var, Axis::Longitude)
}

pub fn is_latitude(store: &dyn ArrayStore, var: usize) -> bool {
    is_axis_variable(store, var, Axis::Latitude)
}

/// Whether dimension `dim_name` is a longitude axis, by its coordinate
/// variable when there is one, else by name.
pub fn is_longitude_dim(store: &dyn ArrayStore, dim_name: &str) -> bool {
    match store.var_id(dim_name) {
        Some(var) => is_longitude(store, var),
        None => name_matches(dim_name, Axis::Longitude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Format, MemoryStore, NcType};

    fn store_with(name: &str, attrs: &[(&str, &str)]) -> (MemoryStore, usize) {
        let mut store = MemoryStore::create("h.nc", Format::Nc);
        let d = store.def_dim("n", 3).unwrap();
        let v = store.def_var(name, NcType::Double, &[d]).unwrap();
        for (k, val) in attrs {
            store.put_attr(AttrOwner::Var(v), k, (*val).into()).unwrap();
        }
        (store, v)
    }

    #[test]
    fn test_standard_name() {
        let (store, v) = store_with("xc", &[("standard_name", "longitude")]);
        assert!(is_longitude(&store, v));
        assert!(!is_latitude(&store, v));
    }

    #[test]
    fn test_units_family() {
        let (store, v) = store_with("yc", &[("units", "degrees_north")]);
        assert!(is_latitude(&store, v));
        let (store, v) = store_with("yc", &[("units", "degree_N")]);
        assert!(is_latitude(&store, v));
    }

    #[test]
    fn test_name_requires_degree_units_when_present() {
        let (store, v) = store_with("lon", &[]);
        assert!(is_longitude(&store, v));
        let (store, v) = store_with("lon", &[("units", "m")]);
        assert!(!is_longitude(&store, v));
    }

    #[test]
    fn test_axis_with_degrees() {
        let (store, v) = store_with("c", &[("axis", "X"), ("units", "degrees")]);
        assert!(is_longitude(&store, v));
        let (store, v) = store_with("c", &[("axis", "X"), ("units", "m")]);
        assert!(!is_longitude(&store, v));
    }

    #[test]
    fn test_dimension_without_variable() {
        let store = MemoryStore::create("h.nc", Format::Nc);
        assert!(is_longitude_dim(&store, "Longitude"));
        assert!(!is_longitude_dim(&store, "y"));
    }
}
