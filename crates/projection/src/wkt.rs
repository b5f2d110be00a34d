//! WKT1 reader and writer for [`SpatialRef`].
//!
//! Only the subset needed to carry a CRS through file attributes is
//! understood: `GEOGCS`, `PROJCS`, `DATUM`, `SPHEROID`, `PRIMEM`,
//! `PROJECTION`, `PARAMETER`, `UNIT` and `EXTENSION`. Other nodes
//! (`AUTHORITY`, `AXIS`, `TOWGS84`, ...) are parsed and ignored.

use crate::error::{ProjectionError, ProjectionResult};
use crate::srs::{Ellipsoid, GeogCs, LinearUnit, ProjectedCs, SpatialRef};

const DEGREE_TO_RADIAN: f64 = 0.0174532925199433;

pub(crate) fn write(srs: &SpatialRef) -> String {
    let geog = write_geogcs(srs.geog_cs());
    match srs.projected_cs() {
        None => geog,
        Some(p) => {
            let mut out = format!(
                "PROJCS[\"{}\",{},PROJECTION[\"{}\"]",
                escape(&p.name),
                geog,
                escape(&p.method)
            );
            for (name, value) in &p.parameters {
                out.push_str(&format!(",PARAMETER[\"{}\",{}]", escape(name), value));
            }
            out.push_str(&format!(
                ",UNIT[\"{}\",{}]",
                escape(&p.linear_unit.name),
                p.linear_unit.to_meters
            ));
            if let Some(ext) = &p.extension {
                out.push_str(&format!(",EXTENSION[\"PROJ4\",\"{}\"]", escape(ext)));
            }
            out.push(']');
            out
        }
    }
}

fn write_geogcs(g: &GeogCs) -> String {
    format!(
        "GEOGCS[\"{}\",DATUM[\"{}\",SPHEROID[\"{}\",{},{}]],PRIMEM[\"Greenwich\",{}],UNIT[\"degree\",{}]]",
        escape(&g.name),
        escape(&g.datum),
        escape(&g.ellipsoid.name),
        g.ellipsoid.semi_major,
        g.ellipsoid.inv_flattening,
        g.prime_meridian,
        DEGREE_TO_RADIAN
    )
}

fn escape(s: &str) -> String {
    s.replace('"', "\"\"")
}

/// A parsed WKT node: keyword plus ordered children.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    Node(Node),
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    keyword: String,
    children: Vec<Item>,
}

impl Node {
    fn child(&self, keyword: &str) -> Option<&Node> {
        self.children.iter().find_map(|c| match c {
            Item::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    fn children_named<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter_map(move |c| match c {
            Item::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    fn text(&self, index: usize) -> Option<&str> {
        match self.children.get(index) {
            Some(Item::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn number(&self, index: usize) -> Option<f64> {
        match self.children.get(index) {
            Some(Item::Number(v)) => Some(*v),
            _ => None,
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> ProjectionResult<()> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(ProjectionError::wkt(
                self.pos,
                format!("expected '{}', found '{}'", byte as char, b as char),
            )),
            None => Err(ProjectionError::wkt(
                self.pos,
                format!("expected '{}', found end of input", byte as char),
            )),
        }
    }

    fn identifier(&mut self) -> ProjectionResult<String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ProjectionError::wkt(self.pos, "expected keyword"));
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    /// A nested node, or a bare enumeration value such as `EAST`.
    fn keyword_item(&mut self) -> ProjectionResult<Item> {
        let keyword = self.identifier()?;
        match self.peek() {
            Some(b'[') | Some(b'(') => self.node_body(keyword).map(Item::Node),
            _ => Ok(Item::Text(keyword)),
        }
    }

    fn node(&mut self) -> ProjectionResult<Node> {
        let keyword = self.identifier()?;
        self.node_body(keyword)
    }

    fn node_body(&mut self, keyword: String) -> ProjectionResult<Node> {
        let close = match self.peek() {
            Some(b'[') => b']',
            Some(b'(') => b')',
            _ => return Err(ProjectionError::wkt(self.pos, "expected '[' after keyword")),
        };
        self.pos += 1;

        let mut children = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => children.push(Item::Text(self.string()?)),
                Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => {
                    children.push(Item::Number(self.number()?))
                }
                Some(b) if b.is_ascii_alphabetic() => children.push(self.keyword_item()?),
                Some(_) => return Err(ProjectionError::wkt(self.pos, "unexpected character")),
                None => return Err(ProjectionError::wkt(self.pos, "unterminated node")),
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(ProjectionError::wkt(self.pos, "expected ',' or closing bracket")),
            }
        }

        Ok(Node { keyword, children })
    }

    fn string(&mut self) -> ProjectionResult<String> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.src.get(self.pos) {
                Some(b'"') if self.src.get(self.pos + 1) == Some(&b'"') => {
                    out.push(b'"');
                    self.pos += 2;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b) => {
                    out.push(*b);
                    self.pos += 1;
                }
                None => return Err(ProjectionError::wkt(self.pos, "unterminated string")),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn number(&mut self) -> ProjectionResult<f64> {
        let start = self.pos;
        while self.pos < self.src.len()
            && matches!(self.src[self.pos], b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]);
        text.parse::<f64>()
            .map_err(|_| ProjectionError::wkt(start, format!("invalid number '{}'", text)))
    }
}

pub(crate) fn parse(text: &str) -> ProjectionResult<SpatialRef> {
    let mut parser = Parser::new(text);
    let root = parser.node()?;
    if parser.peek().is_some() {
        return Err(ProjectionError::wkt(parser.pos, "trailing characters"));
    }

    match root.keyword.to_ascii_uppercase().as_str() {
        "GEOGCS" => Ok(SpatialRef::geographic(read_geogcs(&root)?)),
        "PROJCS" => read_projcs(&root),
        other => Err(ProjectionError::wkt(
            0,
            format!("unsupported root node '{}'", other),
        )),
    }
}

fn read_geogcs(node: &Node) -> ProjectionResult<GeogCs> {
    let name = node.text(0).unwrap_or_default().to_string();
    let datum = node
        .child("DATUM")
        .ok_or_else(|| ProjectionError::Incomplete("GEOGCS without DATUM".to_string()))?;
    let spheroid = datum
        .child("SPHEROID")
        .ok_or_else(|| ProjectionError::Incomplete("DATUM without SPHEROID".to_string()))?;
    let semi_major = spheroid
        .number(1)
        .ok_or_else(|| {
            ProjectionError::Incomplete("SPHEROID without semi-major axis".to_string())
        })?;
    let inv_flattening = spheroid.number(2).unwrap_or(0.0);
    let prime_meridian = node
        .child("PRIMEM")
        .and_then(|p| p.number(1))
        .unwrap_or(0.0);

    Ok(GeogCs::new(
        name,
        datum.text(0).unwrap_or_default(),
        Ellipsoid::new(
            spheroid.text(0).unwrap_or_default(),
            semi_major,
            inv_flattening,
        ),
        prime_meridian,
    ))
}

fn read_projcs(node: &Node) -> ProjectionResult<SpatialRef> {
    let geog = node
        .child("GEOGCS")
        .ok_or_else(|| ProjectionError::Incomplete("PROJCS without GEOGCS".to_string()))
        .and_then(read_geogcs)?;
    let method = node
        .child("PROJECTION")
        .and_then(|p| p.text(0))
        .ok_or_else(|| ProjectionError::Incomplete("PROJCS without PROJECTION".to_string()))?;

    let parameters = node
        .children_named("PARAMETER")
        .filter_map(|p| Some((p.text(0)?.to_string(), p.number(1)?)))
        .collect();

    let linear_unit = node
        .child("UNIT")
        .and_then(|u| {
            Some(LinearUnit {
                name: u.text(0)?.to_string(),
                to_meters: u.number(1)?,
            })
        })
        .unwrap_or_else(LinearUnit::metre);

    let extension = node.child("EXTENSION").and_then(|e| e.text(1)).map(str::to_string);

    let mut srs = SpatialRef::projected(geog, method, parameters);
    if let Some(p) = srs.projected_cs_mut() {
        *p = ProjectedCs {
            name: node.text(0).unwrap_or_default().to_string(),
            method: method.to_string(),
            parameters: std::mem::take(&mut p.parameters),
            linear_unit,
            extension,
        };
    }
    Ok(srs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srs::{methods, params};

    #[test]
    fn test_geographic_roundtrip() {
        let srs = SpatialRef::wgs84();
        let text = srs.to_wkt();
        assert!(text.starts_with("GEOGCS[\"WGS 84\""));
        assert_eq!(SpatialRef::from_wkt(&text).unwrap(), srs);
    }

    #[test]
    fn test_projected_roundtrip() {
        let mut srs = SpatialRef::projected(
            GeogCs::wgs84(),
            methods::GEOSTATIONARY_SATELLITE,
            vec![
                (params::CENTRAL_MERIDIAN.to_string(), -75.0),
                (params::SATELLITE_HEIGHT.to_string(), 35786023.0),
            ],
        );
        srs.set_extension("+sweep=x");
        let parsed = SpatialRef::from_wkt(&srs.to_wkt()).unwrap();
        assert_eq!(parsed, srs);
        assert_eq!(parsed.extension(), Some("+sweep=x"));
    }

    #[test]
    fn test_parse_foreign_wkt_ignores_authority() {
        let text = r#"PROJCS["WGS 84 / UTM zone 31N",
            GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],
            PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],
            PROJECTION["Transverse_Mercator"],
            PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",3],
            PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],
            PARAMETER["false_northing",0],UNIT["metre",1],AXIS["Easting",EAST],AUTHORITY["EPSG","32631"]]"#;
        let srs = SpatialRef::from_wkt(text).unwrap();
        assert_eq!(srs.method(), Some(methods::TRANSVERSE_MERCATOR));
        assert_eq!(srs.parameter(params::CENTRAL_MERIDIAN), Some(3.0));
        assert_eq!(srs.geog_cs().datum, "WGS_1984");
    }

    #[test]
    fn test_parse_errors() {
        assert!(SpatialRef::from_wkt("").is_err());
        assert!(SpatialRef::from_wkt("GEOGCS[\"x\"").is_err());
        assert!(SpatialRef::from_wkt("LOCAL_CS[\"x\"]").is_err());
        assert!(SpatialRef::from_wkt("GEOGCS[\"x\"]").is_err());
    }

    #[test]
    fn test_quoted_names() {
        let mut srs = SpatialRef::wgs84();
        let mut geog = srs.geog_cs().clone();
        geog.name = "say \"hi\"".to_string();
        srs.set_geog_cs(geog);
        let parsed = SpatialRef::from_wkt(&srs.to_wkt()).unwrap();
        assert_eq!(parsed.geog_cs().name, "say \"hi\"");
    }
}
