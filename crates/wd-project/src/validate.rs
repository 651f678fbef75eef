//! Network description validation.

use crate::schema::{LATEST_VERSION, LinkDef, LinkKindDef, NetworkDef, NodeDef, NodeKindDef};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_network(network: &NetworkDef) -> Result<(), ValidationError> {
    if network.version == 0 || network.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: network.version,
        });
    }

    let opts = &network.options;
    for (field, value) in [
        ("hydraulic_step_s", opts.hydraulic_step_s),
        ("pattern_step_s", opts.pattern_step_s),
        ("report_step_s", opts.report_step_s),
    ] {
        if value == 0 {
            return Err(invalid(field, value, "must be positive"));
        }
    }

    let mut pattern_ids = HashSet::new();
    for pattern in &network.patterns {
        if !pattern_ids.insert(pattern.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: pattern.id.clone(),
                context: "patterns".to_string(),
            });
        }
        if pattern.multipliers.is_empty() {
            return Err(invalid(
                &format!("pattern '{}'", pattern.id),
                "[]",
                "needs at least one multiplier",
            ));
        }
    }

    let mut curve_ids = HashSet::new();
    for curve in &network.curves {
        if !curve_ids.insert(curve.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: curve.id.clone(),
                context: "curves".to_string(),
            });
        }
    }

    let mut node_ids = HashSet::new();
    for node in &network.nodes {
        if !node_ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: node.id.clone(),
                context: "nodes".to_string(),
            });
        }
        validate_node(node, &pattern_ids)?;
    }

    let mut link_ids = HashSet::new();
    for link in &network.links {
        if !link_ids.insert(link.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: link.id.clone(),
                context: "links".to_string(),
            });
        }
        validate_link(link, &node_ids, &pattern_ids)?;
    }

    Ok(())
}

fn validate_node(node: &NodeDef, patterns: &HashSet<&str>) -> Result<(), ValidationError> {
    if !node.elevation.is_finite() {
        return Err(invalid(&format!("node '{}' elevation", node.id), node.elevation, "not finite"));
    }
    match &node.kind {
        NodeKindDef::Junction { pattern, .. } | NodeKindDef::Reservoir { pattern } => {
            check_pattern(pattern.as_deref(), patterns, &node.id)
        }
        NodeKindDef::Tank {
            initial_level,
            min_level,
            max_level,
            diameter,
            ..
        } => {
            if *diameter <= 0.0 {
                return Err(invalid(
                    &format!("tank '{}' diameter", node.id),
                    diameter,
                    "must be positive",
                ));
            }
            if !(min_level <= initial_level && initial_level <= max_level) {
                return Err(invalid(
                    &format!("tank '{}' initial_level", node.id),
                    initial_level,
                    "must lie between min_level and max_level",
                ));
            }
            Ok(())
        }
    }
}

fn validate_link(
    link: &LinkDef,
    nodes: &HashSet<&str>,
    patterns: &HashSet<&str>,
) -> Result<(), ValidationError> {
    for end in [&link.from, &link.to] {
        if !nodes.contains(end.as_str()) {
            return Err(ValidationError::MissingReference {
                id: end.clone(),
                context: format!("link '{}' endpoint", link.id),
            });
        }
    }
    if link.from == link.to {
        return Err(invalid(
            &format!("link '{}' endpoints", link.id),
            &link.from,
            "start and end node must differ",
        ));
    }
    match &link.kind {
        LinkKindDef::Pipe {
            length,
            diameter,
            roughness,
        } => {
            for (field, value) in [("length", length), ("diameter", diameter), ("roughness", roughness)] {
                if !(*value > 0.0) {
                    return Err(invalid(
                        &format!("pipe '{}' {}", link.id, field),
                        value,
                        "must be positive",
                    ));
                }
            }
            Ok(())
        }
        LinkKindDef::Pump { pattern, .. } => check_pattern(pattern.as_deref(), patterns, &link.id),
    }
}

fn check_pattern(
    pattern: Option<&str>,
    patterns: &HashSet<&str>,
    owner: &str,
) -> Result<(), ValidationError> {
    match pattern {
        Some(p) if !patterns.contains(p) => Err(ValidationError::MissingReference {
            id: p.to_string(),
            context: format!("pattern of '{}'", owner),
        }),
        _ => Ok(()),
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PatternDef;

    fn junction(id: &str) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            elevation: 10.0,
            kind: NodeKindDef::Junction {
                base_demand: 1.0,
                pattern: None,
            },
        }
    }

    fn pipe(id: &str, from: &str, to: &str) -> LinkDef {
        LinkDef {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            status: Default::default(),
            kind: LinkKindDef::Pipe {
                length: 100.0,
                diameter: 200.0,
                roughness: 120.0,
            },
        }
    }

    #[test]
    fn accepts_minimal_network() {
        let mut net = NetworkDef::new("ok");
        net.nodes = vec![junction("A"), junction("B")];
        net.links = vec![pipe("1", "A", "B")];
        validate_network(&net).unwrap();
    }

    #[test]
    fn rejects_duplicate_node() {
        let mut net = NetworkDef::new("dup");
        net.nodes = vec![junction("A"), junction("A")];
        assert!(matches!(
            validate_network(&net),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn rejects_dangling_endpoint() {
        let mut net = NetworkDef::new("dangling");
        net.nodes = vec![junction("A")];
        net.links = vec![pipe("1", "A", "Z")];
        assert!(matches!(
            validate_network(&net),
            Err(ValidationError::MissingReference { .. })
        ));
    }

    #[test]
    fn rejects_unknown_pattern() {
        let mut net = NetworkDef::new("pattern");
        let mut j = junction("A");
        j.kind = NodeKindDef::Junction {
            base_demand: 1.0,
            pattern: Some("DEM".into()),
        };
        net.nodes = vec![j];
        assert!(validate_network(&net).is_err());

        net.patterns = vec![PatternDef {
            id: "DEM".into(),
            multipliers: vec![1.0],
        }];
        validate_network(&net).unwrap();
    }

    #[test]
    fn rejects_non_positive_pipe_diameter() {
        let mut net = NetworkDef::new("diam");
        net.nodes = vec![junction("A"), junction("B")];
        let mut p = pipe("1", "A", "B");
        p.kind = LinkKindDef::Pipe {
            length: 1.0,
            diameter: 0.0,
            roughness: 100.0,
        };
        net.links = vec![p];
        assert!(matches!(
            validate_network(&net),
            Err(ValidationError::InvalidValue { .. })
        ));
    }
}
