//! Engine status codes.
//!
//! Zero is success, 1..=100 are warnings (results exist but are suspect),
//! anything above 100 is fatal for the call that produced it.

use std::fmt;

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);
    pub const NEGATIVE_PRESSURE: StatusCode = StatusCode(6);
    pub const HYDRAULICS_NOT_OPEN: StatusCode = StatusCode(103);
    pub const UNSOLVABLE: StatusCode = StatusCode(110);
    pub const ILLEGAL_NUMERIC_VALUE: StatusCode = StatusCode(202);
    pub const UNDEFINED_NODE: StatusCode = StatusCode(203);
    pub const UNDEFINED_LINK: StatusCode = StatusCode(204);
    pub const UNDEFINED_PATTERN: StatusCode = StatusCode(205);
    pub const UNDEFINED_CURVE: StatusCode = StatusCode(206);
    pub const ILLEGAL_LINK_VALUE: StatusCode = StatusCode(211);
    pub const ILLEGAL_OPTION_VALUE: StatusCode = StatusCode(213);
    pub const DUPLICATE_ID: StatusCode = StatusCode(215);
    pub const SAME_END_NODES: StatusCode = StatusCode(222);
    pub const ILLEGAL_PARAMETER: StatusCode = StatusCode(251);
    pub const INVALID_ID: StatusCode = StatusCode(252);
    pub const NODE_HAS_LINKS: StatusCode = StatusCode(259);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn is_warning(self) -> bool {
        (1..=100).contains(&self.0)
    }

    pub fn is_fatal(self) -> bool {
        self.0 > 100
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "ok",
            6 => "negative pressures at demand nodes",
            1..=100 => "solver warning",
            103 => "hydraulic solver not opened",
            110 => "cannot solve network hydraulic equations",
            202 => "illegal numeric value",
            203 => "undefined node",
            204 => "undefined link",
            205 => "undefined time pattern",
            206 => "undefined curve",
            211 => "illegal link property value",
            213 => "illegal option value",
            215 => "duplicate ID",
            222 => "link has the same start and end node",
            251 => "illegal parameter code",
            252 => "invalid ID name",
            259 => "node still has links attached",
            _ => "engine error",
        }
    }

    /// Ok and warnings pass through, fatal codes become errors tagged with `op`.
    pub fn check(self, op: &'static str) -> EngineResult<StatusCode> {
        if self.is_fatal() {
            Err(EngineError::Status { code: self, op })
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}
