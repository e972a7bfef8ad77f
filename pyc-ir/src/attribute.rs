//! Typed key/value attributes attached to ops, functions, and modules.

use linked_hash_map::LinkedHashMap;
use pyc_utils::Id;

/// Reserved attribute keys.
pub mod reserved {
    /// Module attribute naming the synthesizable root.
    pub const TOP: &str = "pyc.top";
    /// Symbol reference from an `instance` op to its callee.
    pub const CALLEE: &str = "callee";
    pub const REG_COUNT: &str = "pyc.stats.reg_count";
    pub const REG_BITS: &str = "pyc.stats.reg_bits";
    pub const MEM_COUNT: &str = "pyc.stats.mem_count";
    pub const MEM_BITS: &str = "pyc.stats.mem_bits";
    pub const DEPTH_MAX: &str = "pyc.logic_depth.max";
    pub const DEPTH_WNS: &str = "pyc.logic_depth.wns";
    pub const DEPTH_TNS: &str = "pyc.logic_depth.tns";
    /// FuseComb block membership of an op.
    pub const COMB_BLOCK: &str = "pyc.comb_block";
}

/// An attribute value: an integer or an interned symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttrValue {
    Int(i64),
    Sym(Id),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Sym(..) => None,
        }
    }

    pub fn as_sym(&self) -> Option<Id> {
        match self {
            AttrValue::Sym(s) => Some(*s),
            AttrValue::Int(..) => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Sym(s) => write!(f, "@{s}"),
        }
    }
}

/// Attribute map with deterministic iteration order.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    attrs: LinkedHashMap<Id, AttrValue>,
}

impl Attributes {
    pub fn insert<K: Into<Id>>(&mut self, key: K, val: AttrValue) {
        self.attrs.insert(key.into(), val);
    }

    pub fn insert_int<K: Into<Id>>(&mut self, key: K, val: i64) {
        self.insert(key, AttrValue::Int(val));
    }

    pub fn insert_sym<K: Into<Id>>(&mut self, key: K, val: Id) {
        self.insert(key, AttrValue::Sym(val));
    }

    pub fn get<K: Into<Id>>(&self, key: K) -> Option<&AttrValue> {
        self.attrs.get(&key.into())
    }

    pub fn get_int<K: Into<Id>>(&self, key: K) -> Option<i64> {
        self.get(key).and_then(AttrValue::as_int)
    }

    pub fn get_sym<K: Into<Id>>(&self, key: K) -> Option<Id> {
        self.get(key).and_then(AttrValue::as_sym)
    }

    pub fn has<K: Into<Id>>(&self, key: K) -> bool {
        self.attrs.contains_key(&key.into())
    }

    pub fn remove<K: Into<Id>>(&mut self, key: K) {
        self.attrs.remove(&key.into());
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &AttrValue)> {
        self.attrs.iter()
    }
}
