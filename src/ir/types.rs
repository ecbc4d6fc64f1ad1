//! The abstract JS type lattice (spec §3, §4.3): a `(definite, possible)`
//! pair of bitmasks plus an optional extension.

use std::collections::BTreeSet;

use bitflags::bitflags;
use rand::seq::SliceRandom;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeMask: u32 {
        const UNDEFINED   = 1 << 0;
        const NULL        = 1 << 1;
        const BOOLEAN     = 1 << 2;
        const INTEGER     = 1 << 3;
        const BIGINT      = 1 << 4;
        const FLOAT       = 1 << 5;
        const STRING      = 1 << 6;
        const REGEXP      = 1 << 7;
        const OBJECT      = 1 << 8;
        const FUNCTION    = 1 << 9;
        const CONSTRUCTOR = 1 << 10;
        const ITERABLE    = 1 << 11;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub num_parameters: usize,
    pub has_rest_parameter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeExtension {
    pub properties: BTreeSet<String>,
    pub methods: BTreeSet<String>,
    pub group: Option<String>,
    pub signature: Option<Signature>,
}

/// `(definite, possible)`: `definite ⊆ possible`. `.anything()` is
/// `(∅, all)` — the variable may be anything, nothing is guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct JsType {
    definite: TypeMask,
    possible: TypeMask,
    pub ext: Option<Box<TypeExtension>>,
}

impl JsType {
    pub fn new(definite: TypeMask, possible: TypeMask) -> Self {
        debug_assert!(possible.contains(definite), "definite must be a subset of possible");
        JsType { definite, possible, ext: None }
    }

    pub fn anything() -> Self {
        JsType::new(TypeMask::empty(), TypeMask::all())
    }

    pub fn nothing() -> Self {
        JsType::new(TypeMask::empty(), TypeMask::empty())
    }

    pub fn exact(mask: TypeMask) -> Self {
        JsType::new(mask, mask)
    }

    pub fn integer() -> Self {
        JsType::exact(TypeMask::INTEGER)
    }
    pub fn float() -> Self {
        JsType::exact(TypeMask::FLOAT)
    }
    pub fn string() -> Self {
        JsType::exact(TypeMask::STRING)
    }
    pub fn boolean() -> Self {
        JsType::exact(TypeMask::BOOLEAN)
    }
    pub fn bigint() -> Self {
        JsType::exact(TypeMask::BIGINT)
    }
    pub fn undefined() -> Self {
        JsType::exact(TypeMask::UNDEFINED)
    }
    pub fn object() -> Self {
        JsType::exact(TypeMask::OBJECT)
    }
    pub fn function() -> Self {
        JsType::exact(TypeMask::FUNCTION)
    }

    pub fn object_with(properties: impl IntoIterator<Item = String>) -> Self {
        let mut t = JsType::object();
        t.ext = Some(Box::new(TypeExtension { properties: properties.into_iter().collect(), ..Default::default() }));
        t
    }

    pub fn definite(&self) -> TypeMask {
        self.definite
    }
    pub fn possible(&self) -> TypeMask {
        self.possible
    }

    pub fn union(&self, other: &JsType) -> JsType {
        let ext = match (&self.ext, &other.ext) {
            (Some(a), Some(b)) => Some(Box::new(TypeExtension {
                properties: a.properties.union(&b.properties).cloned().collect(),
                methods: a.methods.union(&b.methods).cloned().collect(),
                group: if a.group == b.group { a.group.clone() } else { None },
                signature: if a.signature == b.signature { a.signature.clone() } else { None },
            })),
            _ => None,
        };
        JsType { definite: self.definite & other.definite, possible: self.possible | other.possible, ext }
    }

    pub fn intersection(&self, other: &JsType) -> JsType {
        let ext = match (&self.ext, &other.ext) {
            (Some(a), Some(b)) => Some(Box::new(TypeExtension {
                properties: a.properties.intersection(&b.properties).cloned().collect(),
                methods: a.methods.intersection(&b.methods).cloned().collect(),
                group: if a.group == b.group { a.group.clone() } else { None },
                signature: if a.signature == b.signature { a.signature.clone() } else { None },
            })),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        JsType { definite: self.definite & other.definite, possible: self.possible & other.possible, ext }
    }

    pub fn generalize(&self) -> JsType {
        JsType { definite: self.definite, possible: self.possible, ext: None }
    }

    /// Subtype = bit-containment: every kind `self` may be, `other` may
    /// also be.
    pub fn is_subtype_of(&self, other: &JsType) -> bool {
        other.possible.contains(self.possible)
    }

    /// "Usable as T": `definite` contains T's mask.
    pub fn is_usable_as(&self, t: &JsType) -> bool {
        self.definite.contains(t.definite) && !t.definite.is_empty()
    }

    /// "May be T": `possible` contains T's mask.
    pub fn may_be(&self, t: &JsType) -> bool {
        self.possible.intersects(t.possible)
    }

    pub fn random_property(&self, rng: &mut dyn rand::RngCore) -> Option<String> {
        self.ext.as_ref().and_then(|e| e.properties.iter().collect::<Vec<_>>().choose(rng).map(|s| s.to_string()))
    }

    pub fn random_method(&self, rng: &mut dyn rand::RngCore) -> Option<String> {
        self.ext.as_ref().and_then(|e| e.methods.iter().collect::<Vec<_>>().choose(rng).map(|s| s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anything_contains_every_possible_kind() {
        let t = JsType::anything();
        assert!(t.possible().contains(TypeMask::INTEGER));
        assert!(t.definite().is_empty());
    }

    #[test]
    fn union_widens_possible_and_narrows_definite() {
        let int = JsType::integer();
        let string = JsType::string();
        let u = int.union(&string);
        assert!(u.possible().contains(TypeMask::INTEGER | TypeMask::STRING));
        assert!(u.definite().is_empty());
    }

    #[test]
    fn usable_as_requires_definite_containment() {
        let int = JsType::integer();
        assert!(int.is_usable_as(&JsType::integer()));
        assert!(!int.is_usable_as(&JsType::string()));
    }

    #[test]
    fn anything_is_usable_as_nothing_specific() {
        let anything = JsType::anything();
        assert!(!anything.is_usable_as(&JsType::integer()));
        assert!(anything.may_be(&JsType::integer()));
    }

    #[test]
    fn generalize_drops_extension() {
        let obj = JsType::object_with(vec!["len".to_string()]);
        assert!(obj.ext.is_some());
        assert!(obj.generalize().ext.is_none());
    }
}
