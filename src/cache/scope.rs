use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Conjunto de niveles de caché habilitados.
///
/// Cada tabla de proveedor tiene un bit. Los conjuntos se combinan con `|` y
/// se comparan con [`CacheScope::is_subset_of`]: un nivel puede habilitar la
/// tabla de YouTube y dejar la de Spotify apagada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheScope(u8);

impl CacheScope {
    pub const NONE: CacheScope = CacheScope(0);
    pub const LAVALINK: CacheScope = CacheScope(0b001);
    pub const YOUTUBE: CacheScope = CacheScope(0b010);
    pub const SPOTIFY: CacheScope = CacheScope(0b100);
    pub const ALL: CacheScope = CacheScope(0b111);

    /// Construye un scope desde bits crudos, descartando lo que quede fuera de [`CacheScope::ALL`].
    pub fn from_bits(bits: u8) -> Self {
        CacheScope(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_subset_of(self, other: CacheScope) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn contains(self, other: CacheScope) -> bool {
        other.is_subset_of(self)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn without(self, other: CacheScope) -> Self {
        CacheScope(self.0 & !other.0)
    }
}

/// Si el nivel `scope` está activo con el `level` configurado.
pub fn enabled(scope: CacheScope, level: CacheScope) -> bool {
    scope.is_subset_of(level)
}

impl BitOr for CacheScope {
    type Output = CacheScope;

    fn bitor(self, rhs: Self) -> Self::Output {
        CacheScope(self.0 | rhs.0)
    }
}

impl BitOrAssign for CacheScope {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = [
            (CacheScope::SPOTIFY, "spotify"),
            (CacheScope::YOUTUBE, "youtube"),
            (CacheScope::LAVALINK, "lavalink"),
        ]
        .iter()
        .filter(|(scope, _)| self.contains(*scope))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "{}", names.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLES: [CacheScope; 3] = [CacheScope::SPOTIFY, CacheScope::YOUTUBE, CacheScope::LAVALINK];

    #[test]
    fn subset_matches_bitwise_containment() {
        for a in 0..=7u8 {
            for b in 0..=7u8 {
                let expected = a & b == a;
                assert_eq!(
                    CacheScope::from_bits(a).is_subset_of(CacheScope::from_bits(b)),
                    expected,
                    "{a:03b} ⊆ {b:03b}"
                );
            }
        }
    }

    #[test]
    fn none_is_subset_of_every_level() {
        for bits in 0..=7u8 {
            assert!(enabled(CacheScope::NONE, CacheScope::from_bits(bits)));
        }
    }

    #[test]
    fn all_contains_every_scope() {
        for scope in SINGLES {
            assert!(CacheScope::ALL.contains(scope));
            assert!(enabled(scope, CacheScope::ALL));
        }
        assert_eq!(
            CacheScope::SPOTIFY | CacheScope::YOUTUBE | CacheScope::LAVALINK,
            CacheScope::ALL
        );
    }

    #[test]
    fn tiers_toggle_independently() {
        let level = CacheScope::ALL.without(CacheScope::SPOTIFY);
        assert!(!enabled(CacheScope::SPOTIFY, level));
        assert!(enabled(CacheScope::YOUTUBE, level));
        assert!(enabled(CacheScope::LAVALINK, level));
        assert_eq!(level.to_string(), "youtube+lavalink");
        assert_eq!(CacheScope::from_bits(0xff), CacheScope::ALL);
    }
}
