/// Periodic table data for elements 1–118.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Element {
    H = 1,
    He = 2,
    Li = 3,
    Be = 4,
    B = 5,
    C = 6,
    N = 7,
    O = 8,
    F = 9,
    Ne = 10,
    Na = 11,
    Mg = 12,
    Al = 13,
    Si = 14,
    P = 15,
    S = 16,
    Cl = 17,
    Ar = 18,
    K = 19,
    Ca = 20,
    Sc = 21,
    Ti = 22,
    V = 23,
    Cr = 24,
    Mn = 25,
    Fe = 26,
    Co = 27,
    Ni = 28,
    Cu = 29,
    Zn = 30,
    Ga = 31,
    Ge = 32,
    As = 33,
    Se = 34,
    Br = 35,
    Kr = 36,
    Rb = 37,
    Sr = 38,
    Y = 39,
    Zr = 40,
    Nb = 41,
    Mo = 42,
    Tc = 43,
    Ru = 44,
    Rh = 45,
    Pd = 46,
    Ag = 47,
    Cd = 48,
    In = 49,
    Sn = 50,
    Sb = 51,
    Te = 52,
    I = 53,
    Xe = 54,
    Cs = 55,
    Ba = 56,
    La = 57,
    Ce = 58,
    Pr = 59,
    Nd = 60,
    Pm = 61,
    Sm = 62,
    Eu = 63,
    Gd = 64,
    Tb = 65,
    Dy = 66,
    Ho = 67,
    Er = 68,
    Tm = 69,
    Yb = 70,
    Lu = 71,
    Hf = 72,
    Ta = 73,
    W = 74,
    Re = 75,
    Os = 76,
    Ir = 77,
    Pt = 78,
    Au = 79,
    Hg = 80,
    Tl = 81,
    Pb = 82,
    Bi = 83,
    Po = 84,
    At = 85,
    Rn = 86,
    Fr = 87,
    Ra = 88,
    Ac = 89,
    Th = 90,
    Pa = 91,
    U = 92,
    Np = 93,
    Pu = 94,
    Am = 95,
    Cm = 96,
    Bk = 97,
    Cf = 98,
    Es = 99,
    Fm = 100,
    Md = 101,
    No = 102,
    Lr = 103,
    Rf = 104,
    Db = 105,
    Sg = 106,
    Bh = 107,
    Hs = 108,
    Mt = 109,
    Ds = 110,
    Rg = 111,
    Cn = 112,
    Nh = 113,
    Fl = 114,
    Mc = 115,
    Lv = 116,
    Ts = 117,
    Og = 118,
}

impl Element {
    pub fn from_atomic_num(n: u8) -> Option<Element> {
        if (1..=118).contains(&n) {
            // SAFETY: Element is repr(u8) with variants 1..=118, and we checked bounds.
            Some(unsafe { std::mem::transmute::<u8, Element>(n) })
        } else {
            None
        }
    }

    pub fn from_symbol(s: &str) -> Option<Element> {
        SYMBOLS
            .iter()
            .position(|&sym| sym == s)
            .and_then(|i| Element::from_atomic_num(i as u8 + 1))
    }

    pub fn atomic_num(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self as usize - 1]
    }

    /// Allowed valences at formal charge zero. Empty for elements with no
    /// standard covalent valence (noble gases, metals).
    pub fn default_valences(self) -> &'static [u8] {
        match self {
            Element::H => &[1],
            Element::B => &[3],
            Element::C => &[4],
            Element::N => &[3, 5],
            Element::O => &[2],
            Element::F | Element::Cl | Element::Br | Element::At => &[1],
            Element::Si | Element::Ge => &[4],
            Element::P | Element::As | Element::Sb => &[3, 5],
            Element::S | Element::Se | Element::Te => &[2, 4, 6],
            Element::I => &[1, 3, 5, 7],
            _ => &[],
        }
    }

    /// The element-specific valence-charge equation: the lowest standard
    /// valence at the given formal charge, or `None` if the element has no
    /// standard covalent valence at that charge.
    ///
    /// Cationic heteroatoms gain a bonding slot and anionic ones lose one
    /// (N⁺ is tetravalent, O⁻ monovalent); carbon loses a slot in either
    /// direction.
    pub fn standard_valence(self, charge: i8) -> Option<u8> {
        let base = i16::from(*self.default_valences().first()?);
        let charge = i16::from(charge);
        let v = match self {
            Element::H | Element::C | Element::Si | Element::Ge => base - charge.abs(),
            Element::B => base + charge,
            _ if self.is_pnictogen() || self.is_chalcogen() || self.is_halogen() => base + charge,
            _ => base,
        };
        u8::try_from(v).ok()
    }

    /// Whether `total` is an allowed valence for this element at the given
    /// charge, testing every entry of the default valence list under the
    /// same charge arithmetic as [`standard_valence`](Self::standard_valence)
    /// (so hypervalent states like P(V) or I(III) pass).
    pub fn valence_allowed(self, charge: i8, total: u8) -> bool {
        let charge = i16::from(charge);
        self.default_valences().iter().any(|&base| {
            let base = i16::from(base);
            let v = match self {
                Element::H | Element::C | Element::Si | Element::Ge => base - charge.abs(),
                Element::B => base + charge,
                _ if self.is_pnictogen() || self.is_chalcogen() || self.is_halogen() => {
                    base + charge
                }
                _ => base,
            };
            v == i16::from(total)
        })
    }

    pub fn is_pnictogen(self) -> bool {
        matches!(
            self,
            Element::N | Element::P | Element::As | Element::Sb | Element::Bi
        )
    }

    pub fn is_chalcogen(self) -> bool {
        matches!(
            self,
            Element::O | Element::S | Element::Se | Element::Te | Element::Po
        )
    }

    pub fn is_halogen(self) -> bool {
        matches!(
            self,
            Element::F | Element::Cl | Element::Br | Element::I | Element::At
        )
    }

    /// Electronegative acceptor set used by salt disconnection: groups 15–17.
    pub fn is_electronegative(self) -> bool {
        self.is_pnictogen() || self.is_chalcogen() || self.is_halogen()
    }

    /// Periodic metal classification: everything outside the nonmetal /
    /// metalloid / noble-gas block.
    pub fn is_metal(self) -> bool {
        !matches!(
            self,
            Element::H
                | Element::He
                | Element::B
                | Element::C
                | Element::N
                | Element::O
                | Element::F
                | Element::Ne
                | Element::Si
                | Element::P
                | Element::S
                | Element::Cl
                | Element::Ar
                | Element::As
                | Element::Se
                | Element::Br
                | Element::Kr
                | Element::Te
                | Element::I
                | Element::Xe
                | Element::At
                | Element::Rn
                | Element::Og
        )
    }

    /// Recognized oxidation states for main-group metals; empty for
    /// transition metals and elements with no single standard set.
    pub fn oxidation_states(self) -> &'static [i8] {
        match self {
            Element::Li | Element::Na | Element::K | Element::Rb | Element::Cs | Element::Fr => {
                &[1]
            }
            Element::Be
            | Element::Mg
            | Element::Ca
            | Element::Sr
            | Element::Ba
            | Element::Ra
            | Element::Zn
            | Element::Cd => &[2],
            Element::Al | Element::Ga | Element::In => &[3],
            Element::Sn | Element::Pb => &[2, 4],
            Element::Tl => &[1, 3],
            Element::Bi => &[3],
            _ => &[],
        }
    }
}

static SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_atomic_num() {
        for n in 1..=118u8 {
            let el = Element::from_atomic_num(n).unwrap();
            assert_eq!(el.atomic_num(), n);
        }
        assert_eq!(Element::from_atomic_num(0), None);
        assert_eq!(Element::from_atomic_num(119), None);
    }

    #[test]
    fn symbol_lookup() {
        assert_eq!(Element::from_symbol("C"), Some(Element::C));
        assert_eq!(Element::from_symbol("Cl"), Some(Element::Cl));
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::Fe.symbol(), "Fe");
    }

    #[test]
    fn standard_valence_charge_arithmetic() {
        assert_eq!(Element::N.standard_valence(0), Some(3));
        assert_eq!(Element::N.standard_valence(1), Some(4));
        assert_eq!(Element::N.standard_valence(-1), Some(2));
        assert_eq!(Element::O.standard_valence(0), Some(2));
        assert_eq!(Element::O.standard_valence(-1), Some(1));
        assert_eq!(Element::O.standard_valence(1), Some(3));
        assert_eq!(Element::C.standard_valence(0), Some(4));
        assert_eq!(Element::C.standard_valence(1), Some(3));
        assert_eq!(Element::C.standard_valence(-1), Some(3));
        assert_eq!(Element::Cl.standard_valence(-1), Some(0));
        assert_eq!(Element::Fe.standard_valence(0), None);
    }

    #[test]
    fn metal_classification() {
        assert!(Element::Na.is_metal());
        assert!(Element::Fe.is_metal());
        assert!(Element::Hg.is_metal());
        assert!(!Element::C.is_metal());
        assert!(!Element::Se.is_metal());
        assert!(!Element::Xe.is_metal());
        // metalloids land on the metal side of the split
        assert!(Element::Ge.is_metal());
        assert!(Element::Sb.is_metal());
    }

    #[test]
    fn element_classes() {
        assert!(Element::P.is_pnictogen());
        assert!(Element::Se.is_chalcogen());
        assert!(Element::I.is_halogen());
        assert!(Element::O.is_electronegative());
        assert!(!Element::C.is_electronegative());
    }
}
