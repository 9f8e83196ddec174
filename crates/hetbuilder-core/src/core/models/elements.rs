use phf::{Map, phf_map};

/// Tabulated per-element data used by the bonding analysis, the center-of-mass
/// shift and the symmetry collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// Atomic number (Z).
    pub number: u8,
    /// Standard atomic mass in atomic mass units.
    pub mass: f64,
    /// Covalent radius in Angstroms (Cordero et al., 2008).
    pub covalent_radius: f64,
}

const fn el(number: u8, mass: f64, covalent_radius: f64) -> Element {
    Element {
        number,
        mass,
        covalent_radius,
    }
}

static ELEMENTS: Map<&'static str, Element> = phf_map! {
    "H" => el(1, 1.008, 0.31), "He" => el(2, 4.0026, 0.28),
    "Li" => el(3, 6.94, 1.28), "Be" => el(4, 9.0122, 0.96), "B" => el(5, 10.81, 0.84),
    "C" => el(6, 12.011, 0.76), "N" => el(7, 14.007, 0.71), "O" => el(8, 15.999, 0.66),
    "F" => el(9, 18.998, 0.57), "Ne" => el(10, 20.180, 0.58),
    "Na" => el(11, 22.990, 1.66), "Mg" => el(12, 24.305, 1.41), "Al" => el(13, 26.982, 1.21),
    "Si" => el(14, 28.085, 1.11), "P" => el(15, 30.974, 1.07), "S" => el(16, 32.06, 1.05),
    "Cl" => el(17, 35.45, 1.02), "Ar" => el(18, 39.948, 1.06),
    "K" => el(19, 39.098, 2.03), "Ca" => el(20, 40.078, 1.76), "Sc" => el(21, 44.956, 1.70),
    "Ti" => el(22, 47.867, 1.60), "V" => el(23, 50.942, 1.53), "Cr" => el(24, 51.996, 1.39),
    "Mn" => el(25, 54.938, 1.39), "Fe" => el(26, 55.845, 1.32), "Co" => el(27, 58.933, 1.26),
    "Ni" => el(28, 58.693, 1.24), "Cu" => el(29, 63.546, 1.32), "Zn" => el(30, 65.38, 1.22),
    "Ga" => el(31, 69.723, 1.22), "Ge" => el(32, 72.630, 1.20), "As" => el(33, 74.922, 1.19),
    "Se" => el(34, 78.971, 1.20), "Br" => el(35, 79.904, 1.20), "Kr" => el(36, 83.798, 1.16),
    "Rb" => el(37, 85.468, 2.20), "Sr" => el(38, 87.62, 1.95), "Y" => el(39, 88.906, 1.90),
    "Zr" => el(40, 91.224, 1.75), "Nb" => el(41, 92.906, 1.64), "Mo" => el(42, 95.95, 1.54),
    "Tc" => el(43, 98.0, 1.47), "Ru" => el(44, 101.07, 1.46), "Rh" => el(45, 102.91, 1.42),
    "Pd" => el(46, 106.42, 1.39), "Ag" => el(47, 107.87, 1.45), "Cd" => el(48, 112.41, 1.44),
    "In" => el(49, 114.82, 1.42), "Sn" => el(50, 118.71, 1.39), "Sb" => el(51, 121.76, 1.39),
    "Te" => el(52, 127.60, 1.38), "I" => el(53, 126.90, 1.39), "Xe" => el(54, 131.29, 1.40),
    "Cs" => el(55, 132.91, 2.44), "Ba" => el(56, 137.33, 2.15), "La" => el(57, 138.91, 2.07),
    "Ce" => el(58, 140.12, 2.04), "Pr" => el(59, 140.91, 2.03), "Nd" => el(60, 144.24, 2.01),
    "Pm" => el(61, 145.0, 1.99), "Sm" => el(62, 150.36, 1.98), "Eu" => el(63, 151.96, 1.98),
    "Gd" => el(64, 157.25, 1.96), "Tb" => el(65, 158.93, 1.94), "Dy" => el(66, 162.50, 1.92),
    "Ho" => el(67, 164.93, 1.92), "Er" => el(68, 167.26, 1.89), "Tm" => el(69, 168.93, 1.90),
    "Yb" => el(70, 173.05, 1.87), "Lu" => el(71, 174.97, 1.87), "Hf" => el(72, 178.49, 1.75),
    "Ta" => el(73, 180.95, 1.70), "W" => el(74, 183.84, 1.62), "Re" => el(75, 186.21, 1.51),
    "Os" => el(76, 190.23, 1.44), "Ir" => el(77, 192.22, 1.41), "Pt" => el(78, 195.08, 1.36),
    "Au" => el(79, 196.97, 1.36), "Hg" => el(80, 200.59, 1.32), "Tl" => el(81, 204.38, 1.45),
    "Pb" => el(82, 207.2, 1.46), "Bi" => el(83, 208.98, 1.48), "Po" => el(84, 209.0, 1.40),
    "At" => el(85, 210.0, 1.50), "Rn" => el(86, 222.0, 1.50),
};

/// Looks up an element by its chemical symbol.
///
/// The lookup is case-sensitive after trimming whitespace, so `"Mo"` resolves
/// while `"MO"` does not.
pub fn element(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.get(symbol.trim())
}

pub fn is_known_element(symbol: &str) -> bool {
    ELEMENTS.contains_key(symbol.trim())
}

/// Orders chemical symbols in Hill notation: carbon first, hydrogen second,
/// everything else alphabetically. Without carbon, the order is purely alphabetical.
pub fn hill_order(symbols: &mut [(String, usize)]) {
    let has_carbon = symbols.iter().any(|(s, _)| s == "C");
    symbols.sort_by(|(a, _), (b, _)| {
        let rank = |s: &str| -> u8 {
            match (has_carbon, s) {
                (true, "C") => 0,
                (true, "H") => 1,
                _ => 2,
            }
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
}
