// Physical constants used for ion masses
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_ELECTRON: f64 = 0.00054857990946; // Unified atomic mass unit
