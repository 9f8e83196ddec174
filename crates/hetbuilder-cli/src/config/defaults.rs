pub struct DefaultsConfig {
    pub n_max: i64,
    pub n_min: i64,
    pub angle_limits: [f64; 2],
    pub angle_stepsize: f64,
    pub tolerance: f64,
    pub weight: f64,
    pub distance: f64,
    pub vacuum: f64,
    pub symprec: f64,
    pub symmetry_angle_tolerance: f64,
    pub idealize: bool,
    pub tolerance_step: f64,
    pub max_tolerance: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            n_max: 10,
            n_min: 0,
            angle_limits: [0.0, 90.0],
            angle_stepsize: 1.0,
            tolerance: 0.1,
            weight: 0.5,
            distance: 4.0,
            vacuum: 15.0,
            symprec: 1e-5,
            symmetry_angle_tolerance: 5.0,
            idealize: true,
            tolerance_step: 0.05,
            max_tolerance: 0.2,
        }
    }
}
