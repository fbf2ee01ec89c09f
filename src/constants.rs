//! Physical constants in CGS units, plus the spectroscopic reference state.

/// Speed of light (cm/s).
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e10;

/// Boltzmann constant (erg/K).
pub const BOLTZMANN: f64 = 1.380_649e-16;

/// Atomic mass unit (g).
pub const AMU: f64 = 1.660_539_066_60e-24;

/// Second radiation constant hc/k (cm K).
pub const C2: f64 = 1.438_776_877;

/// One standard atmosphere in dyn/cm².
pub const ATM_TO_DYN_PER_CM2: f64 = 1.013_25e6;

/// Torr per standard atmosphere.
pub const TORR_PER_ATM: f64 = 760.0;

/// Reference temperature of tabulated line parameters (K).
pub const REFERENCE_TEMPERATURE: f64 = 296.0;

/// Temperature used for amagat densities (K).
pub const AMAGAT_TEMPERATURE: f64 = 273.15;

/// Smallest Doppler half width used by the profile evaluation (cm⁻¹).
pub const MIN_DOPPLER_HWHM: f64 = 1e-12;

/// Absorption coefficients are reported in ppm/cm.
pub const PPM: f64 = 1e6;

/// Number density (molecules/cm³) of an ideal gas at `pressure` atm and
/// `temperature` K.
pub fn number_density(pressure: f64, temperature: f64) -> f64 {
    pressure * ATM_TO_DYN_PER_CM2 / (BOLTZMANN * temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_loschmidt_number() {
        // 1 atm at 273.15 K is one amagat
        assert_relative_eq!(
            number_density(1.0, AMAGAT_TEMPERATURE),
            2.686_78e19,
            max_relative = 1e-4
        );
    }
}
