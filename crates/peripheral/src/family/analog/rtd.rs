//! RTD resistance measurement (§4.10): the two-wire closed-form reading and
//! the three-wire excite/measure/measure cycle that cancels lead resistance.

/// Two-wire measurement: `R = adc * 2100 / (65535 - adc)`, saturating at
/// `adc == 65535` rather than dividing by zero (§4.10).
#[must_use]
pub fn two_wire_ohms(adc: u16) -> f32 {
    if adc == u16::MAX {
        return f32::INFINITY;
    }
    f32::from(adc) * 2100.0 / f32::from(u16::MAX - adc)
}

/// Three-wire measurement (§4.10): given the excitation current and the two
/// voltage readings taken with the high-side switch in each position,
/// compute `R_RTD = R_{RTD+RL} - R_L` where `R_L = R_{RTD+2RL} - R_{RTD+RL}`.
///
/// `i_excite` must be in the same units the voltages were sampled against
/// (the caller derives it from step 1 of the cycle, §4.10 step 1).
#[must_use]
pub fn three_wire_ohms(v_rtd_plus_2rl: f32, v_rtd_plus_rl: f32, i_excite: f32) -> f32 {
    if i_excite <= 0.0 {
        return f32::INFINITY;
    }
    let r_rtd_plus_2rl = v_rtd_plus_2rl / i_excite;
    let r_rtd_plus_rl = v_rtd_plus_rl / i_excite;
    let r_lead = r_rtd_plus_2rl - r_rtd_plus_rl;
    r_rtd_plus_rl - r_lead
}

/// Pt100 temperature coefficient (ohms per degree C) for the linear
/// approximation valid over the expansion's rated -50..150 C range.
const PT100_ALPHA: f32 = 0.385;
/// Pt100 nominal resistance at 0 C.
const PT100_R0: f32 = 100.0;

/// Resistance to temperature via the Pt100 linear approximation.
#[must_use]
pub fn ohms_to_celsius(ohms: f32) -> f32 {
    (ohms - PT100_R0) / PT100_ALPHA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_wire_max_adc_saturates_to_infinity() {
        assert_eq!(two_wire_ohms(u16::MAX), f32::INFINITY);
    }

    #[test]
    fn two_wire_zero_adc_is_zero_ohms() {
        assert_eq!(two_wire_ohms(0), 0.0);
    }

    #[test]
    fn two_wire_known_code_matches_closed_form() {
        // adc = 32767 -> R = 32767 * 2100 / (65535 - 32767)
        let adc = 32767u16;
        let expected = f32::from(adc) * 2100.0 / f32::from(u16::MAX - adc);
        assert_eq!(two_wire_ohms(adc), expected);
    }

    #[test]
    fn three_wire_cancels_lead_resistance() {
        // Simulate a 120 ohm RTD behind 5 ohm leads, 1 mA excitation.
        let i_excite = 1.0e-3;
        let r_lead = 5.0;
        let r_rtd = 120.0;
        let v_rtd_plus_2rl = i_excite * (r_rtd + 2.0 * r_lead);
        let v_rtd_plus_rl = i_excite * (r_rtd + r_lead);
        let computed = three_wire_ohms(v_rtd_plus_2rl, v_rtd_plus_rl, i_excite);
        assert!((computed - r_rtd).abs() < 1e-6, "computed={computed}");
    }

    #[test]
    fn zero_excitation_current_returns_infinity_rather_than_panicking() {
        assert_eq!(three_wire_ohms(1.0, 1.0, 0.0), f32::INFINITY);
    }

    #[test]
    fn ohms_to_celsius_at_pt100_nominal_is_zero() {
        assert!((ohms_to_celsius(PT100_R0)).abs() < 1e-6);
    }
}
