use smart_leds::RGB8;

use crate::led_strip;
use crate::mpr121::NUM_PADS;

/// Build the status line for one loop iteration: clock and temperature
/// first, then one line per touched pad in channel order. Pure function of
/// its inputs; calling it twice with the same readings yields the same text.
pub fn compose_status(time_text: &str, temp_f: f32, touched: &[bool; NUM_PADS]) -> String {
    let mut text = format!("{}, Temp: {} °F", time_text, temp_f.round() as i32);
    for (pad, active) in touched.iter().enumerate() {
        if *active {
            text.push_str(&format!("\nGatorPad {} touched!", pad));
        }
    }
    text
}

/// Strip color for this iteration: red while any pad is held, off otherwise.
pub fn feedback_color(touched: &[bool; NUM_PADS]) -> RGB8 {
    if touched.iter().any(|&t| t) {
        led_strip::RED
    } else {
        led_strip::OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_touched_pads_in_channel_order() {
        let mut touched = [false; NUM_PADS];
        touched[3] = true;
        touched[7] = true;
        assert_eq!(
            compose_status("7:05:09 AM", 72.3, &touched),
            "7:05:09 AM, Temp: 72 °F\nGatorPad 3 touched!\nGatorPad 7 touched!"
        );
    }

    #[test]
    fn no_touch_is_a_single_line() {
        let text = compose_status("12:00:00 PM", 68.5, &[false; NUM_PADS]);
        assert_eq!(text, "12:00:00 PM, Temp: 69 °F");
        assert!(!text.contains('\n'));
    }

    #[test]
    fn temperature_rounds_to_nearest_integer() {
        let none = [false; NUM_PADS];
        assert_eq!(compose_status("1:00:00 AM", 71.5, &none), "1:00:00 AM, Temp: 72 °F");
        assert_eq!(compose_status("1:00:00 AM", 71.4, &none), "1:00:00 AM, Temp: 71 °F");
        assert_eq!(compose_status("1:00:00 AM", -0.4, &none), "1:00:00 AM, Temp: 0 °F");
    }

    #[test]
    fn identical_readings_give_identical_text() {
        let mut touched = [false; NUM_PADS];
        touched[0] = true;
        touched[11] = true;
        let a = compose_status("9:30:00 PM", 70.0, &touched);
        let b = compose_status("9:30:00 PM", 70.0, &touched);
        assert_eq!(a, b);
    }

    #[test]
    fn feedback_is_red_iff_any_pad_active() {
        assert_eq!(feedback_color(&[false; NUM_PADS]), led_strip::OFF);

        let mut one = [false; NUM_PADS];
        one[5] = true;
        assert_eq!(feedback_color(&one), led_strip::RED);

        assert_eq!(feedback_color(&[true; NUM_PADS]), led_strip::RED);
    }
}
