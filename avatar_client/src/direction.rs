//! Camera-relative heading offsets for key combinations.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::input::{Key, KeyState};

/// Yaw offset (radians) from camera forward for the held direction keys.
///
/// Forward wins over back and left wins over right when both of a pair are
/// held. With no direction held the offset is zero.
pub fn direction_offset(keys: KeyState) -> f32 {
    if keys.pressed(Key::W) {
        if keys.pressed(Key::A) {
            FRAC_PI_4
        } else if keys.pressed(Key::D) {
            -FRAC_PI_4
        } else {
            0.0
        }
    } else if keys.pressed(Key::S) {
        if keys.pressed(Key::A) {
            FRAC_PI_4 + FRAC_PI_2
        } else if keys.pressed(Key::D) {
            -FRAC_PI_4 - FRAC_PI_2
        } else {
            PI
        }
    } else if keys.pressed(Key::A) {
        FRAC_PI_2
    } else if keys.pressed(Key::D) {
        -FRAC_PI_2
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key::*;

    #[test]
    fn table_matches_every_combination() {
        let cases: [(&[Key], f32); 9] = [
            (&[], 0.0),
            (&[W], 0.0),
            (&[W, A], FRAC_PI_4),
            (&[W, D], -FRAC_PI_4),
            (&[S], PI),
            (&[S, A], FRAC_PI_4 + FRAC_PI_2),
            (&[S, D], -FRAC_PI_4 - FRAC_PI_2),
            (&[A], FRAC_PI_2),
            (&[D], -FRAC_PI_2),
        ];
        for (keys, expected) in cases {
            assert_eq!(direction_offset(KeyState::from_keys(keys)), expected, "{keys:?}");
        }
    }

    #[test]
    fn forward_beats_back() {
        assert_eq!(direction_offset(KeyState::from_keys(&[W, S])), 0.0);
        assert_eq!(direction_offset(KeyState::from_keys(&[W, S, A])), FRAC_PI_4);
    }

    #[test]
    fn left_beats_right() {
        assert_eq!(direction_offset(KeyState::from_keys(&[A, D])), FRAC_PI_2);
        assert_eq!(direction_offset(KeyState::from_keys(&[W, A, D])), FRAC_PI_4);
        assert_eq!(
            direction_offset(KeyState::from_keys(&[S, A, D])),
            FRAC_PI_4 + FRAC_PI_2
        );
    }

    #[test]
    fn non_direction_keys_do_not_bias() {
        assert_eq!(direction_offset(KeyState::from_keys(&[Shift, Space])), 0.0);
    }
}
