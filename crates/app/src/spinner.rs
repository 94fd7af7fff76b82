use auroral_core::{
    Animation, ColorShift, DeviceConfig, Frame, Pixel, ReactiveBase, ShiftChannel, BRIGHTNESS_MAX,
    COLOR_MAX, COLOR_MIN,
};

/// Audio-reactive spinner: a precomputed hue wheel rotated around the
/// strand by the running average intensity.
pub struct SpinnerAnimation {
    light_count: usize,
    base: ReactiveBase,
    hues: Vec<Pixel>,
}

impl SpinnerAnimation {
    pub fn new(config: &DeviceConfig, base: ReactiveBase) -> Self {
        Self {
            light_count: config.light_count,
            base,
            hues: build_hue_wheel(config.light_count),
        }
    }
}

impl Animation for SpinnerAnimation {
    fn next_frame(&mut self) -> Frame {
        let intensity = self.base.features().average_intensity.clamp(0.0, 1.0);
        let mut index = ((intensity * self.hues.len() as f64) as usize).min(self.hues.len() - 1);

        let mut frame = Frame::blank(self.light_count);
        for pixel in frame.pixels_mut() {
            *pixel = self.hues[index];
            index = (index + 1) % self.hues.len();
        }
        frame
    }

    fn requests_smooth_crossfade(&self) -> bool {
        true
    }
}

/// Walks the color-shift rotation once around with a step sized so the
/// whole wheel roughly spans the strand.
fn build_hue_wheel(light_count: usize) -> Vec<Pixel> {
    let step = ((COLOR_MAX as usize * 3) / light_count.max(1))
        .clamp(1, COLOR_MAX as usize) as u8;

    let mut shift = ColorShift::new();
    let mut hues = Vec::new();
    loop {
        let (red, green, blue) = shift.rgb();
        hues.push(Pixel::new(red, green, blue, BRIGHTNESS_MAX));
        shift.advance(step);
        let (red, _, blue) = shift.rgb();
        if shift.channel() == ShiftChannel::Red && blue == COLOR_MIN && red == COLOR_MAX {
            break;
        }
    }
    hues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hue_wheel_starts_red_and_visits_other_channels() {
        let hues = build_hue_wheel(50);
        assert_eq!(hues[0], Pixel::new(255, 0, 0, BRIGHTNESS_MAX));
        assert!(hues.iter().any(|p| p.green == 255));
        assert!(hues.iter().any(|p| p.blue == 255));
    }

    #[test]
    fn frames_match_the_configured_light_count() {
        let config = DeviceConfig::new(20);
        let base = ReactiveBase::new(config.clone());
        let mut spinner = SpinnerAnimation::new(&config, base.clone());

        base.update_audio_snapshot(&[0.8; 64]);
        let frame = spinner.next_frame();
        assert_eq!(frame.len(), 20);
        assert!(frame.pixels().iter().all(|p| p.brightness == BRIGHTNESS_MAX));
    }

    #[test]
    fn louder_audio_rotates_the_wheel() {
        let config = DeviceConfig::new(20);
        let base = ReactiveBase::new(config.clone());
        let mut spinner = SpinnerAnimation::new(&config, base.clone());

        let quiet_frame = spinner.next_frame();
        for _ in 0..50 {
            base.update_audio_snapshot(&[1.0; 64]);
        }
        let loud_frame = spinner.next_frame();
        assert_ne!(quiet_frame.pixels()[0], loud_frame.pixels()[0]);
    }
}
