// sRGB <-> linear-light lookup tables, so blending class colours into the
// frame happens in linear light without a powf per channel.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1)
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255), 4096-step quantization
    linear_to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// Mix two 0x00RRGGBB pixels: `a` = 0 keeps `base`, `a` = 1 gives `top`.
    pub fn mix(&self, base: u32, top: u32, a: f32) -> u32 {
        if a <= 0.0 {
            return base;
        }
        if a >= 1.0 {
            return top;
        }
        let inv = 1.0 - a;
        let mut out = 0u32;
        for shift in [16u32, 8, 0] {
            let b = self.srgb_u8_to_linear(((base >> shift) & 0xFF) as u8);
            let t = self.srgb_u8_to_linear(((top >> shift) & 0xFF) as u8);
            out |= (self.linear_to_srgb_u8(a * t + inv * b) as u32) << shift;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_round_trip_endpoints() {
        let lut = GammaLut::new();
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(0)), 0);
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(255)), 255);
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(128)), 128);
    }

    #[test]
    fn mix_respects_alpha_extremes() {
        let lut = GammaLut::new();
        assert_eq!(lut.mix(0x00_10_20_30, 0x00_FF_00_00, 0.0), 0x00_10_20_30);
        assert_eq!(lut.mix(0x00_10_20_30, 0x00_FF_00_00, 1.0), 0x00_FF_00_00);
        let half = lut.mix(0x00_00_00_00, 0x00_FF_FF_FF, 0.5);
        // linear-light midpoint is brighter than 0x80 in sRGB
        assert!(((half >> 16) & 0xFF) > 0x80);
    }
}
