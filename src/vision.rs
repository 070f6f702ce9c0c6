// Pixel helpers shared by the compositor and the reference engine:
// clipped copies, box blur, alpha blending and channel math on 0x00RRGGBB.
// Visual expectation: the composite shows overlay and mask side by side with
// no seams, and matting edges fade instead of stair-stepping.
use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::{FrameBuffer, Mask};

#[inline]
pub fn unpack(px: u32) -> (u8, u8, u8) {
    (((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
}

#[inline]
pub fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Straight (sRGB-space) interpolation between two pixels, `t` in [0,1].
#[inline]
pub fn lerp_rgb(a: u32, b: u32, t: f32) -> u32 {
    let (ar, ag, ab) = unpack(a);
    let (br, bg, bb) = unpack(b);
    let l = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8;
    pack(l(ar, br), l(ag, bg), l(ab, bb))
}

/// Sum of absolute per-channel differences (0..=765).
#[inline]
pub fn rgb_distance(a: u32, b: u32) -> u32 {
    let (ar, ag, ab) = unpack(a);
    let (br, bg, bb) = unpack(b);
    ar.abs_diff(br) as u32 + ag.abs_diff(bg) as u32 + ab.abs_diff(bb) as u32
}

/// Copy `src` into `dst` with its top-left corner at (x, y).
/// Rows and columns falling outside `dst` are dropped.
pub fn blit(src: &FrameBuffer, dst: &mut FrameBuffer, x: usize, y: usize) {
    // 1) Nothing lands inside `dst`: leave it untouched.
    if x >= dst.width || y >= dst.height {
        return;
    }
    // 2) Clip to what fits, then copy row slices (memcpy per row).
    let cols = src.width.min(dst.width - x);
    let rows = src.height.min(dst.height - y);
    for row in 0..rows {
        let s = row * src.width;
        let d = (y + row) * dst.width + x;
        dst.pixels[d..d + cols].copy_from_slice(&src.pixels[s..s + cols]);
    }
}

/// Two-pass sliding-window box blur. `tmp` holds the horizontal pass.
pub fn box_blur_rgb(
    src: &FrameBuffer,
    tmp: &mut FrameBuffer,
    dst: &mut FrameBuffer,
    radius: usize,
) -> Result<(), Error> {
    if src.width != dst.width || src.height != dst.height {
        return Err(Error::processing("box blur", "size mismatch src/dst"));
    }
    if tmp.width != src.width || tmp.height != src.height {
        return Err(Error::processing("box blur", "size mismatch tmp"));
    }
    if src.pixels.is_empty() {
        return Ok(());
    }

    // Visual: bigger radius = softer backdrop. Cost does not grow with the radius,
    // since each output pixel adds one sample and drops one.
    let w = src.width;
    let h = src.height;
    let r = radius as isize;
    let win = (2 * radius + 1) as u32;

    // Running window over `len` samples read through `at`, edges extended.
    let pass = |len: usize, at: &dyn Fn(usize) -> u32, out: &mut dyn FnMut(usize, u32)| {
        let clamp = |i: isize| i.clamp(0, len as isize - 1) as usize;
        let (mut sr, mut sg, mut sb) = (0u32, 0u32, 0u32);
        for i in -r..=r {
            let (pr, pg, pb) = unpack(at(clamp(i)));
            sr += pr as u32;
            sg += pg as u32;
            sb += pb as u32;
        }
        for i in 0..len {
            out(i, pack((sr / win) as u8, (sg / win) as u8, (sb / win) as u8));
            let (ar, ag, ab) = unpack(at(clamp(i as isize + r + 1)));
            let (dr, dg, db) = unpack(at(clamp(i as isize - r)));
            sr = sr + ar as u32 - dr as u32;
            sg = sg + ag as u32 - dg as u32;
            sb = sb + ab as u32 - db as u32;
        }
    };

    // horizontal: src -> tmp
    for y in 0..h {
        let row = y * w;
        let tmp_pixels = &mut tmp.pixels;
        pass(w, &|x| src.pixels[row + x], &mut |x, px| tmp_pixels[row + x] = px);
    }

    // vertical: tmp -> dst
    for x in 0..w {
        let tmp_pixels = &tmp.pixels;
        let dst_pixels = &mut dst.pixels;
        pass(h, &|y| tmp_pixels[y * w + x], &mut |y, px| dst_pixels[y * w + x] = px);
    }

    Ok(())
}

/// Blend `top` over `base` in linear light, weighted by `mask`, in place.
pub fn blend_linear_in_place(
    base: &mut FrameBuffer,
    top: &FrameBuffer,
    mask: &Mask,
    lut: &GammaLut,
) -> Result<(), Error> {
    if base.width != top.width || base.height != top.height {
        return Err(Error::processing("blend", "dimension mismatch"));
    }
    if mask.width != base.width || mask.height != base.height {
        return Err(Error::processing("blend", "mask dimension mismatch"));
    }

    // Visual: a=0 keeps `base`, a=1 shows `top`; in between mixes in linear light,
    // so soft edges don't get the dark fringe an sRGB-space mix gives.
    for ((px, &over), &a) in base.pixels.iter_mut().zip(&top.pixels).zip(&mask.alpha) {
        *px = lut.mix(*px, over, a);
    }
    Ok(())
}
